//! External spot weight lists.
//!
//! A weight list is a CSV text with one `field,spot,mu` row per spot, using
//! zero-based indices. Blank lines and `#` comments are ignored. The first
//! remaining line is skipped as a header when its first cell is not a number.

use crate::error::{PlanError, Result};

/// One entry of an external weight list.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpotWeight {
    /// Zero-based field index.
    pub field: usize,
    /// Zero-based index into the field's addressable spots.
    pub spot: usize,
    /// New spot MU.
    pub mu: f64,
}

/// Parse a weight list from CSV text.
pub fn parse_weight_list(text: &str) -> Result<Vec<SpotWeight>> {
    let mut weights = Vec::new();
    let mut first_row = true;
    for (n, line) in text.lines().enumerate() {
        let line_no = n + 1;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let cells: Vec<&str> = line.split(',').map(str::trim).collect();
        if std::mem::take(&mut first_row) && cells[0].parse::<f64>().is_err() {
            tracing::debug!("Skipping weight list header '{}'", line);
            continue;
        }
        if cells.len() != 3 {
            return Err(PlanError::malformed_row(
                line_no,
                format!("expected 3 columns, got {}", cells.len()),
            ));
        }
        let field = cells[0]
            .parse::<usize>()
            .map_err(|_| PlanError::malformed_row(line_no, format!("bad field index '{}'", cells[0])))?;
        let spot = cells[1]
            .parse::<usize>()
            .map_err(|_| PlanError::malformed_row(line_no, format!("bad spot index '{}'", cells[1])))?;
        let mu = cells[2]
            .parse::<f64>()
            .map_err(|_| PlanError::malformed_row(line_no, format!("bad MU '{}'", cells[2])))?;
        weights.push(SpotWeight { field, spot, mu });
    }
    Ok(weights)
}
