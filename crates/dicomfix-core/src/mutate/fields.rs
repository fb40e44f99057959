//! Field sequence edits: duplication and repainting.

use crate::error::{PlanError, Result};
use crate::plan::Plan;
use crate::MU_MIN;

/// Append `n` copies of the whole field sequence after the originals.
///
/// Copies get fresh beam numbers continuing after the highest existing one
/// and a " copy k" suffix on their name. Weights, angles, dose and meterset
/// are carried over unchanged.
pub fn duplicate_fields(plan: &mut Plan, n: usize) {
    if n == 0 {
        return;
    }
    let originals = plan.fields.clone();
    let mut next_number = plan.next_beam_number();
    for copy in 1..=n {
        for source in &originals {
            let mut field = source.clone();
            field.number = next_number;
            field.name = format!("{} copy {}", source.name, copy);
            next_number += 1;
            tracing::info!("{}", field.name);
            plan.fields.push(field);
        }
    }
    tracing::info!("Duplicated {} field(s) {} times.", originals.len(), n);
}

/// Repeat every spot `n` times with its weight divided by `n`.
///
/// The delivered MU per position and all cumulative weights are unchanged.
/// Returns the number of spots that end up below [`MU_MIN`].
pub fn repaint(plan: &mut Plan, n: usize) -> Result<usize> {
    if n == 0 {
        return Err(PlanError::out_of_range("repainting", 0.0));
    }
    let mut below_min = 0;
    for field in &mut plan.fields {
        let mpw = field.meterset_per_weight();
        for cp in &mut field.control_points {
            if cp.spots.is_empty() {
                continue;
            }
            let painted: Vec<_> = cp
                .spots
                .iter()
                .map(|s| crate::plan::Spot::new(s.x, s.y, s.weight / n as f64))
                .collect();
            cp.spots = painted.iter().copied().cycle().take(painted.len() * n).collect();
            below_min += cp
                .spots
                .iter()
                .filter(|s| s.weight > 0.0 && s.weight * mpw < MU_MIN)
                .count();
        }
        tracing::info!("Repainting field {} with {} times the number of spots.", field.name, n);
    }
    if below_min > 0 {
        tracing::warn!("{} repainted spots fell below {:.2} MU", below_min, MU_MIN);
    }
    Ok(below_min)
}
