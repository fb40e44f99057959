//! Spot list files on disk.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::NaiveDate;

use dicomfix_core::export::{format_spot_sample, format_spotlist, racehorse_layers, SpotRecord};
use dicomfix_core::plan::Plan;

/// Write one RACEHORSE spot list per energy layer.
///
/// `base` may contain a directory; file names are appended to it.
pub fn write_racehorse<P: AsRef<Path>>(plan: &Plan, base: P, date: &NaiveDate) -> Result<Vec<PathBuf>> {
    let base = base.as_ref();
    let dir = base.parent().unwrap_or_else(|| Path::new(""));
    let stem = base
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    let mut written = Vec::new();
    for layer in racehorse_layers(plan, &stem, date) {
        let path = dir.join(&layer.file_name);
        fs::write(&path, &layer.contents)
            .with_context(|| format!("Failed to write spot list {}", layer.file_name))?;
        written.push(path);
    }
    let total: f64 = plan
        .fields
        .iter()
        .flat_map(|f| f.spot_mus())
        .sum();
    tracing::info!("Exported {} RACEHORSE layer files, {:.2} MU in total", written.len(), total);
    Ok(written)
}

/// Write `<base>.csv` with every delivering spot.
pub fn write_spotlist<P: AsRef<Path>>(plan: &Plan, base: P) -> Result<PathBuf> {
    let path = base.as_ref().with_extension("csv");
    fs::write(&path, format_spotlist(plan)).context("Failed to write spot list")?;
    tracing::info!("Exported spot list to {}", path.display());
    Ok(path)
}

/// Write sampled spots as a RACEHORSE style CSV.
pub fn write_spot_sample<P: AsRef<Path>>(
    path: P,
    plan: &Plan,
    records: &[SpotRecord],
    date: &NaiveDate,
) -> Result<()> {
    fs::write(path.as_ref(), format_spot_sample(plan, records, date))
        .context("Failed to write spot sample")?;
    tracing::info!("Exported {} sampled spots to {}", records.len(), path.as_ref().display());
    Ok(())
}
