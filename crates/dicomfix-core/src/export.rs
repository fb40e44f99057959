//! Spot list export.
//!
//! Flattens a plan into per-spot records and formats them in the CSV layout
//! read by the Varian RACEHORSE service mode.

use std::fmt::Write;

use chrono::NaiveDate;
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::error::{PlanError, Result};
use crate::plan::{Plan, SpotSlot};

pub const CREATOR_NAME: &str = "DicomFix";

/// One exported spot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpotRecord {
    /// Zero-based field index in the plan.
    pub field_index: usize,
    /// Beam number of the field.
    pub field_number: i32,
    /// Zero-based index into the field's addressable spots.
    pub spot_index: usize,
    pub slot: SpotSlot,
    pub gantry_angle: f64,
    /// Nominal energy in MeV, if known for the control point.
    pub energy: Option<f64>,
    /// Spot position in mm. `None` for control points without a spot map.
    pub position: Option<(f64, f64)>,
    pub mu: f64,
}

/// How spots are chosen for a sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sampling {
    /// The first spots in plan order.
    Leading,
    /// Uniformly random spots; a seed makes the choice reproducible.
    Random { seed: Option<u64> },
}

/// All addressable spots of the plan, flattened in plan order.
pub fn spot_records(plan: &Plan) -> Vec<SpotRecord> {
    let mut records = Vec::with_capacity(plan.spot_count());
    for (field_index, field) in plan.fields.iter().enumerate() {
        let mpw = field.meterset_per_weight();
        let gantry_angle = field.gantry_angle().unwrap_or(0.0);
        for (spot_index, slot) in field.spot_slots().into_iter().enumerate() {
            let cp_index = slot.control_point();
            let energy = field.control_points[..=cp_index]
                .iter()
                .rev()
                .find_map(|cp| cp.nominal_energy);
            let position = match slot {
                SpotSlot::Scanned { control_point, spot } => {
                    let s = field.control_points[control_point].spots[spot];
                    Some((s.x, s.y))
                }
                SpotSlot::Segment { .. } => None,
            };
            records.push(SpotRecord {
                field_index,
                field_number: field.number,
                spot_index,
                slot,
                gantry_angle,
                energy,
                position,
                mu: field.slot_weight(slot) * mpw,
            });
        }
    }
    records
}

/// Choose `count` spots of the plan, returned in plan order.
pub fn sample_spots(plan: &Plan, count: usize, sampling: Sampling) -> Result<Vec<SpotRecord>> {
    let records = spot_records(plan);
    if records.len() < count {
        return Err(PlanError::InsufficientSpots {
            requested: count,
            available: records.len(),
        });
    }
    match sampling {
        Sampling::Leading => Ok(records.into_iter().take(count).collect()),
        Sampling::Random { seed } => {
            let mut rng = match seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_entropy(),
            };
            let mut indices = rand::seq::index::sample(&mut rng, records.len(), count).into_vec();
            indices.sort_unstable();
            Ok(indices.into_iter().map(|i| records[i]).collect())
        }
    }
}

fn header_block(plan: &Plan, date: &NaiveDate) -> String {
    let mut h = String::from("#HEADER\n");
    let _ = writeln!(h, "NAME, {}", plan.label);
    let _ = writeln!(h, "DATE, {}", date.format("%d-%m-%Y"));
    let _ = writeln!(h, "CREATORNAME, {}", CREATOR_NAME);
    let _ = writeln!(h, "CREATORVERSION, {}", env!("CARGO_PKG_VERSION"));
    h.push('\n');
    h
}

/// Format sampled spots as a RACEHORSE style CSV.
pub fn format_spot_sample(plan: &Plan, records: &[SpotRecord], date: &NaiveDate) -> String {
    let mut out = header_block(plan, date);
    out.push_str("#VALUES\n");
    out.push_str("Field;Spot;Gantry;MU\n");
    for r in records {
        let _ = writeln!(out, "{:02},{:4},{:8.2},{:8.2}", r.field_number, r.spot_index, r.gantry_angle, r.mu);
    }
    out
}

/// One RACEHORSE spot list file.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerExport {
    pub file_name: String,
    pub contents: String,
    pub total_mu: f64,
}

/// Build one RACEHORSE spot list per delivering energy layer of every field.
pub fn racehorse_layers(plan: &Plan, basename: &str, date: &NaiveDate) -> Vec<LayerExport> {
    let header = header_block(plan, date);
    let mut exports = Vec::new();
    for (j, field) in plan.fields.iter().enumerate() {
        let mpw = field.meterset_per_weight();
        let mut layer = 0;
        for cp in field.control_points.iter().filter(|cp| cp.delivers_spots()) {
            layer += 1;
            let energy = cp.nominal_energy.unwrap_or(0.0);
            let file_name = format!(
                "{}_field{:02}_layer_{:02}__{:06.2}MeV.csv",
                basename,
                j + 1,
                layer,
                energy
            );
            let mut contents = String::from("* ----- RACEHORSE Spot List -----\n");
            let _ = writeln!(contents, "* Field: {:02}  Layer: {:02}", j + 1, layer);
            contents.push('\n');
            contents.push_str(&header);
            contents.push_str("#VALUES\n");
            contents.push_str("Index;Position x;Position y;Dose\n");
            let mut total_mu = 0.0;
            for (n, spot) in cp.spots.iter().enumerate() {
                let mu = spot.weight * mpw;
                let _ = writeln!(contents, "{:2},{:8.2},{:8.2},{:8.2}", n, spot.x, spot.y, mu);
                total_mu += mu;
            }
            tracing::debug!("{}: {:.2} MU", file_name, total_mu);
            exports.push(LayerExport {
                file_name,
                contents,
                total_mu,
            });
        }
    }
    exports
}

/// Plain spot list: `energy,x,y,mu` for every delivering spot.
pub fn format_spotlist(plan: &Plan) -> String {
    let mut out = String::new();
    for field in &plan.fields {
        let mpw = field.meterset_per_weight();
        for cp in field.control_points.iter().filter(|cp| cp.delivers_spots()) {
            let energy = cp.nominal_energy.unwrap_or(0.0);
            for spot in &cp.spots {
                let _ = writeln!(
                    out,
                    "{:8.2},{:8.2},{:8.2},{:8.2}",
                    energy,
                    spot.x,
                    spot.y,
                    spot.weight * mpw
                );
            }
        }
    }
    out
}

/// A sampled spot with its MU before and after editing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpotComparison {
    pub record: SpotRecord,
    /// MU of the same spot in the original plan, if it exists there.
    pub original_mu: Option<f64>,
}

/// MU of `slot` in field `field_index`, if the plan has that spot.
fn slot_mu(plan: &Plan, field_index: usize, slot: SpotSlot) -> Option<f64> {
    let field = plan.fields.get(field_index)?;
    let cp = field.control_points.get(slot.control_point())?;
    if let SpotSlot::Scanned { spot, .. } = slot {
        cp.spots.get(spot)?;
    }
    Some(field.slot_weight(slot) * field.meterset_per_weight())
}

/// Sample spots of `edited` and pair them with `original`.
pub fn compare_spots(
    original: &Plan,
    edited: &Plan,
    count: usize,
    sampling: Sampling,
) -> Result<Vec<SpotComparison>> {
    let count = count.min(edited.spot_count());
    let sample = sample_spots(edited, count, sampling)?;
    Ok(sample
        .into_iter()
        .map(|record| SpotComparison {
            record,
            original_mu: slot_mu(original, record.field_index, record.slot),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::{ControlPoint, Field, Spot};
    use crate::weights::SpotWeight;

    fn scanned_plan() -> Plan {
        let mut cps = vec![
            ControlPoint::with_weight(0.0),
            ControlPoint::with_weight(3.0),
            ControlPoint::with_weight(3.0),
            ControlPoint::with_weight(5.0),
        ];
        cps[0].nominal_energy = Some(120.5);
        cps[0].gantry_angle = Some(90.0);
        cps[0].spots = vec![Spot::new(-10.0, 0.0, 1.0), Spot::new(10.0, 0.0, 2.0)];
        cps[1].spots = vec![Spot::new(-10.0, 0.0, 0.0), Spot::new(10.0, 0.0, 0.0)];
        cps[2].nominal_energy = Some(100.0);
        cps[2].spots = vec![Spot::new(0.0, 5.0, 2.0)];
        cps[3].spots = vec![Spot::new(0.0, 5.0, 0.0)];
        let field = Field {
            number: 1,
            name: "F1".into(),
            final_cumulative_weight: 5.0,
            beam_meterset: Some(50.0),
            control_points: cps,
            ..Default::default()
        };
        let mut plan = Plan::with_fields(vec![field]);
        plan.label = "QA".into();
        plan
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 2, 29).unwrap()
    }

    #[test]
    fn test_spot_records() {
        let records = spot_records(&scanned_plan());
        assert_eq!(records.len(), 3);
        assert_eq!(records[1].mu, 20.0);
        assert_eq!(records[1].position, Some((10.0, 0.0)));
        assert_eq!(records[2].energy, Some(100.0));
        assert_eq!(records[2].gantry_angle, 90.0);
    }

    #[test]
    fn test_sample_leading_and_insufficient() {
        let plan = scanned_plan();
        let sample = sample_spots(&plan, 2, Sampling::Leading).unwrap();
        assert_eq!(sample.iter().map(|r| r.spot_index).collect::<Vec<_>>(), vec![0, 1]);
        assert_eq!(
            sample_spots(&plan, 4, Sampling::Leading),
            Err(PlanError::InsufficientSpots { requested: 4, available: 3 })
        );
    }

    #[test]
    fn test_sample_random_is_ordered_and_seeded() {
        let plan = scanned_plan();
        let a = sample_spots(&plan, 2, Sampling::Random { seed: Some(7) }).unwrap();
        let b = sample_spots(&plan, 2, Sampling::Random { seed: Some(7) }).unwrap();
        assert_eq!(a, b);
        assert!(a[0].spot_index < a[1].spot_index);
    }

    #[test]
    fn test_racehorse_layers() {
        let layers = racehorse_layers(&scanned_plan(), "out", &date());
        assert_eq!(layers.len(), 2);
        assert_eq!(layers[0].file_name, "out_field01_layer_01__120.50MeV.csv");
        assert_eq!(layers[1].file_name, "out_field01_layer_02__100.00MeV.csv");
        let text = &layers[0].contents;
        assert!(text.starts_with("* ----- RACEHORSE Spot List -----\n* Field: 01  Layer: 01\n"));
        assert!(text.contains("NAME, QA\n"));
        assert!(text.contains("DATE, 29-02-2024\n"));
        assert!(text.contains(" 1,   10.00,    0.00,   20.00\n"));
        assert_eq!(layers[0].total_mu, 30.0);
    }

    #[test]
    fn test_format_spot_sample() {
        let plan = scanned_plan();
        let records = sample_spots(&plan, 1, Sampling::Leading).unwrap();
        let text = format_spot_sample(&plan, &records, &date());
        assert!(text.contains("#VALUES\nField;Spot;Gantry;MU\n01,   0,   90.00,   10.00\n"));
    }

    #[test]
    fn test_spotlist() {
        let text = format_spotlist(&scanned_plan());
        assert_eq!(text.lines().count(), 3);
        assert!(text.starts_with("  120.50,  -10.00,    0.00,   10.00\n"));
    }

    #[test]
    fn test_compare_spots() {
        let original = scanned_plan();
        let mut edited = original.clone();
        crate::mutate::rescale_by_factor(&mut edited, 2.0).unwrap();
        let rows = compare_spots(&original, &edited, 10, Sampling::Leading).unwrap();
        assert_eq!(rows.len(), 3);
        for row in rows {
            assert!((row.record.mu - 2.0 * row.original_mu.unwrap()).abs() < 1e-9);
        }
    }

    #[test]
    fn test_compare_spots_after_layer_is_zeroed() {
        let original = scanned_plan();
        let mut edited = original.clone();
        let zero_first_layer = [
            SpotWeight { field: 0, spot: 0, mu: 0.0 },
            SpotWeight { field: 0, spot: 1, mu: 0.0 },
        ];
        crate::mutate::apply_weight_list(&mut edited, &zero_first_layer).unwrap();

        let rows = compare_spots(&original, &edited, 10, Sampling::Leading).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].record.spot_index, 0);
        assert_eq!(rows[0].record.slot, SpotSlot::Scanned { control_point: 2, spot: 0 });
        assert_eq!(rows[0].original_mu, Some(20.0));
        assert!((rows[0].record.mu - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_compare_spots_of_duplicated_field() {
        let original = scanned_plan();
        let mut edited = original.clone();
        crate::mutate::duplicate_fields(&mut edited, 1);
        let rows = compare_spots(&original, &edited, 6, Sampling::Leading).unwrap();
        assert_eq!(rows.len(), 6);
        assert!(rows[..3].iter().all(|r| r.original_mu.is_some()));
        assert!(rows[3..].iter().all(|r| r.original_mu.is_none()));
    }
}
