//! Geometry edits: gantry, table, snout and range shifter.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{PlanError, Result};
use crate::mutate::metadata;
use crate::plan::{Plan, RangeShifter, RangeShifterSetting, TablePosition};

/// Machine prepared by the TR4 wizard.
pub const TR4_MACHINE: &str = "TR4";
/// Gantry angle in degrees used by the TR4 wizard.
pub const TR4_GANTRY_ANGLE: f64 = 90.0;
/// Snout position in mm used by the TR4 wizard.
pub const TR4_SNOUT_POSITION: f64 = 421.0;

/// Isocenter to range shifter distance in mm.
pub const RANGE_SHIFTER_ISOCENTER_DISTANCE: f64 = 98.0;

/// Parse a single finite number.
pub fn parse_number(what: &'static str, input: &str) -> Result<f64> {
    let input = input.trim();
    input
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| PlanError::malformed_number(what, input))
}

/// Parse a non-negative integer count.
pub fn parse_count(what: &'static str, input: &str) -> Result<usize> {
    let input = input.trim();
    input
        .parse::<usize>()
        .map_err(|_| PlanError::malformed_number(what, input))
}

/// Parse a comma-separated list of numbers.
pub fn parse_number_list(what: &'static str, input: &str) -> Result<Vec<f64>> {
    input.split(',').map(|s| parse_number(what, s)).collect()
}

/// Parse a table position given as "vertical,longitudinal,lateral" in cm.
pub fn parse_table_position_cm(input: &str) -> Result<TablePosition> {
    let values = parse_number_list("table position", input)?;
    if values.len() != 3 {
        return Err(PlanError::count_mismatch("table position", 3, values.len()));
    }
    Ok(TablePosition::new(
        values[0] * 10.0,
        values[1] * 10.0,
        values[2] * 10.0,
    ))
}

/// Assign one gantry angle per field, in field order.
///
/// The angle goes to the first control point and to every later control
/// point that already carries an explicit angle.
pub fn set_gantry_angles(plan: &mut Plan, angles: &[f64]) -> Result<()> {
    if angles.len() != plan.field_count() {
        return Err(PlanError::count_mismatch(
            "gantry angles",
            plan.field_count(),
            angles.len(),
        ));
    }
    if let Some(&bad) = angles
        .iter()
        .find(|a| !(a.is_finite() && (0.0..360.0).contains(*a)))
    {
        return Err(PlanError::out_of_range("gantry angle", bad));
    }

    for (i, (field, &angle)) in plan.fields.iter_mut().zip(angles).enumerate() {
        let old = field.gantry_angle();
        for (k, cp) in field.control_points.iter_mut().enumerate() {
            if k == 0 || cp.gantry_angle.is_some() {
                cp.gantry_angle = Some(angle);
            }
        }
        match old {
            Some(old) => tracing::info!("Gantry angle field #{} changed from {:8.2} to {:8.2}", i + 1, old, angle),
            None => tracing::info!("Gantry angle field #{} set to {:8.2}", i + 1, angle),
        }
    }
    Ok(())
}

/// Overwrite the table position on every control point of every field.
pub fn set_table_position(plan: &mut Plan, position: TablePosition) -> Result<()> {
    for (what, value) in [
        ("table vertical position", position.vertical),
        ("table longitudinal position", position.longitudinal),
        ("table lateral position", position.lateral),
    ] {
        if !value.is_finite() {
            return Err(PlanError::out_of_range(what, value));
        }
    }
    for field in &mut plan.fields {
        for cp in &mut field.control_points {
            cp.set_table_position(position);
        }
    }
    tracing::info!("Table vertical position     : {:8.2} cm", position.vertical * 0.1);
    tracing::info!("Table longitudinal position : {:8.2} cm", position.longitudinal * 0.1);
    tracing::info!("Table lateral position      : {:8.2} cm", position.lateral * 0.1);
    Ok(())
}

/// Overwrite the snout position (mm) on every control point of every field.
pub fn set_snout_position(plan: &mut Plan, position: f64) -> Result<()> {
    if !(position.is_finite() && position >= 0.0) {
        return Err(PlanError::out_of_range("snout position", position));
    }
    for field in &mut plan.fields {
        for cp in &mut field.control_points {
            cp.snout_position = Some(position);
        }
    }
    tracing::info!("Snout position set to {:8.2} cm for all fields.", position * 0.1);
    Ok(())
}

/// Prepare the plan for treatment room 4.
///
/// Approves the plan and forces the machine name, gantry angle and snout
/// position known to work on that machine.
pub fn prepare_for_tr4(plan: &mut Plan, now: &chrono::NaiveDateTime) {
    metadata::approve(plan, now);
    for field in &mut plan.fields {
        field.treatment_machine = TR4_MACHINE.to_string();
        if let Some(cp) = field.control_points.first_mut() {
            cp.gantry_angle = Some(TR4_GANTRY_ANGLE);
            cp.snout_position = Some(TR4_SNOUT_POSITION);
        }
        for cp in field.control_points.iter_mut().skip(1) {
            if cp.gantry_angle.is_some() {
                cp.gantry_angle = Some(TR4_GANTRY_ANGLE);
            }
            if cp.snout_position.is_some() {
                cp.snout_position = Some(TR4_SNOUT_POSITION);
            }
        }
    }
    tracing::info!("All gantry angles set to   {:8.2} deg", TR4_GANTRY_ANGLE);
    tracing::info!("All snout positions set to {:8.2} cm", TR4_SNOUT_POSITION * 0.1);
}

/// Range shifter choices available on the beam lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RangeShifterChoice {
    #[serde(rename = "NONE")]
    None,
    #[serde(rename = "RS_2CM")]
    Rs2Cm,
    #[serde(rename = "RS_5CM")]
    Rs5Cm,
}

impl RangeShifterChoice {
    pub fn id(&self) -> Option<&'static str> {
        match self {
            RangeShifterChoice::None => None,
            RangeShifterChoice::Rs2Cm => Some("RS_2CM"),
            RangeShifterChoice::Rs5Cm => Some("RS_5CM"),
        }
    }

    /// Water equivalent thickness in mm as configured on the beam lines.
    pub fn water_equivalent_thickness(&self) -> Option<f64> {
        match self {
            RangeShifterChoice::None => None,
            RangeShifterChoice::Rs2Cm => Some(57.0),
            RangeShifterChoice::Rs5Cm => Some(22.8),
        }
    }
}

impl fmt::Display for RangeShifterChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id().unwrap_or("NONE"))
    }
}

impl FromStr for RangeShifterChoice {
    type Err = PlanError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "NONE" | "" => Ok(RangeShifterChoice::None),
            "RS_2CM" => Ok(RangeShifterChoice::Rs2Cm),
            "RS_5CM" => Ok(RangeShifterChoice::Rs5Cm),
            other => Err(PlanError::invalid_value(
                "range shifter",
                format!("expected RS_2CM, RS_5CM or NONE, got '{}'", other),
            )),
        }
    }
}

/// Install or remove the range shifter on every field.
pub fn set_range_shifter(plan: &mut Plan, choice: RangeShifterChoice) {
    let (Some(id), Some(wet)) = (choice.id(), choice.water_equivalent_thickness()) else {
        tracing::info!("Removing Range Shifter Sequence from all fields.");
        for field in &mut plan.fields {
            field.range_shifter = None;
            for cp in &mut field.control_points {
                cp.range_shifter_setting = None;
            }
        }
        return;
    };

    for field in &mut plan.fields {
        field.range_shifter = Some(RangeShifter {
            number: 1,
            id: id.to_string(),
            kind: "BINARY".to_string(),
        });
        for cp in &mut field.control_points {
            cp.range_shifter_setting = Some(RangeShifterSetting {
                setting: "IN".to_string(),
                isocenter_distance: Some(RANGE_SHIFTER_ISOCENTER_DISTANCE),
                water_equivalent_thickness: Some(wet),
                referenced_number: 1,
            });
        }
    }
    tracing::info!("Range Shifter set to '{}' for all fields.", id);
}
