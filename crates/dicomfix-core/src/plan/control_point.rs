//! Control point and spot types.

use serde::{Deserialize, Serialize};

/// A single scanned spot: position in mm at isocenter and its meterset weight.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Spot {
    pub x: f64,
    pub y: f64,
    pub weight: f64,
}

impl Spot {
    pub fn new(x: f64, y: f64, weight: f64) -> Self {
        Self { x, y, weight }
    }
}

/// Table top position in mm.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TablePosition {
    pub vertical: f64,
    pub longitudinal: f64,
    pub lateral: f64,
}

impl TablePosition {
    pub fn new(vertical: f64, longitudinal: f64, lateral: f64) -> Self {
        Self {
            vertical,
            longitudinal,
            lateral,
        }
    }
}

/// Per-control-point range shifter setting.
#[derive(Debug, Clone, PartialEq)]
pub struct RangeShifterSetting {
    pub setting: String,
    pub isocenter_distance: Option<f64>,
    pub water_equivalent_thickness: Option<f64>,
    pub referenced_number: i32,
}

/// Link from a control point to a plan dose reference.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DoseReferenceLink {
    pub number: i32,
    pub coefficient: Option<f64>,
}

/// One delivery instruction within a field.
///
/// Geometry attributes are optional because DICOM only requires them on the
/// first control point of a field; later points carry them when they change.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ControlPoint {
    /// Cumulative meterset weight.
    pub cumulative_weight: f64,
    /// Nominal beam energy in MeV.
    pub nominal_energy: Option<f64>,
    /// Gantry angle in degrees.
    pub gantry_angle: Option<f64>,
    /// Snout position in mm.
    pub snout_position: Option<f64>,
    /// The snout position attribute exists but holds no value.
    pub snout_position_blank: bool,
    pub table_vertical: Option<f64>,
    pub table_longitudinal: Option<f64>,
    pub table_lateral: Option<f64>,
    pub table_pitch: Option<f64>,
    pub table_roll: Option<f64>,
    pub patient_support_angle: Option<f64>,
    pub meterset_rate: Option<f64>,
    pub range_shifter_setting: Option<RangeShifterSetting>,
    pub dose_reference: Option<DoseReferenceLink>,
    /// Scanned spots. Empty for control points without a spot map.
    pub spots: Vec<Spot>,
}

impl ControlPoint {
    /// Create a control point with only a cumulative weight.
    pub fn with_weight(cumulative_weight: f64) -> Self {
        Self {
            cumulative_weight,
            ..Default::default()
        }
    }

    /// Sum of the spot weights of this control point.
    pub fn spot_weight_sum(&self) -> f64 {
        self.spots.iter().map(|s| s.weight).sum()
    }

    /// Whether this control point carries a spot map with any positive weight.
    pub fn delivers_spots(&self) -> bool {
        self.spots.iter().any(|s| s.weight > 0.0)
    }

    /// Table position, if all three components are present.
    pub fn table_position(&self) -> Option<TablePosition> {
        Some(TablePosition::new(
            self.table_vertical?,
            self.table_longitudinal?,
            self.table_lateral?,
        ))
    }

    pub fn set_table_position(&mut self, position: TablePosition) {
        self.table_vertical = Some(position.vertical);
        self.table_longitudinal = Some(position.longitudinal);
        self.table_lateral = Some(position.lateral);
    }
}
