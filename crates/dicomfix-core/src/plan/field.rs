//! Field (ion beam) type.
//!
//! A field owns its control points. Spot-level addressing is defined here so
//! that rescaling, weight overwrites and exports agree on what "spot #k of
//! field #j" means.

use super::control_point::ControlPoint;

/// Range shifter mounted on a field.
#[derive(Debug, Clone, PartialEq)]
pub struct RangeShifter {
    pub number: i32,
    pub id: String,
    pub kind: String,
}

/// Address of one addressable spot within a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpotSlot {
    /// A spot of a control point's scan spot map.
    Scanned { control_point: usize, spot: usize },
    /// A control point without a spot map; its weight is the increase of
    /// cumulative weight over the previous control point.
    Segment { control_point: usize },
}

impl SpotSlot {
    pub fn control_point(&self) -> usize {
        match *self {
            SpotSlot::Scanned { control_point, .. } => control_point,
            SpotSlot::Segment { control_point } => control_point,
        }
    }
}

/// One irradiation field of a plan.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Field {
    /// Beam number, unique within the plan.
    pub number: i32,
    pub name: String,
    pub treatment_machine: String,
    pub manufacturer: Option<String>,
    pub accessory_code: Option<String>,
    pub snout_ids: Vec<String>,
    pub range_shifter: Option<RangeShifter>,
    pub referenced_tolerance_table: Option<i32>,
    pub final_cumulative_weight: f64,
    /// Beam dose in Gy(RBE), from the fraction group.
    pub beam_dose: Option<f64>,
    /// Beam meterset in MU, from the fraction group.
    pub beam_meterset: Option<f64>,
    pub control_points: Vec<ControlPoint>,
    /// Index of the DICOM beam item this field was read from.
    pub origin: Option<usize>,
}

impl Field {
    /// Create a field with the given number and cumulative weights.
    ///
    /// The final cumulative weight is taken from the last control point.
    pub fn from_cumulative_weights(number: i32, weights: &[f64]) -> Self {
        let control_points: Vec<ControlPoint> =
            weights.iter().map(|&w| ControlPoint::with_weight(w)).collect();
        Self {
            number,
            name: format!("Field {}", number),
            final_cumulative_weight: weights.last().copied().unwrap_or(0.0),
            control_points,
            ..Default::default()
        }
    }

    /// Monitor units per unit of meterset weight.
    ///
    /// Falls back to 1 when the fraction group does not give a usable
    /// beam meterset, so that weights are read as MU directly.
    pub fn meterset_per_weight(&self) -> f64 {
        match self.beam_meterset {
            Some(meterset) if meterset > 0.0 && self.final_cumulative_weight > 0.0 => {
                meterset / self.final_cumulative_weight
            }
            _ => 1.0,
        }
    }

    /// Gantry angle of the field, taken from the first control point.
    pub fn gantry_angle(&self) -> Option<f64> {
        self.control_points.first().and_then(|cp| cp.gantry_angle)
    }

    /// Increase of cumulative weight at control point `index`.
    fn segment_weight(&self, index: usize) -> f64 {
        let current = self.control_points[index].cumulative_weight;
        if index == 0 {
            current
        } else {
            current - self.control_points[index - 1].cumulative_weight
        }
    }

    /// All addressable spots in delivery order.
    ///
    /// Control points with a spot map contribute each spot, unless every
    /// weight in the map is zero. Control points without a spot map
    /// contribute one segment when their cumulative weight increases.
    pub fn spot_slots(&self) -> Vec<SpotSlot> {
        let mut slots = Vec::new();
        for (i, cp) in self.control_points.iter().enumerate() {
            if !cp.spots.is_empty() {
                if cp.delivers_spots() {
                    slots.extend((0..cp.spots.len()).map(|k| SpotSlot::Scanned {
                        control_point: i,
                        spot: k,
                    }));
                }
            } else if self.segment_weight(i) > 0.0 {
                slots.push(SpotSlot::Segment { control_point: i });
            }
        }
        slots
    }

    /// Meterset weight of an addressable spot.
    pub fn slot_weight(&self, slot: SpotSlot) -> f64 {
        match slot {
            SpotSlot::Scanned { control_point, spot } => {
                self.control_points[control_point].spots[spot].weight
            }
            SpotSlot::Segment { control_point } => self.segment_weight(control_point),
        }
    }

    /// MU of every addressable spot, in delivery order.
    pub fn spot_mus(&self) -> Vec<f64> {
        let mpw = self.meterset_per_weight();
        self.spot_slots()
            .into_iter()
            .map(|slot| self.slot_weight(slot) * mpw)
            .collect()
    }

    /// Overwrite the weight of one addressable spot.
    ///
    /// Cumulative weights after the spot and the final cumulative weight move
    /// by the difference. The beam meterset follows the final weight at a
    /// constant meterset per weight and the beam dose follows the meterset.
    pub fn set_slot_weight(&mut self, slot: SpotSlot, weight: f64) {
        let mpw = self.meterset_per_weight();
        let diff = weight - self.slot_weight(slot);
        let first_shifted = match slot {
            SpotSlot::Scanned { control_point, spot } => {
                self.control_points[control_point].spots[spot].weight = weight;
                control_point + 1
            }
            SpotSlot::Segment { control_point } => control_point,
        };
        for cp in self.control_points.iter_mut().skip(first_shifted) {
            cp.cumulative_weight += diff;
        }
        self.final_cumulative_weight += diff;

        if let Some(old_meterset) = self.beam_meterset {
            let new_meterset = self.final_cumulative_weight * mpw;
            if let Some(dose) = self.beam_dose.as_mut() {
                if old_meterset > 0.0 {
                    *dose *= new_meterset / old_meterset;
                }
            }
            self.beam_meterset = Some(new_meterset);
        }
    }

    /// Multiply every weight, the meterset and the dose by `factor`.
    pub fn scale(&mut self, factor: f64) {
        for cp in &mut self.control_points {
            cp.cumulative_weight *= factor;
            for spot in &mut cp.spots {
                spot.weight *= factor;
            }
        }
        self.final_cumulative_weight *= factor;
        if let Some(meterset) = self.beam_meterset.as_mut() {
            *meterset *= factor;
        }
        if let Some(dose) = self.beam_dose.as_mut() {
            *dose *= factor;
        }
    }

    /// Recompute the cumulative dose reference coefficient of every linked
    /// control point as cumulative weight over final weight.
    pub fn refresh_dose_coefficients(&mut self) {
        let total = self.final_cumulative_weight;
        for cp in &mut self.control_points {
            if let Some(link) = cp.dose_reference.as_mut() {
                link.coefficient = Some(if total > 0.0 {
                    cp.cumulative_weight / total
                } else {
                    0.0
                });
            }
        }
    }

    /// Whether cumulative weights never decrease along the control points.
    pub fn is_monotonic(&self) -> bool {
        self.control_points
            .windows(2)
            .all(|w| w[1].cumulative_weight >= w[0].cumulative_weight)
    }

    /// Number of energy layers, counting control points that deliver spots.
    pub fn energy_layer_count(&self) -> usize {
        self.control_points.iter().filter(|cp| cp.delivers_spots()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::control_point::Spot;

    fn scanned_field() -> Field {
        // Two layers as DICOM stores them: start/end pairs, end points carry
        // zero weights.
        let mut cps = vec![
            ControlPoint::with_weight(0.0),
            ControlPoint::with_weight(3.0),
            ControlPoint::with_weight(3.0),
            ControlPoint::with_weight(7.0),
        ];
        cps[0].spots = vec![Spot::new(0.0, 0.0, 1.0), Spot::new(5.0, 0.0, 2.0)];
        cps[1].spots = vec![Spot::new(0.0, 0.0, 0.0), Spot::new(5.0, 0.0, 0.0)];
        cps[2].spots = vec![Spot::new(0.0, 0.0, 4.0)];
        cps[3].spots = vec![Spot::new(0.0, 0.0, 0.0)];
        Field {
            number: 1,
            final_cumulative_weight: 7.0,
            beam_meterset: Some(14.0),
            beam_dose: Some(2.0),
            control_points: cps,
            ..Default::default()
        }
    }

    #[test]
    fn test_segment_slots() {
        let field = Field::from_cumulative_weights(1, &[10.0, 20.0, 35.0]);
        assert_eq!(field.spot_mus(), vec![10.0, 10.0, 15.0]);
    }

    #[test]
    fn test_scanned_slots_skip_empty_layers() {
        let field = scanned_field();
        let slots = field.spot_slots();
        assert_eq!(slots.len(), 3);
        assert_eq!(slots[2], SpotSlot::Scanned { control_point: 2, spot: 0 });
        assert_eq!(field.spot_mus(), vec![2.0, 4.0, 8.0]);
    }

    #[test]
    fn test_set_scanned_weight_shifts_following_points() {
        let mut field = scanned_field();
        field.set_slot_weight(SpotSlot::Scanned { control_point: 0, spot: 1 }, 3.0);
        let weights: Vec<f64> = field.control_points.iter().map(|cp| cp.cumulative_weight).collect();
        assert_eq!(weights, vec![0.0, 4.0, 4.0, 8.0]);
        assert_eq!(field.final_cumulative_weight, 8.0);
        // meterset per weight stays at 2
        assert_eq!(field.beam_meterset, Some(16.0));
        assert!((field.beam_dose.unwrap() - 2.0 * 16.0 / 14.0).abs() < 1e-12);
        assert!(field.is_monotonic());
    }

    #[test]
    fn test_set_segment_weight() {
        let mut field = Field::from_cumulative_weights(1, &[10.0, 20.0, 35.0]);
        field.set_slot_weight(SpotSlot::Segment { control_point: 1 }, 4.0);
        let weights: Vec<f64> = field.control_points.iter().map(|cp| cp.cumulative_weight).collect();
        assert_eq!(weights, vec![10.0, 14.0, 29.0]);
        assert_eq!(field.final_cumulative_weight, 29.0);
    }

    #[test]
    fn test_scale() {
        let mut field = scanned_field();
        let before = field.spot_mus();
        field.scale(0.5);
        let after = field.spot_mus();
        for (b, a) in before.iter().zip(after.iter()) {
            assert!((a - b * 0.5).abs() < 1e-12);
        }
        assert_eq!(field.beam_dose, Some(1.0));
    }

    #[test]
    fn test_refresh_dose_coefficients() {
        let mut field = scanned_field();
        for cp in &mut field.control_points {
            cp.dose_reference = Some(crate::plan::DoseReferenceLink { number: 1, coefficient: None });
        }
        field.refresh_dose_coefficients();
        let coeffs: Vec<f64> = field
            .control_points
            .iter()
            .map(|cp| cp.dose_reference.unwrap().coefficient.unwrap())
            .collect();
        assert_eq!(coeffs, vec![0.0, 3.0 / 7.0, 3.0 / 7.0, 1.0]);
    }

    #[test]
    fn test_meterset_per_weight_fallback() {
        let field = Field::from_cumulative_weights(1, &[1.0, 2.0]);
        assert_eq!(field.meterset_per_weight(), 1.0);
        assert_eq!(scanned_field().meterset_per_weight(), 2.0);
    }
}
