//! Plan type.

use super::field::Field;

/// Approval state of a plan.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Approval {
    pub status: String,
    pub review_date: Option<String>,
    pub review_time: Option<String>,
    pub reviewer_name: Option<String>,
}

/// Setup displacement attributes of a patient setup, in mm.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SetupDisplacement {
    pub vertical: Option<f64>,
    pub longitudinal: Option<f64>,
    pub lateral: Option<f64>,
}

/// One patient setup entry.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PatientSetup {
    pub number: Option<i32>,
    pub technique: Option<String>,
    /// `None` once the displacement attributes are to be removed.
    pub displacement: Option<SetupDisplacement>,
}

/// One dose reference entry.
#[derive(Debug, Clone, PartialEq)]
pub struct DoseReference {
    pub number: i32,
    pub uid: String,
    pub structure_type: String,
    pub description: String,
}

/// One ion tolerance table entry. Angles in degrees, positions in mm.
#[derive(Debug, Clone, PartialEq)]
pub struct ToleranceTable {
    pub number: i32,
    pub label: String,
    pub gantry_angle: f64,
    pub snout_position: f64,
    pub patient_support_angle: f64,
    pub table_pitch_angle: f64,
    pub table_roll_angle: f64,
    pub table_vertical: f64,
    pub table_longitudinal: f64,
    pub table_lateral: f64,
}

/// An ion treatment plan.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Plan {
    pub patient_name: String,
    pub patient_id: String,
    pub label: String,
    pub plan_date: Option<String>,
    pub plan_time: Option<String>,
    pub intent: Option<String>,
    pub manufacturer: Option<String>,
    pub operators_name: Option<String>,
    pub approval: Approval,
    pub patient_setups: Vec<PatientSetup>,
    pub dose_references: Vec<DoseReference>,
    pub tolerance_tables: Vec<ToleranceTable>,
    pub fields: Vec<Field>,
}

impl Plan {
    /// Create a plan holding the given fields.
    pub fn with_fields(fields: Vec<Field>) -> Self {
        Self {
            fields,
            ..Default::default()
        }
    }

    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    /// Sum of the beam doses of all fields, if every field has one.
    pub fn total_dose(&self) -> Option<f64> {
        self.fields.iter().map(|f| f.beam_dose).sum()
    }

    /// Total number of addressable spots over all fields.
    pub fn spot_count(&self) -> usize {
        self.fields.iter().map(|f| f.spot_slots().len()).sum()
    }

    /// Smallest positive spot MU over the whole plan.
    pub fn min_spot_mu(&self) -> Option<f64> {
        self.fields
            .iter()
            .flat_map(|f| f.spot_mus())
            .filter(|&mu| mu > 0.0)
            .min_by(|a, b| a.total_cmp(b))
    }

    /// Next beam number not used by any field.
    pub fn next_beam_number(&self) -> i32 {
        self.fields.iter().map(|f| f.number).max().unwrap_or(0) + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_field_plan() -> Plan {
        Plan::with_fields(vec![
            Field::from_cumulative_weights(1, &[10.0, 20.0, 35.0]),
            Field::from_cumulative_weights(2, &[5.0, 15.0, 30.0]),
        ])
    }

    #[test]
    fn test_min_spot_mu() {
        assert_eq!(two_field_plan().min_spot_mu(), Some(5.0));
        assert_eq!(Plan::default().min_spot_mu(), None);
    }

    #[test]
    fn test_total_dose_requires_every_field() {
        let mut plan = two_field_plan();
        assert_eq!(plan.total_dose(), None);
        plan.fields[0].beam_dose = Some(1.5);
        plan.fields[1].beam_dose = Some(2.5);
        assert_eq!(plan.total_dose(), Some(4.0));
    }

    #[test]
    fn test_next_beam_number() {
        let mut plan = two_field_plan();
        plan.fields[0].number = 7;
        assert_eq!(plan.next_beam_number(), 8);
        assert_eq!(Plan::default().next_beam_number(), 1);
    }

    #[test]
    fn test_spot_count() {
        assert_eq!(two_field_plan().spot_count(), 6);
    }
}
