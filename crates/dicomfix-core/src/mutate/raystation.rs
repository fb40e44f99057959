//! Corrections that make RayStation exports acceptable to Varian proton
//! delivery systems.

use uuid::Uuid;

use crate::plan::{DoseReference, DoseReferenceLink, Plan, ToleranceTable};

pub const VARIAN_MANUFACTURER: &str = "Varian Medical System Particle Therapy";
pub const SETUP_TECHNIQUE: &str = "ISOCENTRIC";
pub const ACCESSORY_CODE: &str = "AC123";
pub const SNOUT_ID: &str = "S1";
/// Snout position in mm used when the first control point lacks the attribute.
pub const DEFAULT_SNOUT_POSITION: f64 = 421.0;
pub const DEFAULT_METERSET_RATE: f64 = 100.0;

/// Generate a UID under the UUID-derived root `2.25`.
pub fn generate_uid() -> String {
    format!("2.25.{}", Uuid::new_v4().as_u128())
}

fn default_tolerance_table() -> ToleranceTable {
    ToleranceTable {
        number: 1,
        label: "T1".to_string(),
        gantry_angle: 0.5,
        snout_position: 5.0,
        patient_support_angle: 3.0,
        table_pitch_angle: 3.0,
        table_roll_angle: 3.0,
        table_vertical: 20.0,
        table_longitudinal: 20.0,
        table_lateral: 20.0,
    }
}

/// Apply the fixed sequence of RayStation interop corrections.
pub fn fix_raystation(plan: &mut Plan) {
    tracing::info!("Apply RayStation Fix");
    plan.manufacturer = Some(VARIAN_MANUFACTURER.to_string());

    for setup in &mut plan.patient_setups {
        setup.technique = Some(SETUP_TECHNIQUE.to_string());
        if setup.displacement.take().is_some() {
            tracing::info!(" RayStation: Removing setup displacements from PatientSetupSequence");
        }
    }

    if plan.dose_references.is_empty() {
        tracing::info!(" RayStation: DoseReferenceSequence was missing. Adding a TARGET as #1.");
        plan.dose_references.push(DoseReference {
            number: 1,
            uid: generate_uid(),
            structure_type: "SITE".to_string(),
            description: "Target".to_string(),
        });
    }

    if plan.tolerance_tables.is_empty() {
        tracing::info!(" RayStation: IonToleranceTableSequence was missing. Adding a T1.");
        plan.tolerance_tables.push(default_tolerance_table());
    }

    for field in &mut plan.fields {
        field.manufacturer = Some(VARIAN_MANUFACTURER.to_string());
        field.accessory_code = Some(ACCESSORY_CODE.to_string());
        for id in &mut field.snout_ids {
            *id = SNOUT_ID.to_string();
        }
        field.range_shifter = None;
        field.referenced_tolerance_table = Some(1);

        if let Some(first) = field.control_points.first_mut() {
            for value in [
                &mut first.table_vertical,
                &mut first.table_longitudinal,
                &mut first.table_lateral,
                &mut first.table_pitch,
                &mut first.table_roll,
                &mut first.patient_support_angle,
                &mut first.gantry_angle,
            ] {
                value.get_or_insert(0.0);
            }
            let snout = if first.snout_position_blank {
                0.0
            } else {
                DEFAULT_SNOUT_POSITION
            };
            first.snout_position.get_or_insert(snout);
            first.meterset_rate.get_or_insert(DEFAULT_METERSET_RATE);
        }

        for cp in &mut field.control_points {
            cp.range_shifter_setting = None;
            cp.dose_reference = Some(DoseReferenceLink {
                number: 1,
                coefficient: None,
            });
        }
        field.refresh_dose_coefficients();
    }
}
