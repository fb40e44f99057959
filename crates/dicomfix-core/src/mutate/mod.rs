//! Plan mutation operations.
//!
//! Each operation edits a [`Plan`](crate::plan::Plan) in place and validates
//! its own input first; a failed operation leaves the plan as it was.

pub mod metadata;
pub mod geometry;
pub mod fields;
pub mod rescale;
pub mod raystation;

pub use metadata::{
    approve, set_intent_curative, set_patient_name, set_plan_date, set_plan_label,
    set_reviewer_name, set_treatment_machine,
};
pub use geometry::{
    parse_count, parse_number, parse_number_list, parse_table_position_cm, prepare_for_tr4,
    set_gantry_angles, set_range_shifter, set_snout_position, set_table_position,
    RangeShifterChoice,
};
pub use fields::{duplicate_fields, repaint};
pub use rescale::{
    apply_weight_list, count_low_mu_spots, minimize, minimizing_factor, rescale_by_factor,
    rescale_to_dose,
};
pub use raystation::fix_raystation;
