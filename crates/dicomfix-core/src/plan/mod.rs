//! Owned treatment plan model.
//!
//! This module provides the plan/field/control-point tree that every edit
//! operates on. The tree is extracted from a parsed DICOM object by the I/O
//! layer and written back into it before serialization.

pub mod plan;
pub mod field;
pub mod control_point;

pub use plan::{Approval, DoseReference, PatientSetup, Plan, SetupDisplacement, ToleranceTable};
pub use field::{Field, RangeShifter, SpotSlot};
pub use control_point::{ControlPoint, DoseReferenceLink, RangeShifterSetting, Spot, TablePosition};
