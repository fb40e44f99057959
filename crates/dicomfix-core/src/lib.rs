//! Core model and edit operations for ion therapy treatment plans.
//!
//! The crate is independent of DICOM encoding: `dicomfix-io` reads a plan
//! into [`Plan`], the operations in [`mutate`] and [`edits`] change it, and
//! [`export`] and [`inspect`] render it.

pub mod edits;
pub mod error;
pub mod export;
pub mod inspect;
pub mod mutate;
pub mod plan;
pub mod weights;

pub use edits::{apply_edits, EditConfig, EditKind, EditReport};
pub use error::{PlanError, Result};
pub use plan::{ControlPoint, Field, Plan, Spot, SpotSlot, TablePosition};
pub use weights::{parse_weight_list, SpotWeight};

/// Smallest spot MU the delivery system accepts.
pub const MU_MIN: f64 = 1.0;

/// Separator line used in log tables and reports.
pub const HLINE: &str = "------------------------------------------------------------------------";
