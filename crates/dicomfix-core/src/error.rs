//! Error types for plan editing operations.
//!
//! Every plan operation validates its own preconditions and reports a
//! [`PlanError`] without touching the plan when validation fails.

use thiserror::Error;

/// Main error type for plan operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlanError {
    /// A list of values does not match the number of items it applies to.
    #[error("Count mismatch for {what}: expected {expected}, got {actual}")]
    CountMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    /// A field index is outside the plan's field sequence.
    #[error("Field index {index} out of range: plan has {available} fields")]
    FieldOutOfRange { index: usize, available: usize },

    /// A spot index is outside a field's addressable spots.
    #[error("Spot index {spot} out of range in field {field}: field has {available} spots")]
    SpotOutOfRange {
        field: usize,
        spot: usize,
        available: usize,
    },

    /// A numeric option is outside its allowed range.
    #[error("Value out of range for {what}: {value}")]
    ValueOutOfRange { what: &'static str, value: f64 },

    /// A numeric option could not be parsed.
    #[error("Malformed number for {what}: '{input}'")]
    MalformedNumber { what: &'static str, input: String },

    /// A string exceeds the maximum length of its DICOM attribute.
    #[error("{attribute} is limited to {max} characters, got {actual}")]
    NameTooLong {
        attribute: &'static str,
        max: usize,
        actual: usize,
    },

    /// A string or option value is not acceptable for its attribute.
    #[error("Invalid value for {what}: {reason}")]
    InvalidValue { what: &'static str, reason: String },

    /// Dose rescaling needs a beam dose for every field.
    #[error("Beam dose missing or not positive for field #{field}")]
    MissingBeamDose { field: usize },

    /// No spot in the plan carries a positive weight.
    #[error("Plan has no deliverable spots")]
    NoDeliverableSpots,

    /// Fewer addressable spots than requested.
    #[error("Requested {requested} spots but plan has only {available}")]
    InsufficientSpots { requested: usize, available: usize },

    /// A row of an external weight list could not be parsed.
    #[error("Malformed weight list row {line}: {reason}")]
    MalformedWeightRow { line: usize, reason: String },
}

/// Result type for plan operations.
pub type Result<T> = std::result::Result<T, PlanError>;

impl PlanError {
    /// Create a count mismatch error.
    pub fn count_mismatch(what: &'static str, expected: usize, actual: usize) -> Self {
        Self::CountMismatch {
            what,
            expected,
            actual,
        }
    }

    /// Create a value out of range error.
    pub fn out_of_range(what: &'static str, value: f64) -> Self {
        Self::ValueOutOfRange { what, value }
    }

    /// Create a malformed number error.
    pub fn malformed_number(what: &'static str, input: impl Into<String>) -> Self {
        Self::MalformedNumber {
            what,
            input: input.into(),
        }
    }

    /// Create an invalid value error.
    pub fn invalid_value(what: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            what,
            reason: reason.into(),
        }
    }

    /// Create a malformed weight row error.
    pub fn malformed_row(line: usize, reason: impl Into<String>) -> Self {
        Self::MalformedWeightRow {
            line,
            reason: reason.into(),
        }
    }
}

/// Require `value` to be finite and strictly positive.
pub(crate) fn require_positive(what: &'static str, value: f64) -> Result<f64> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(PlanError::out_of_range(what, value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PlanError::count_mismatch("gantry angles", 2, 3);
        assert_eq!(
            err.to_string(),
            "Count mismatch for gantry angles: expected 2, got 3"
        );
    }

    #[test]
    fn test_name_too_long_display() {
        let err = PlanError::NameTooLong {
            attribute: "RT Plan Label",
            max: 16,
            actual: 20,
        };
        let msg = err.to_string();
        assert!(msg.contains("16"));
        assert!(msg.contains("20"));
    }

    #[test]
    fn test_require_positive() {
        assert_eq!(require_positive("factor", 2.0), Ok(2.0));
        assert!(require_positive("factor", 0.0).is_err());
        assert!(require_positive("factor", -1.0).is_err());
        assert!(require_positive("factor", f64::NAN).is_err());
        assert!(require_positive("factor", f64::INFINITY).is_err());
    }
}
