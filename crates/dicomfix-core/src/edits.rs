//! Edit batches.
//!
//! An [`EditConfig`] collects every requested edit. [`apply_edits`] runs them
//! in a fixed order; a failing edit is recorded in the [`EditReport`] and the
//! remaining edits still run. Completed edits are never rolled back.

use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::{PlanError, Result};
use crate::mutate::{self, RangeShifterChoice};
use crate::plan::{Plan, TablePosition};
use crate::weights::SpotWeight;

/// Requested edits. Every option is independent and optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditConfig {
    pub approve: bool,
    pub date: bool,
    pub intent_curative: bool,
    pub fix_raystation: bool,
    pub wizard_tr4: bool,
    pub gantry_angles: Option<Vec<f64>>,
    pub duplicate_fields: Option<usize>,
    pub rescale_dose: Option<f64>,
    pub rescale_factor: Option<f64>,
    pub rescale_minimize: bool,
    pub table_position_mm: Option<TablePosition>,
    pub snout_position_mm: Option<f64>,
    pub treatment_machine: Option<String>,
    pub plan_label: Option<String>,
    pub patient_name: Option<String>,
    pub reviewer_name: Option<String>,
    pub range_shifter: Option<RangeShifterChoice>,
    pub repaint: Option<usize>,
    /// Loaded from a weight CSV, never from the edit file itself.
    #[serde(skip)]
    pub spot_weights: Option<Vec<SpotWeight>>,
    /// Edits whose input could not be parsed. They are reported as failed
    /// and leave the plan untouched.
    #[serde(skip)]
    pub rejected: Vec<(EditKind, PlanError)>,
}

impl EditConfig {
    /// Whether any rescaling of meterset weights is requested.
    pub fn rescales(&self) -> bool {
        self.rescale_minimize || self.rescale_dose.is_some() || self.rescale_factor.is_some()
    }

    /// Whether the config requests no edit at all.
    pub fn is_empty(&self) -> bool {
        *self == EditConfig::default()
    }
}

/// Identifies one edit of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditKind {
    FixRayStation,
    Approve,
    Date,
    IntentCurative,
    SpotWeights,
    RescaleMinimize,
    RescaleDose,
    RescaleFactor,
    DuplicateFields,
    GantryAngles,
    TablePosition,
    SnoutPosition,
    TreatmentMachine,
    PlanLabel,
    PatientName,
    ReviewerName,
    RangeShifter,
    Repaint,
    WizardTr4,
}

impl fmt::Display for EditKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EditKind::FixRayStation => "fix RayStation",
            EditKind::Approve => "approve",
            EditKind::Date => "date",
            EditKind::IntentCurative => "intent curative",
            EditKind::SpotWeights => "spot weights",
            EditKind::RescaleMinimize => "rescale minimize",
            EditKind::RescaleDose => "rescale dose",
            EditKind::RescaleFactor => "rescale factor",
            EditKind::DuplicateFields => "duplicate fields",
            EditKind::GantryAngles => "gantry angles",
            EditKind::TablePosition => "table position",
            EditKind::SnoutPosition => "snout position",
            EditKind::TreatmentMachine => "treatment machine",
            EditKind::PlanLabel => "plan label",
            EditKind::PatientName => "patient name",
            EditKind::ReviewerName => "reviewer name",
            EditKind::RangeShifter => "range shifter",
            EditKind::Repaint => "repaint",
            EditKind::WizardTr4 => "TR4 wizard",
        };
        f.write_str(name)
    }
}

/// Outcome of an edit batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EditReport {
    pub applied: Vec<EditKind>,
    pub failed: Vec<(EditKind, PlanError)>,
    /// Spots with a positive MU below one MU after all edits.
    pub low_mu_spots: usize,
}

impl EditReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    fn record(&mut self, kind: EditKind, result: Result<()>) {
        match result {
            Ok(()) => self.applied.push(kind),
            Err(e) => {
                tracing::error!("Edit '{}' failed: {}", kind, e);
                self.failed.push((kind, e));
            }
        }
    }
}

/// Apply every requested edit to `plan`.
///
/// Rescale-minimize takes precedence over dose and factor rescaling, and dose
/// rescaling over factor rescaling. Rescaling runs before field duplication.
pub fn apply_edits(plan: &mut Plan, config: &EditConfig, now: &NaiveDateTime) -> EditReport {
    let mut report = EditReport::default();

    for (kind, e) in &config.rejected {
        report.record(*kind, Err(e.clone()));
    }

    if config.fix_raystation {
        mutate::fix_raystation(plan);
        report.record(EditKind::FixRayStation, Ok(()));
    }
    if config.approve {
        mutate::approve(plan, now);
        report.record(EditKind::Approve, Ok(()));
    }
    if config.date {
        mutate::set_plan_date(plan, now);
        report.record(EditKind::Date, Ok(()));
    }
    if config.intent_curative {
        mutate::set_intent_curative(plan);
        report.record(EditKind::IntentCurative, Ok(()));
    }
    if let Some(weights) = &config.spot_weights {
        report.record(EditKind::SpotWeights, mutate::apply_weight_list(plan, weights));
    }

    if config.rescale_minimize {
        if config.rescale_dose.is_some() || config.rescale_factor.is_some() {
            tracing::warn!("Rescale minimize overrides the requested dose or factor rescale");
        }
        report.record(EditKind::RescaleMinimize, mutate::minimize(plan).map(|_| ()));
    } else if let Some(dose) = config.rescale_dose {
        if config.rescale_factor.is_some() {
            tracing::warn!("Rescale dose overrides the requested rescale factor");
        }
        report.record(EditKind::RescaleDose, mutate::rescale_to_dose(plan, dose));
    } else if let Some(factor) = config.rescale_factor {
        report.record(EditKind::RescaleFactor, mutate::rescale_by_factor(plan, factor));
    }

    if let Some(n) = config.duplicate_fields {
        mutate::duplicate_fields(plan, n);
        report.record(EditKind::DuplicateFields, Ok(()));
    }
    if let Some(angles) = &config.gantry_angles {
        report.record(EditKind::GantryAngles, mutate::set_gantry_angles(plan, angles));
    }
    if let Some(position) = config.table_position_mm {
        report.record(EditKind::TablePosition, mutate::set_table_position(plan, position));
    }
    if let Some(position) = config.snout_position_mm {
        report.record(EditKind::SnoutPosition, mutate::set_snout_position(plan, position));
    }
    if let Some(machine) = &config.treatment_machine {
        report.record(EditKind::TreatmentMachine, mutate::set_treatment_machine(plan, machine));
    }
    if let Some(label) = &config.plan_label {
        report.record(EditKind::PlanLabel, mutate::set_plan_label(plan, label));
    }
    if let Some(name) = &config.patient_name {
        report.record(EditKind::PatientName, mutate::set_patient_name(plan, name));
    }
    if let Some(name) = &config.reviewer_name {
        report.record(EditKind::ReviewerName, mutate::set_reviewer_name(plan, name));
    }
    if let Some(choice) = config.range_shifter {
        mutate::set_range_shifter(plan, choice);
        report.record(EditKind::RangeShifter, Ok(()));
    }
    if let Some(n) = config.repaint {
        report.record(EditKind::Repaint, mutate::repaint(plan, n).map(|_| ()));
    }
    if config.wizard_tr4 {
        mutate::prepare_for_tr4(plan, now);
        report.record(EditKind::WizardTr4, Ok(()));
    }

    report.low_mu_spots = mutate::count_low_mu_spots(plan);
    if report.low_mu_spots > 0 {
        tracing::warn!(
            " *** {} out of {} spots are below {:.2} MU ***",
            report.low_mu_spots,
            plan.spot_count(),
            crate::MU_MIN
        );
    }
    report
}
