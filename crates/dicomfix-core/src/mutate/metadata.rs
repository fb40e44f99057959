//! Plan metadata edits: approval, dates, intent and names.

use chrono::NaiveDateTime;

use crate::error::{PlanError, Result};
use crate::plan::Plan;

pub const APPROVED: &str = "APPROVED";
pub const CURATIVE: &str = "CURATIVE";

/// Maximum length of a person name (PN) value.
pub const PERSON_NAME_MAX: usize = 64;
/// Maximum length of a short string (SH) value.
pub const SHORT_STRING_MAX: usize = 16;

/// Format a timestamp as DICOM DA.
pub fn dicom_date(now: &NaiveDateTime) -> String {
    now.format("%Y%m%d").to_string()
}

/// Format a timestamp as DICOM TM with microseconds.
pub fn dicom_time(now: &NaiveDateTime) -> String {
    now.format("%H%M%S%.6f").to_string()
}

fn check_text(attribute: &'static str, value: &str, max: usize) -> Result<()> {
    let actual = value.chars().count();
    if actual > max {
        return Err(PlanError::NameTooLong {
            attribute,
            max,
            actual,
        });
    }
    if value.contains('\\') {
        return Err(PlanError::invalid_value(
            attribute,
            "backslash is the DICOM value delimiter",
        ));
    }
    Ok(())
}

/// Mark the plan approved, reviewed at `now`.
pub fn approve(plan: &mut Plan, now: &NaiveDateTime) {
    plan.approval.status = APPROVED.to_string();
    plan.approval.review_date = Some(dicom_date(now));
    plan.approval.review_time = Some(dicom_time(now));
    tracing::info!("New approval status {}", plan.approval.status);
}

/// Overwrite the RT plan date and time with `now`.
pub fn set_plan_date(plan: &mut Plan, now: &NaiveDateTime) {
    plan.plan_date = Some(dicom_date(now));
    plan.plan_time = Some(dicom_time(now));
    tracing::info!(
        "New RT plan date {} time {}",
        plan.plan_date.as_deref().unwrap_or_default(),
        plan.plan_time.as_deref().unwrap_or_default()
    );
}

pub fn set_intent_curative(plan: &mut Plan) {
    plan.intent = Some(CURATIVE.to_string());
    tracing::info!("New plan intent: {}", CURATIVE);
}

pub fn set_patient_name(plan: &mut Plan, name: &str) -> Result<()> {
    check_text("Patient Name", name, PERSON_NAME_MAX)?;
    plan.patient_name = name.to_string();
    tracing::info!("New patient name '{}'", plan.patient_name);
    Ok(())
}

pub fn set_reviewer_name(plan: &mut Plan, name: &str) -> Result<()> {
    check_text("Reviewer Name", name, PERSON_NAME_MAX)?;
    plan.approval.reviewer_name = Some(name.to_string());
    tracing::info!("New reviewer name '{}'", name);
    Ok(())
}

pub fn set_plan_label(plan: &mut Plan, label: &str) -> Result<()> {
    check_text("RT Plan Label", label, SHORT_STRING_MAX)?;
    plan.label = label.to_string();
    tracing::info!("New RT plan label           : '{}'", plan.label);
    Ok(())
}

/// Set the treatment machine name of every field.
pub fn set_treatment_machine(plan: &mut Plan, machine: &str) -> Result<()> {
    check_text("Treatment Machine Name", machine, SHORT_STRING_MAX)?;
    if machine.trim().is_empty() {
        return Err(PlanError::invalid_value("Treatment Machine Name", "empty name"));
    }
    for field in &mut plan.fields {
        field.treatment_machine = machine.to_string();
    }
    tracing::info!("New Treatment Machine Name  : '{}'", machine);
    Ok(())
}
