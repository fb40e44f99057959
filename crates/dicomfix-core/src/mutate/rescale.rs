//! Meterset rescaling and spot weight overwrites.
//!
//! Rescaling multiplies every meterset weight of the plan together with the
//! beam meterset and beam dose, so that the meterset per weight of a field is
//! preserved and every spot MU scales by the same factor.

use crate::error::{require_positive, PlanError, Result};
use crate::plan::Plan;
use crate::weights::SpotWeight;
use crate::{HLINE, MU_MIN};

/// Multiply every spot MU in the plan by `factor`.
pub fn rescale_by_factor(plan: &mut Plan, factor: f64) -> Result<()> {
    let factor = require_positive("rescale factor", factor)?;
    for (j, field) in plan.fields.iter_mut().enumerate() {
        let old_meterset = field.beam_meterset;
        let old_dose = field.beam_dose;
        let old_weight = field.final_cumulative_weight;

        field.scale(factor);
        field.refresh_dose_coefficients();

        tracing::info!("Rescaling field # {:02} by factor {:.4}", j + 1, factor);
        tracing::info!("                                           Original           New   ");
        tracing::info!("{}", HLINE);
        tracing::info!(
            "Final Cumulative Meterset Weight   : {:14.2}  {:14.2}  ",
            old_weight,
            field.final_cumulative_weight
        );
        if let (Some(old), Some(new)) = (old_meterset, field.beam_meterset) {
            tracing::info!("Beam Meterset                      : {:14.2}  {:14.2}  MU ", old, new);
        }
        if let (Some(old), Some(new)) = (old_dose, field.beam_dose) {
            tracing::info!("Beam Dose                          : {:14.2}  {:14.2}  Gy(RBE)", old, new);
        }
        tracing::info!("{}", HLINE);
    }
    Ok(())
}

/// Rescale the plan so that its total dose equals `target` Gy(RBE).
pub fn rescale_to_dose(plan: &mut Plan, target: f64) -> Result<()> {
    let target = require_positive("rescale dose", target)?;
    let mut total = 0.0;
    for (j, field) in plan.fields.iter().enumerate() {
        match field.beam_dose {
            Some(dose) if dose > 0.0 => total += dose,
            _ => return Err(PlanError::MissingBeamDose { field: j + 1 }),
        }
    }
    if total <= 0.0 {
        return Err(PlanError::NoDeliverableSpots);
    }
    tracing::info!("Rescaling dose from {:.2} to {:.2} Gy(RBE)", total, target);
    rescale_by_factor(plan, target / total)
}

/// Factor that brings the smallest positive spot MU of the plan to [`MU_MIN`].
pub fn minimizing_factor(plan: &Plan) -> Result<f64> {
    let lowest = plan.min_spot_mu().ok_or(PlanError::NoDeliverableSpots)?;
    tracing::info!("lowest spot: {:14.2} [MU]", lowest);
    Ok(MU_MIN / lowest)
}

/// Rescale the plan so that its smallest spot delivers exactly [`MU_MIN`].
pub fn minimize(plan: &mut Plan) -> Result<f64> {
    let factor = minimizing_factor(plan)?;
    tracing::info!("rescale by factor: {:.4}", factor);
    rescale_by_factor(plan, factor)?;
    Ok(factor)
}

/// Overwrite addressed spots with the MU values of an external list.
///
/// Every entry is validated before the first write.
pub fn apply_weight_list(plan: &mut Plan, weights: &[SpotWeight]) -> Result<()> {
    let mut resolved = Vec::with_capacity(weights.len());
    for entry in weights {
        let field = plan.fields.get(entry.field).ok_or(PlanError::FieldOutOfRange {
            index: entry.field,
            available: plan.field_count(),
        })?;
        let slots = field.spot_slots();
        let slot = *slots.get(entry.spot).ok_or(PlanError::SpotOutOfRange {
            field: entry.field,
            spot: entry.spot,
            available: slots.len(),
        })?;
        if !(entry.mu.is_finite() && entry.mu >= 0.0) {
            return Err(PlanError::out_of_range("spot MU", entry.mu));
        }
        resolved.push((entry.field, slot, entry.mu));
    }

    // Resolve all slots first: zeroing a spot can hide a whole layer from
    // the slot list of its field.
    for (field_index, slot, mu) in resolved {
        let field = &mut plan.fields[field_index];
        let weight = mu / field.meterset_per_weight();
        tracing::debug!(
            "Field #{} {:?}: weight {:.4} -> {:.4}",
            field_index + 1,
            slot,
            field.slot_weight(slot),
            weight
        );
        field.set_slot_weight(slot, weight);
    }
    for field in &mut plan.fields {
        field.refresh_dose_coefficients();
    }
    tracing::info!("Applied {} spot weights from external list", weights.len());
    Ok(())
}

/// Number of spots with a positive MU below [`MU_MIN`].
pub fn count_low_mu_spots(plan: &Plan) -> usize {
    plan.fields
        .iter()
        .flat_map(|f| f.spot_mus())
        .filter(|&mu| mu > 0.0 && mu < MU_MIN)
        .count()
}
