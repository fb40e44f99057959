use chrono::NaiveDate;
use dicomfix_core::mutate::{
    duplicate_fields, minimize, rescale_by_factor, rescale_to_dose, set_gantry_angles,
};
use dicomfix_core::{apply_edits, EditConfig, Field, Plan, PlanError};
use proptest::prelude::*;

/// Build a plan from per-field weight increments.
fn plan_from_deltas(deltas: &[Vec<f64>]) -> Plan {
    let fields = deltas
        .iter()
        .enumerate()
        .map(|(j, d)| {
            let weights: Vec<f64> = d
                .iter()
                .scan(0.0, |acc, x| {
                    *acc += x;
                    Some(*acc)
                })
                .collect();
            let mut field = Field::from_cumulative_weights(j as i32 + 1, &weights);
            field.beam_dose = Some(0.5 + j as f64);
            field.beam_meterset = Some(2.0 * field.final_cumulative_weight);
            field.control_points[0].gantry_angle = Some(0.0);
            field
        })
        .collect();
    Plan::with_fields(fields)
}

fn deltas_strategy() -> impl Strategy<Value = Vec<Vec<f64>>> {
    prop::collection::vec(prop::collection::vec(0.5f64..50.0, 1..6), 1..4)
}

fn all_mus(plan: &Plan) -> Vec<f64> {
    plan.fields.iter().flat_map(|f| f.spot_mus()).collect()
}

proptest! {
    #[test]
    fn test_duplication_preserves_ratios(deltas in deltas_strategy(), n in 0usize..4) {
        let original = plan_from_deltas(&deltas);
        let mut plan = original.clone();
        duplicate_fields(&mut plan, n);

        let count = original.field_count();
        prop_assert_eq!(plan.field_count(), count * (1 + n));
        for (k, field) in plan.fields.iter().enumerate() {
            let source = &original.fields[k % count];
            prop_assert_eq!(field.control_points.len(), source.control_points.len());
            for (a, b) in field.control_points.iter().zip(&source.control_points) {
                let ra = a.cumulative_weight / field.final_cumulative_weight;
                let rb = b.cumulative_weight / source.final_cumulative_weight;
                prop_assert!((ra - rb).abs() < 1e-12);
            }
        }
        let mut numbers: Vec<i32> = plan.fields.iter().map(|f| f.number).collect();
        numbers.sort_unstable();
        numbers.dedup();
        prop_assert_eq!(numbers.len(), plan.field_count());
    }

    #[test]
    fn test_factor_composition(deltas in deltas_strategy(), f1 in 0.1f64..10.0, f2 in 0.1f64..10.0) {
        let mut stepwise = plan_from_deltas(&deltas);
        let mut direct = stepwise.clone();
        rescale_by_factor(&mut stepwise, f1).unwrap();
        rescale_by_factor(&mut stepwise, f2).unwrap();
        rescale_by_factor(&mut direct, f1 * f2).unwrap();

        for (a, b) in all_mus(&stepwise).iter().zip(all_mus(&direct).iter()) {
            prop_assert!((a - b).abs() <= 1e-9 * b.abs().max(1.0));
        }
        let da = stepwise.total_dose().unwrap();
        let db = direct.total_dose().unwrap();
        prop_assert!((da - db).abs() <= 1e-9 * db.max(1.0));
    }

    #[test]
    fn test_dose_target_is_reached(deltas in deltas_strategy(), target in 0.1f64..20.0) {
        let mut plan = plan_from_deltas(&deltas);
        rescale_to_dose(&mut plan, target).unwrap();
        let total = plan.total_dose().unwrap();
        prop_assert!((total - target).abs() <= 1e-9 * target.max(1.0));
    }

    #[test]
    fn test_minimize_sets_floor_and_keeps_order(deltas in deltas_strategy()) {
        let mut plan = plan_from_deltas(&deltas);
        let before = all_mus(&plan);
        minimize(&mut plan).unwrap();
        let after = all_mus(&plan);

        let min = plan.min_spot_mu().unwrap();
        prop_assert!((min - 1.0).abs() < 1e-9);
        for i in 0..before.len() {
            for j in 0..before.len() {
                if before[i] < before[j] {
                    prop_assert!(after[i] <= after[j]);
                }
            }
        }
    }

    #[test]
    fn test_gantry_mismatch_leaves_plan(deltas in deltas_strategy(), extra in 1usize..3) {
        let mut plan = plan_from_deltas(&deltas);
        let before = plan.clone();
        let angles = vec![45.0; plan.field_count() + extra];
        let err = set_gantry_angles(&mut plan, &angles).unwrap_err();
        let is_mismatch = matches!(err, PlanError::CountMismatch { .. });
        prop_assert!(is_mismatch);
        prop_assert_eq!(plan, before);
    }
}

#[test]
fn test_minimize_two_field_example() {
    let mut plan = Plan::with_fields(vec![
        Field::from_cumulative_weights(1, &[10.0, 20.0, 35.0]),
        Field::from_cumulative_weights(2, &[5.0, 15.0, 30.0]),
    ]);
    let now = NaiveDate::from_ymd_opt(2024, 1, 15)
        .unwrap()
        .and_hms_opt(12, 0, 0)
        .unwrap();
    let config = EditConfig {
        rescale_minimize: true,
        ..Default::default()
    };
    let report = apply_edits(&mut plan, &config, &now);
    assert!(report.is_success());

    let weights: Vec<Vec<f64>> = plan
        .fields
        .iter()
        .map(|f| f.control_points.iter().map(|cp| cp.cumulative_weight).collect())
        .collect();
    let expected = [vec![2.0, 4.0, 7.0], vec![1.0, 3.0, 6.0]];
    for (got, want) in weights.iter().zip(expected.iter()) {
        for (g, w) in got.iter().zip(want) {
            assert!((g - w).abs() < 1e-9, "got {:?}, want {:?}", got, want);
        }
    }
}
