//! Human readable plan summary.

use std::fmt::Write;

use crate::plan::Plan;
use crate::HLINE;

fn text(value: Option<&str>) -> &str {
    value.unwrap_or("N/A")
}

fn cm(value: Option<f64>) -> String {
    match value {
        Some(mm) => format!("{:8.2} cm", mm * 0.1),
        None => "     N/A".to_string(),
    }
}

/// Summarize patient, approval and per-field delivery parameters.
pub fn summary(plan: &Plan) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Patient name             : '{}'", plan.patient_name);
    let _ = writeln!(out, "Patient ID               : '{}'", plan.patient_id);
    let _ = writeln!(out, "Approval status          : '{}'", plan.approval.status);
    let _ = writeln!(out, "RT Plan Date             : '{}'", text(plan.plan_date.as_deref()));
    let _ = writeln!(out, "RT Plan Time             : '{}'", text(plan.plan_time.as_deref()));
    let _ = writeln!(out, "Manufacturer             : '{}'", text(plan.manufacturer.as_deref()));
    let _ = writeln!(out, "Plan Label               : '{}'", plan.label);
    let _ = writeln!(out, "Operator's Name          : '{}'", text(plan.operators_name.as_deref()));
    let _ = writeln!(
        out,
        "Reviewer Name            : '{}'",
        text(plan.approval.reviewer_name.as_deref())
    );
    let _ = writeln!(out, "Plan Intent              : '{}'", text(plan.intent.as_deref()));
    let _ = writeln!(out, "Number of fields         : {}", plan.field_count());
    if let Some(dose) = plan.total_dose() {
        let _ = writeln!(out, "Total Beam Dose          : {:.2} Gy(RBE)", dose);
    }
    if let Some(first) = plan.fields.first() {
        let _ = writeln!(out, "Treatment Machine Name   : '{}'", first.treatment_machine);
    }

    for (i, field) in plan.fields.iter().enumerate() {
        let _ = writeln!(out, "{}", HLINE);
        let _ = writeln!(out, "    Field #{} (beam number {})", i + 1, field.number);
        let _ = writeln!(out, "{}", HLINE);
        let _ = writeln!(out, "    Beam Name                : '{}'", field.name);
        let _ = writeln!(out, "    Number of control points : {}", field.control_points.len());
        let _ = writeln!(out, "    Number of energy layers  : {}", field.energy_layer_count());
        let _ = writeln!(
            out,
            "    Final Cumulative Meterset Weight : {:.2}",
            field.final_cumulative_weight
        );
        if let Some(meterset) = field.beam_meterset {
            let _ = writeln!(out, "    Beam Meterset            : {:.2} MU", meterset);
        }
        if let Some(dose) = field.beam_dose {
            let _ = writeln!(out, "    Beam Dose                : {:.2} Gy(RBE)", dose);
        }
        if let Some(rs) = &field.range_shifter {
            let _ = writeln!(out, "    Range Shifter            : '{}'", rs.id);
        }

        let Some(first) = field.control_points.first() else {
            continue;
        };
        match first.gantry_angle {
            Some(angle) => {
                let _ = writeln!(out, "            Gantry Angle                     : {:8.2} deg", angle);
            }
            None => {
                let _ = writeln!(out, "            Gantry Angle                     :      N/A");
            }
        }
        let _ = writeln!(out, "            Snout Position                   : {}", cm(first.snout_position));
        let _ = writeln!(out, "            Table Top Vertical Position      : {}", cm(first.table_vertical));
        let _ = writeln!(
            out,
            "            Table Top Longitudinal Position  : {}",
            cm(first.table_longitudinal)
        );
        let _ = writeln!(out, "            Table Top Lateral Position       : {}", cm(first.table_lateral));

        let mut layer = 0;
        for cp in field.control_points.iter().filter(|cp| cp.delivers_spots()) {
            layer += 1;
            let _ = writeln!(out, "{}", HLINE);
            let _ = writeln!(out, "        Energy Layer # {:02}", layer);
            if let Some(energy) = cp.nominal_energy {
                let _ = writeln!(out, "            Nominal Beam Energy              : {:.2} MeV", energy);
            }
            let _ = writeln!(out, "            Number of Scan Spot Positions    : {}", cp.spots.len());
            let _ = writeln!(
                out,
                "            Cumulative Meterset Weight       : {:.2}",
                cp.cumulative_weight
            );
        }
    }
    out.push_str(HLINE);
    out.push('\n');
    out
}
