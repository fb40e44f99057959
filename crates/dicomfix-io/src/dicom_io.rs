//! Reading and writing RT Ion Plans.
//!
//! [`read_plan`] extracts the owned [`Plan`] model from a DICOM object and
//! [`write_plan`] merges a (possibly edited) model back into it. Attributes
//! the model does not know about are preserved, and duplicated fields are
//! cloned from the beam item they were read from.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{bail, Context, Result};
use dicom::core::VR;
use dicom::dictionary_std::{tags, uids};
use dicom::object::{open_file, DefaultDicomObject, InMemDicomObject};

use dicomfix_core::plan::{
    Approval, ControlPoint, DoseReference, DoseReferenceLink, Field, PatientSetup, Plan,
    RangeShifter, RangeShifterSetting, SetupDisplacement, Spot, ToleranceTable,
};

use crate::element::{
    get_f64, get_f64_vec, get_i32, get_items, get_string, put_ds, put_fl, put_is, put_opt_ds,
    put_opt_fl, put_opt_str, put_sequence, put_str,
};

/// Open a DICOM file.
///
/// The error does not carry the path; callers add it when it is safe to show.
pub fn open_plan_file<P: AsRef<Path>>(path: P) -> Result<DefaultDicomObject> {
    let obj = open_file(path.as_ref()).context("Failed to open DICOM file")?;
    match get_string(&obj, tags::SOP_CLASS_UID) {
        Some(uid) if uid == uids::RT_ION_PLAN_STORAGE => {}
        Some(uid) => tracing::warn!("SOP Class UID {} is not RT Ion Plan Storage", uid),
        None => tracing::warn!("DICOM file has no SOP Class UID"),
    }
    Ok(obj)
}

/// Open a DICOM file and read its plan.
pub fn load_plan<P: AsRef<Path>>(path: P) -> Result<(DefaultDicomObject, Plan)> {
    let obj = open_plan_file(path)?;
    let plan = read_plan(&obj)?;
    Ok((obj, plan))
}

/// Merge `plan` into `obj` and write it to `path`.
pub fn save_plan<P: AsRef<Path>>(obj: &mut DefaultDicomObject, plan: &Plan, path: P) -> Result<()> {
    write_plan(obj, plan)?;
    obj.write_to_file(path.as_ref())
        .context("Failed to write DICOM file")?;
    tracing::info!("Wrote {}", path.as_ref().display());
    Ok(())
}

// --- Reading ---

/// Extract the plan model from an RT Ion Plan object.
pub fn read_plan(obj: &InMemDicomObject) -> Result<Plan> {
    let beams = get_items(obj, tags::ION_BEAM_SEQUENCE);
    if beams.is_empty() {
        bail!("Not an RT Ion Plan: IonBeamSequence is missing or empty");
    }

    // Beam dose and meterset by referenced beam number
    let mut fraction: HashMap<i32, (Option<f64>, Option<f64>)> = HashMap::new();
    if let Some(group) = get_items(obj, tags::FRACTION_GROUP_SEQUENCE).first() {
        for rb in get_items(group, tags::REFERENCED_BEAM_SEQUENCE) {
            if let Some(number) = get_i32(rb, tags::REFERENCED_BEAM_NUMBER) {
                fraction.insert(
                    number,
                    (get_f64(rb, tags::BEAM_DOSE), get_f64(rb, tags::BEAM_METERSET)),
                );
            }
        }
    } else {
        tracing::warn!("Plan has no FractionGroupSequence; spot weights are read as MU");
    }

    let mut fields = Vec::with_capacity(beams.len());
    for (j, beam) in beams.iter().enumerate() {
        let mut field = read_field(beam).with_context(|| format!("Invalid ion beam #{}", j + 1))?;
        if let Some(&(dose, meterset)) = fraction.get(&field.number) {
            field.beam_dose = dose;
            field.beam_meterset = meterset;
        }
        field.origin = Some(j);
        fields.push(field);
    }

    let plan = Plan {
        patient_name: get_string(obj, tags::PATIENT_NAME).unwrap_or_default(),
        patient_id: get_string(obj, tags::PATIENT_ID).unwrap_or_default(),
        label: get_string(obj, tags::RT_PLAN_LABEL).unwrap_or_default(),
        plan_date: get_string(obj, tags::RT_PLAN_DATE),
        plan_time: get_string(obj, tags::RT_PLAN_TIME),
        intent: get_string(obj, tags::PLAN_INTENT),
        manufacturer: get_string(obj, tags::MANUFACTURER),
        operators_name: get_string(obj, tags::OPERATORS_NAME),
        approval: Approval {
            status: get_string(obj, tags::APPROVAL_STATUS).unwrap_or_default(),
            review_date: get_string(obj, tags::REVIEW_DATE),
            review_time: get_string(obj, tags::REVIEW_TIME),
            reviewer_name: get_string(obj, tags::REVIEWER_NAME),
        },
        patient_setups: get_items(obj, tags::PATIENT_SETUP_SEQUENCE)
            .iter()
            .map(read_patient_setup)
            .collect(),
        dose_references: get_items(obj, tags::DOSE_REFERENCE_SEQUENCE)
            .iter()
            .map(read_dose_reference)
            .collect(),
        tolerance_tables: get_items(obj, tags::ION_TOLERANCE_TABLE_SEQUENCE)
            .iter()
            .map(read_tolerance_table)
            .collect(),
        fields,
    };
    tracing::info!(
        "Read plan '{}' with {} fields and {} spots",
        plan.label,
        plan.field_count(),
        plan.spot_count()
    );
    Ok(plan)
}

fn read_patient_setup(item: &InMemDicomObject) -> PatientSetup {
    let displacement = SetupDisplacement {
        vertical: get_f64(item, tags::TABLE_TOP_VERTICAL_SETUP_DISPLACEMENT),
        longitudinal: get_f64(item, tags::TABLE_TOP_LONGITUDINAL_SETUP_DISPLACEMENT),
        lateral: get_f64(item, tags::TABLE_TOP_LATERAL_SETUP_DISPLACEMENT),
    };
    PatientSetup {
        number: get_i32(item, tags::PATIENT_SETUP_NUMBER),
        technique: get_string(item, tags::SETUP_TECHNIQUE),
        displacement: Some(displacement),
    }
}

fn read_dose_reference(item: &InMemDicomObject) -> DoseReference {
    DoseReference {
        number: get_i32(item, tags::DOSE_REFERENCE_NUMBER).unwrap_or(1),
        uid: get_string(item, tags::DOSE_REFERENCE_UID).unwrap_or_default(),
        structure_type: get_string(item, tags::DOSE_REFERENCE_STRUCTURE_TYPE).unwrap_or_default(),
        description: get_string(item, tags::DOSE_REFERENCE_DESCRIPTION).unwrap_or_default(),
    }
}

fn read_tolerance_table(item: &InMemDicomObject) -> ToleranceTable {
    let get = |tag| get_f64(item, tag).unwrap_or(0.0);
    ToleranceTable {
        number: get_i32(item, tags::TOLERANCE_TABLE_NUMBER).unwrap_or(1),
        label: get_string(item, tags::TOLERANCE_TABLE_LABEL).unwrap_or_default(),
        gantry_angle: get(tags::GANTRY_ANGLE_TOLERANCE),
        snout_position: get(tags::SNOUT_POSITION_TOLERANCE),
        patient_support_angle: get(tags::PATIENT_SUPPORT_ANGLE_TOLERANCE),
        table_pitch_angle: get(tags::TABLE_TOP_PITCH_ANGLE_TOLERANCE),
        table_roll_angle: get(tags::TABLE_TOP_ROLL_ANGLE_TOLERANCE),
        table_vertical: get(tags::TABLE_TOP_VERTICAL_POSITION_TOLERANCE),
        table_longitudinal: get(tags::TABLE_TOP_LONGITUDINAL_POSITION_TOLERANCE),
        table_lateral: get(tags::TABLE_TOP_LATERAL_POSITION_TOLERANCE),
    }
}

fn read_field(beam: &InMemDicomObject) -> Result<Field> {
    let number = get_i32(beam, tags::BEAM_NUMBER).context("Missing BeamNumber")?;
    let final_cumulative_weight = get_f64(beam, tags::FINAL_CUMULATIVE_METERSET_WEIGHT)
        .context("Missing FinalCumulativeMetersetWeight")?;

    let control_points = get_items(beam, tags::ION_CONTROL_POINT_SEQUENCE)
        .iter()
        .enumerate()
        .map(|(k, item)| read_control_point(item).with_context(|| format!("Invalid control point #{}", k)))
        .collect::<Result<Vec<_>>>()?;
    if control_points.is_empty() {
        bail!("IonControlPointSequence is missing or empty");
    }

    let range_shifter = get_items(beam, tags::RANGE_SHIFTER_SEQUENCE)
        .first()
        .map(|rs| RangeShifter {
            number: get_i32(rs, tags::RANGE_SHIFTER_NUMBER).unwrap_or(1),
            id: get_string(rs, tags::RANGE_SHIFTER_ID).unwrap_or_default(),
            kind: get_string(rs, tags::RANGE_SHIFTER_TYPE).unwrap_or_default(),
        });

    Ok(Field {
        number,
        name: get_string(beam, tags::BEAM_NAME).unwrap_or_default(),
        treatment_machine: get_string(beam, tags::TREATMENT_MACHINE_NAME).unwrap_or_default(),
        manufacturer: get_string(beam, tags::MANUFACTURER),
        accessory_code: get_string(beam, tags::PATIENT_SUPPORT_ACCESSORY_CODE),
        snout_ids: get_items(beam, tags::SNOUT_SEQUENCE)
            .iter()
            .map(|s| get_string(s, tags::SNOUT_ID).unwrap_or_default())
            .collect(),
        range_shifter,
        referenced_tolerance_table: get_i32(beam, tags::REFERENCED_TOLERANCE_TABLE_NUMBER),
        final_cumulative_weight,
        beam_dose: None,
        beam_meterset: None,
        control_points,
        origin: None,
    })
}

fn read_control_point(item: &InMemDicomObject) -> Result<ControlPoint> {
    let cumulative_weight =
        get_f64(item, tags::CUMULATIVE_METERSET_WEIGHT).context("Missing CumulativeMetersetWeight")?;

    let weights = get_f64_vec(item, tags::SCAN_SPOT_METERSET_WEIGHTS).unwrap_or_default();
    let positions = get_f64_vec(item, tags::SCAN_SPOT_POSITION_MAP).unwrap_or_default();
    if positions.len() != 2 * weights.len() {
        bail!(
            "ScanSpotPositionMap has {} values for {} spot weights",
            positions.len(),
            weights.len()
        );
    }
    let spots = positions
        .chunks_exact(2)
        .zip(&weights)
        .map(|(xy, &w)| Spot::new(xy[0], xy[1], w))
        .collect();

    let range_shifter_setting = get_items(item, tags::RANGE_SHIFTER_SETTINGS_SEQUENCE)
        .first()
        .map(|s| RangeShifterSetting {
            setting: get_string(s, tags::RANGE_SHIFTER_SETTING).unwrap_or_default(),
            isocenter_distance: get_f64(s, tags::ISOCENTER_TO_RANGE_SHIFTER_DISTANCE),
            water_equivalent_thickness: get_f64(s, tags::RANGE_SHIFTER_WATER_EQUIVALENT_THICKNESS),
            referenced_number: get_i32(s, tags::REFERENCED_RANGE_SHIFTER_NUMBER).unwrap_or(1),
        });

    let dose_reference = get_items(item, tags::REFERENCED_DOSE_REFERENCE_SEQUENCE)
        .first()
        .map(|r| DoseReferenceLink {
            number: get_i32(r, tags::REFERENCED_DOSE_REFERENCE_NUMBER).unwrap_or(1),
            coefficient: get_f64(r, tags::CUMULATIVE_DOSE_REFERENCE_COEFFICIENT),
        });

    let snout_position = get_f64(item, tags::SNOUT_POSITION);
    let snout_position_blank =
        snout_position.is_none() && item.element(tags::SNOUT_POSITION).is_ok();

    Ok(ControlPoint {
        cumulative_weight,
        nominal_energy: get_f64(item, tags::NOMINAL_BEAM_ENERGY),
        gantry_angle: get_f64(item, tags::GANTRY_ANGLE),
        snout_position,
        snout_position_blank,
        table_vertical: get_f64(item, tags::TABLE_TOP_VERTICAL_POSITION),
        table_longitudinal: get_f64(item, tags::TABLE_TOP_LONGITUDINAL_POSITION),
        table_lateral: get_f64(item, tags::TABLE_TOP_LATERAL_POSITION),
        table_pitch: get_f64(item, tags::TABLE_TOP_PITCH_ANGLE),
        table_roll: get_f64(item, tags::TABLE_TOP_ROLL_ANGLE),
        patient_support_angle: get_f64(item, tags::PATIENT_SUPPORT_ANGLE),
        meterset_rate: get_f64(item, tags::METERSET_RATE),
        range_shifter_setting,
        dose_reference,
        spots,
    })
}

// --- Writing ---

/// Merge the plan model into `obj`.
pub fn write_plan(obj: &mut InMemDicomObject, plan: &Plan) -> Result<()> {
    put_str(obj, tags::PATIENT_NAME, VR::PN, &plan.patient_name);
    put_str(obj, tags::PATIENT_ID, VR::LO, &plan.patient_id);
    put_str(obj, tags::RT_PLAN_LABEL, VR::SH, &plan.label);
    put_opt_str(obj, tags::RT_PLAN_DATE, VR::DA, plan.plan_date.as_deref());
    put_opt_str(obj, tags::RT_PLAN_TIME, VR::TM, plan.plan_time.as_deref());
    put_opt_str(obj, tags::PLAN_INTENT, VR::CS, plan.intent.as_deref());
    put_opt_str(obj, tags::MANUFACTURER, VR::LO, plan.manufacturer.as_deref());
    put_opt_str(obj, tags::OPERATORS_NAME, VR::PN, plan.operators_name.as_deref());
    if !plan.approval.status.is_empty() {
        put_str(obj, tags::APPROVAL_STATUS, VR::CS, &plan.approval.status);
    }
    put_opt_str(obj, tags::REVIEW_DATE, VR::DA, plan.approval.review_date.as_deref());
    put_opt_str(obj, tags::REVIEW_TIME, VR::TM, plan.approval.review_time.as_deref());
    put_opt_str(obj, tags::REVIEWER_NAME, VR::PN, plan.approval.reviewer_name.as_deref());

    write_patient_setups(obj, &plan.patient_setups);
    write_dose_references(obj, &plan.dose_references);
    write_tolerance_tables(obj, &plan.tolerance_tables);

    let beams = get_items(obj, tags::ION_BEAM_SEQUENCE).to_vec();
    let original_numbers: Vec<Option<i32>> =
        beams.iter().map(|b| get_i32(b, tags::BEAM_NUMBER)).collect();
    let mut new_beams = Vec::with_capacity(plan.field_count());
    for field in &plan.fields {
        let mut item = match field.origin {
            Some(o) => beams
                .get(o)
                .cloned()
                .with_context(|| format!("Field {} refers to missing beam item #{}", field.number, o + 1))?,
            None => InMemDicomObject::new_empty(),
        };
        write_field(&mut item, field);
        new_beams.push(item);
    }
    put_sequence(obj, tags::ION_BEAM_SEQUENCE, new_beams);

    write_fraction_group(obj, plan, &original_numbers);
    Ok(())
}

fn write_patient_setups(obj: &mut InMemDicomObject, setups: &[PatientSetup]) {
    let mut items = get_items(obj, tags::PATIENT_SETUP_SEQUENCE).to_vec();
    if items.is_empty() && setups.is_empty() {
        return;
    }
    items.resize_with(setups.len(), InMemDicomObject::new_empty);
    for (item, setup) in items.iter_mut().zip(setups) {
        if let Some(number) = setup.number {
            put_is(item, tags::PATIENT_SETUP_NUMBER, number.into());
        }
        put_opt_str(item, tags::SETUP_TECHNIQUE, VR::CS, setup.technique.as_deref());
        match setup.displacement {
            Some(d) => {
                put_opt_ds(item, tags::TABLE_TOP_VERTICAL_SETUP_DISPLACEMENT, d.vertical);
                put_opt_ds(item, tags::TABLE_TOP_LONGITUDINAL_SETUP_DISPLACEMENT, d.longitudinal);
                put_opt_ds(item, tags::TABLE_TOP_LATERAL_SETUP_DISPLACEMENT, d.lateral);
            }
            None => {
                item.remove_element(tags::TABLE_TOP_VERTICAL_SETUP_DISPLACEMENT);
                item.remove_element(tags::TABLE_TOP_LONGITUDINAL_SETUP_DISPLACEMENT);
                item.remove_element(tags::TABLE_TOP_LATERAL_SETUP_DISPLACEMENT);
            }
        }
    }
    put_sequence(obj, tags::PATIENT_SETUP_SEQUENCE, items);
}

fn write_dose_references(obj: &mut InMemDicomObject, references: &[DoseReference]) {
    if references.is_empty() {
        return;
    }
    let mut items = get_items(obj, tags::DOSE_REFERENCE_SEQUENCE).to_vec();
    items.resize_with(references.len(), InMemDicomObject::new_empty);
    for (item, r) in items.iter_mut().zip(references) {
        put_is(item, tags::DOSE_REFERENCE_NUMBER, r.number.into());
        put_str(item, tags::DOSE_REFERENCE_UID, VR::UI, &r.uid);
        put_str(item, tags::DOSE_REFERENCE_STRUCTURE_TYPE, VR::CS, &r.structure_type);
        put_str(item, tags::DOSE_REFERENCE_DESCRIPTION, VR::LO, &r.description);
    }
    put_sequence(obj, tags::DOSE_REFERENCE_SEQUENCE, items);
}

fn write_tolerance_tables(obj: &mut InMemDicomObject, tables: &[ToleranceTable]) {
    if tables.is_empty() {
        return;
    }
    let mut items = get_items(obj, tags::ION_TOLERANCE_TABLE_SEQUENCE).to_vec();
    items.resize_with(tables.len(), InMemDicomObject::new_empty);
    for (item, t) in items.iter_mut().zip(tables) {
        put_is(item, tags::TOLERANCE_TABLE_NUMBER, t.number.into());
        put_str(item, tags::TOLERANCE_TABLE_LABEL, VR::SH, &t.label);
        put_ds(item, tags::GANTRY_ANGLE_TOLERANCE, t.gantry_angle);
        put_fl(item, tags::SNOUT_POSITION_TOLERANCE, &[t.snout_position]);
        put_ds(item, tags::PATIENT_SUPPORT_ANGLE_TOLERANCE, t.patient_support_angle);
        put_fl(item, tags::TABLE_TOP_PITCH_ANGLE_TOLERANCE, &[t.table_pitch_angle]);
        put_fl(item, tags::TABLE_TOP_ROLL_ANGLE_TOLERANCE, &[t.table_roll_angle]);
        put_ds(item, tags::TABLE_TOP_VERTICAL_POSITION_TOLERANCE, t.table_vertical);
        put_ds(item, tags::TABLE_TOP_LONGITUDINAL_POSITION_TOLERANCE, t.table_longitudinal);
        put_ds(item, tags::TABLE_TOP_LATERAL_POSITION_TOLERANCE, t.table_lateral);
    }
    put_sequence(obj, tags::ION_TOLERANCE_TABLE_SEQUENCE, items);
}

fn write_field(beam: &mut InMemDicomObject, field: &Field) {
    put_is(beam, tags::BEAM_NUMBER, field.number.into());
    put_str(beam, tags::BEAM_NAME, VR::LO, &field.name);
    put_str(beam, tags::TREATMENT_MACHINE_NAME, VR::SH, &field.treatment_machine);
    put_opt_str(beam, tags::MANUFACTURER, VR::LO, field.manufacturer.as_deref());
    put_opt_str(
        beam,
        tags::PATIENT_SUPPORT_ACCESSORY_CODE,
        VR::SH,
        field.accessory_code.as_deref(),
    );
    if let Some(number) = field.referenced_tolerance_table {
        put_is(beam, tags::REFERENCED_TOLERANCE_TABLE_NUMBER, number.into());
    }
    put_ds(beam, tags::FINAL_CUMULATIVE_METERSET_WEIGHT, field.final_cumulative_weight);
    put_is(beam, tags::NUMBER_OF_CONTROL_POINTS, field.control_points.len() as i64);

    if !field.snout_ids.is_empty() {
        let mut snouts = get_items(beam, tags::SNOUT_SEQUENCE).to_vec();
        snouts.resize_with(field.snout_ids.len(), InMemDicomObject::new_empty);
        for (item, id) in snouts.iter_mut().zip(&field.snout_ids) {
            put_str(item, tags::SNOUT_ID, VR::SH, id);
        }
        put_sequence(beam, tags::SNOUT_SEQUENCE, snouts);
    }

    match &field.range_shifter {
        Some(rs) => {
            let mut item = get_items(beam, tags::RANGE_SHIFTER_SEQUENCE)
                .first()
                .cloned()
                .unwrap_or_else(InMemDicomObject::new_empty);
            put_is(&mut item, tags::RANGE_SHIFTER_NUMBER, rs.number.into());
            put_str(&mut item, tags::RANGE_SHIFTER_ID, VR::SH, &rs.id);
            put_str(&mut item, tags::RANGE_SHIFTER_TYPE, VR::CS, &rs.kind);
            put_sequence(beam, tags::RANGE_SHIFTER_SEQUENCE, vec![item]);
            put_is(beam, tags::NUMBER_OF_RANGE_SHIFTERS, 1);
        }
        None => {
            beam.remove_element(tags::RANGE_SHIFTER_SEQUENCE);
            put_is(beam, tags::NUMBER_OF_RANGE_SHIFTERS, 0);
        }
    }

    let existing = get_items(beam, tags::ION_CONTROL_POINT_SEQUENCE).to_vec();
    let items = field
        .control_points
        .iter()
        .enumerate()
        .map(|(k, cp)| {
            let mut item = existing
                .get(k)
                .cloned()
                .unwrap_or_else(InMemDicomObject::new_empty);
            write_control_point(&mut item, k, cp);
            item
        })
        .collect();
    put_sequence(beam, tags::ION_CONTROL_POINT_SEQUENCE, items);
}

fn write_control_point(item: &mut InMemDicomObject, index: usize, cp: &ControlPoint) {
    put_is(item, tags::CONTROL_POINT_INDEX, index as i64);
    put_ds(item, tags::CUMULATIVE_METERSET_WEIGHT, cp.cumulative_weight);
    put_opt_ds(item, tags::NOMINAL_BEAM_ENERGY, cp.nominal_energy);
    put_opt_ds(item, tags::GANTRY_ANGLE, cp.gantry_angle);
    put_opt_fl(item, tags::SNOUT_POSITION, cp.snout_position);
    put_opt_ds(item, tags::TABLE_TOP_VERTICAL_POSITION, cp.table_vertical);
    put_opt_ds(item, tags::TABLE_TOP_LONGITUDINAL_POSITION, cp.table_longitudinal);
    put_opt_ds(item, tags::TABLE_TOP_LATERAL_POSITION, cp.table_lateral);
    put_opt_fl(item, tags::TABLE_TOP_PITCH_ANGLE, cp.table_pitch);
    put_opt_fl(item, tags::TABLE_TOP_ROLL_ANGLE, cp.table_roll);
    put_opt_ds(item, tags::PATIENT_SUPPORT_ANGLE, cp.patient_support_angle);
    put_opt_fl(item, tags::METERSET_RATE, cp.meterset_rate);

    if !cp.spots.is_empty() {
        let positions: Vec<f64> = cp.spots.iter().flat_map(|s| [s.x, s.y]).collect();
        let weights: Vec<f64> = cp.spots.iter().map(|s| s.weight).collect();
        put_is(item, tags::NUMBER_OF_SCAN_SPOT_POSITIONS, cp.spots.len() as i64);
        put_fl(item, tags::SCAN_SPOT_POSITION_MAP, &positions);
        put_fl(item, tags::SCAN_SPOT_METERSET_WEIGHTS, &weights);
    }

    match &cp.range_shifter_setting {
        Some(setting) => {
            let mut rs = get_items(item, tags::RANGE_SHIFTER_SETTINGS_SEQUENCE)
                .first()
                .cloned()
                .unwrap_or_else(InMemDicomObject::new_empty);
            put_str(&mut rs, tags::RANGE_SHIFTER_SETTING, VR::LO, &setting.setting);
            put_opt_fl(&mut rs, tags::ISOCENTER_TO_RANGE_SHIFTER_DISTANCE, setting.isocenter_distance);
            put_opt_fl(
                &mut rs,
                tags::RANGE_SHIFTER_WATER_EQUIVALENT_THICKNESS,
                setting.water_equivalent_thickness,
            );
            put_is(&mut rs, tags::REFERENCED_RANGE_SHIFTER_NUMBER, setting.referenced_number.into());
            put_sequence(item, tags::RANGE_SHIFTER_SETTINGS_SEQUENCE, vec![rs]);
        }
        None => {
            item.remove_element(tags::RANGE_SHIFTER_SETTINGS_SEQUENCE);
        }
    }

    if let Some(link) = cp.dose_reference {
        let mut r = get_items(item, tags::REFERENCED_DOSE_REFERENCE_SEQUENCE)
            .first()
            .cloned()
            .unwrap_or_else(InMemDicomObject::new_empty);
        put_is(&mut r, tags::REFERENCED_DOSE_REFERENCE_NUMBER, link.number.into());
        put_opt_ds(&mut r, tags::CUMULATIVE_DOSE_REFERENCE_COEFFICIENT, link.coefficient);
        put_sequence(item, tags::REFERENCED_DOSE_REFERENCE_SEQUENCE, vec![r]);
    }
}

fn write_fraction_group(obj: &mut InMemDicomObject, plan: &Plan, original_numbers: &[Option<i32>]) {
    let groups = get_items(obj, tags::FRACTION_GROUP_SEQUENCE).to_vec();
    let has_values = plan
        .fields
        .iter()
        .any(|f| f.beam_dose.is_some() || f.beam_meterset.is_some());
    if groups.is_empty() && !has_values {
        return;
    }
    let mut groups = if groups.is_empty() {
        vec![InMemDicomObject::new_empty()]
    } else {
        groups
    };

    let group = &mut groups[0];
    let referenced = get_items(group, tags::REFERENCED_BEAM_SEQUENCE).to_vec();
    let items = plan
        .fields
        .iter()
        .map(|field| {
            let source = field
                .origin
                .and_then(|o| original_numbers.get(o).copied().flatten())
                .and_then(|number| {
                    referenced
                        .iter()
                        .find(|rb| get_i32(rb, tags::REFERENCED_BEAM_NUMBER) == Some(number))
                });
            let mut item = source.cloned().unwrap_or_else(InMemDicomObject::new_empty);
            put_is(&mut item, tags::REFERENCED_BEAM_NUMBER, field.number.into());
            put_opt_ds(&mut item, tags::BEAM_DOSE, field.beam_dose);
            put_opt_ds(&mut item, tags::BEAM_METERSET, field.beam_meterset);
            item
        })
        .collect();
    put_sequence(group, tags::REFERENCED_BEAM_SEQUENCE, items);
    put_is(group, tags::NUMBER_OF_BEAMS, plan.field_count() as i64);
    put_sequence(obj, tags::FRACTION_GROUP_SEQUENCE, groups);
}
