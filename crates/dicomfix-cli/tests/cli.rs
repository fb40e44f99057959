use dicom::core::value::DataSetSequence;
use dicom::core::{DataElement, Length, PrimitiveValue, Tag, VR};
use dicom::dictionary_std::{tags, uids};
use dicom::object::{open_file, FileMetaTableBuilder, InMemDicomObject};
use std::fs;
use std::path::Path;
use std::process::Command;

fn text(obj: &mut InMemDicomObject, tag: Tag, vr: VR, value: &str) {
    obj.put(DataElement::new(tag, vr, PrimitiveValue::from(value)));
}

fn floats(obj: &mut InMemDicomObject, tag: Tag, values: &[f32]) {
    obj.put(DataElement::new(
        tag,
        VR::FL,
        PrimitiveValue::F32(values.iter().copied().collect()),
    ));
}

fn control_point(weight: &str, spots: &[f32]) -> InMemDicomObject {
    let mut cp = InMemDicomObject::new_empty();
    text(&mut cp, tags::NOMINAL_BEAM_ENERGY, VR::DS, "100");
    text(&mut cp, tags::CUMULATIVE_METERSET_WEIGHT, VR::DS, weight);
    let positions: Vec<f32> = (0..spots.len()).flat_map(|i| [i as f32, 0.0]).collect();
    floats(&mut cp, tags::SCAN_SPOT_POSITION_MAP, &positions);
    floats(&mut cp, tags::SCAN_SPOT_METERSET_WEIGHTS, spots);
    cp
}

fn write_plan(path: &Path) {
    let mut first = control_point("0", &[2.0, 4.0]);
    text(&mut first, tags::GANTRY_ANGLE, VR::DS, "0");
    let last = control_point("6", &[0.0, 0.0]);

    let mut beam = InMemDicomObject::new_empty();
    text(&mut beam, tags::BEAM_NUMBER, VR::IS, "1");
    text(&mut beam, tags::FINAL_CUMULATIVE_METERSET_WEIGHT, VR::DS, "6");
    beam.put(DataElement::new(
        tags::ION_CONTROL_POINT_SEQUENCE,
        VR::SQ,
        DataSetSequence::new(vec![first, last], Length::UNDEFINED),
    ));

    let mut obj = InMemDicomObject::new_empty();
    text(&mut obj, tags::SOP_CLASS_UID, VR::UI, uids::RT_ION_PLAN_STORAGE);
    text(&mut obj, tags::PATIENT_NAME, VR::PN, "Phantom");
    text(&mut obj, tags::RT_PLAN_LABEL, VR::SH, "CLI");
    text(&mut obj, tags::APPROVAL_STATUS, VR::CS, "UNAPPROVED");
    obj.put(DataElement::new(
        tags::ION_BEAM_SEQUENCE,
        VR::SQ,
        DataSetSequence::new(vec![beam], Length::UNDEFINED),
    ));
    obj.with_meta(
        FileMetaTableBuilder::new()
            .transfer_syntax("1.2.840.10008.1.2.1")
            .media_storage_sop_class_uid(uids::RT_ION_PLAN_STORAGE)
            .media_storage_sop_instance_uid("2.25.42"),
    )
    .unwrap()
    .write_to_file(path)
    .unwrap();
}

fn dicomfix() -> Command {
    Command::new(env!("CARGO_BIN_EXE_dicomfix"))
}

#[test]
fn test_approve_and_export() {
    let temp = tempfile::tempdir().unwrap();
    let input = temp.path().join("in.dcm");
    let output = temp.path().join("out.dcm");
    write_plan(&input);

    let status = dicomfix()
        .arg(&input)
        .arg("-o")
        .arg(&output)
        .args(["-a", "-g", "90", "--rescale-factor", "2"])
        .arg("--export-spotlist")
        .arg(temp.path().join("spots"))
        .status()
        .unwrap();
    assert!(status.success());

    let obj = open_file(&output).unwrap();
    let approval = obj.element(tags::APPROVAL_STATUS).unwrap().to_str().unwrap();
    assert_eq!(approval.trim(), "APPROVED");
    let beam = &obj.element(tags::ION_BEAM_SEQUENCE).unwrap().items().unwrap()[0];
    let weight = beam
        .element(tags::FINAL_CUMULATIVE_METERSET_WEIGHT)
        .unwrap()
        .to_float64()
        .unwrap();
    assert_eq!(weight, 12.0);

    let spots = fs::read_to_string(temp.path().join("spots.csv")).unwrap();
    assert_eq!(spots.lines().count(), 2);
}

#[test]
fn test_strict_refuses_partial_edits() {
    let temp = tempfile::tempdir().unwrap();
    let input = temp.path().join("in.dcm");
    let output = temp.path().join("out.dcm");
    write_plan(&input);

    let status = dicomfix()
        .arg(&input)
        .arg("-o")
        .arg(&output)
        .args(["-g", "90,180", "--strict"])
        .status()
        .unwrap();
    assert!(!status.success());
    assert!(!output.exists());

    let status = dicomfix()
        .arg(&input)
        .arg("-o")
        .arg(&output)
        .args(["-g", "90,180"])
        .status()
        .unwrap();
    assert!(status.success());
    assert!(output.exists());
}

#[test]
fn test_malformed_number_fails_only_its_edit() {
    let temp = tempfile::tempdir().unwrap();
    let input = temp.path().join("in.dcm");
    let output = temp.path().join("out.dcm");
    write_plan(&input);

    let out = dicomfix()
        .arg(&input)
        .arg("-o")
        .arg(&output)
        .args(["-a", "-g", "90,abc"])
        .output()
        .unwrap();
    assert!(out.status.success());
    assert!(output.exists());
    let obj = open_file(&output).unwrap();
    let approval = obj.element(tags::APPROVAL_STATUS).unwrap().to_str().unwrap();
    assert_eq!(approval.trim(), "APPROVED");
    let beam = &obj.element(tags::ION_BEAM_SEQUENCE).unwrap().items().unwrap()[0];
    let cp = &beam.element(tags::ION_CONTROL_POINT_SEQUENCE).unwrap().items().unwrap()[0];
    assert_eq!(cp.element(tags::GANTRY_ANGLE).unwrap().to_float64().unwrap(), 0.0);

    let status = dicomfix()
        .arg(&input)
        .arg("-o")
        .arg(temp.path().join("strict.dcm"))
        .args(["-a", "-g", "90,abc", "--strict"])
        .status()
        .unwrap();
    assert!(!status.success());
    assert!(!temp.path().join("strict.dcm").exists());
}

#[test]
fn test_inspect_prints_summary() {
    let temp = tempfile::tempdir().unwrap();
    let input = temp.path().join("in.dcm");
    let output = temp.path().join("out.dcm");
    write_plan(&input);

    let out = dicomfix()
        .arg(&input)
        .arg("-o")
        .arg(&output)
        .arg("--inspect")
        .output()
        .unwrap();
    assert!(out.status.success());
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("Patient name             : 'Phantom'"));
    assert!(stdout.contains("Number of fields         : 1"));
    assert!(!output.exists());
}

#[test]
fn test_edit_config_file() {
    let temp = tempfile::tempdir().unwrap();
    let input = temp.path().join("in.dcm");
    let output = temp.path().join("out.dcm");
    let config = temp.path().join("edits.toml");
    write_plan(&input);
    fs::write(&config, "plan_label = \"FROM TOML\"\nintent_curative = true\n").unwrap();

    let status = dicomfix()
        .arg(&input)
        .arg("-o")
        .arg(&output)
        .arg("-c")
        .arg(&config)
        .status()
        .unwrap();
    assert!(status.success());
    let obj = open_file(&output).unwrap();
    let label = obj.element(tags::RT_PLAN_LABEL).unwrap().to_str().unwrap();
    assert_eq!(label.trim(), "FROM TOML");
}
