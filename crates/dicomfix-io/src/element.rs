//! Typed access to data elements of in-memory DICOM objects.
//!
//! Decimal strings are written with at most 16 characters so that the
//! output stays valid for the DS value representation.

use dicom::core::value::DataSetSequence;
use dicom::core::{DataElement, Length, PrimitiveValue, Tag, VR};
use dicom::object::InMemDicomObject;

/// Maximum length of a DS value.
const DS_MAX_LEN: usize = 16;

// --- Readers ---

pub(crate) fn get_string(obj: &InMemDicomObject, tag: Tag) -> Option<String> {
    let value = obj.element(tag).ok()?.to_str().ok()?;
    Some(value.trim_matches(|c: char| c == ' ' || c == '\0').to_string())
}

pub(crate) fn get_f64(obj: &InMemDicomObject, tag: Tag) -> Option<f64> {
    obj.element(tag).ok()?.to_float64().ok()
}

pub(crate) fn get_f64_vec(obj: &InMemDicomObject, tag: Tag) -> Option<Vec<f64>> {
    obj.element(tag).ok()?.to_multi_float64().ok()
}

pub(crate) fn get_i32(obj: &InMemDicomObject, tag: Tag) -> Option<i32> {
    obj.element(tag).ok()?.to_int::<i32>().ok()
}

/// Items of a sequence element, empty when the sequence is absent.
pub(crate) fn get_items(obj: &InMemDicomObject, tag: Tag) -> &[InMemDicomObject] {
    obj.element(tag)
        .ok()
        .and_then(|e| e.items())
        .unwrap_or(&[])
}

// --- Writers ---

pub(crate) fn put_str(obj: &mut InMemDicomObject, tag: Tag, vr: VR, value: &str) {
    obj.put(DataElement::new(tag, vr, PrimitiveValue::from(value)));
}

pub(crate) fn put_opt_str(obj: &mut InMemDicomObject, tag: Tag, vr: VR, value: Option<&str>) {
    if let Some(value) = value {
        put_str(obj, tag, vr, value);
    }
}

pub(crate) fn put_is(obj: &mut InMemDicomObject, tag: Tag, value: i64) {
    put_str(obj, tag, VR::IS, &value.to_string());
}

pub(crate) fn put_ds(obj: &mut InMemDicomObject, tag: Tag, value: f64) {
    put_str(obj, tag, VR::DS, &format_ds(value));
}

pub(crate) fn put_opt_ds(obj: &mut InMemDicomObject, tag: Tag, value: Option<f64>) {
    if let Some(value) = value {
        put_ds(obj, tag, value);
    }
}

pub(crate) fn put_fl(obj: &mut InMemDicomObject, tag: Tag, values: &[f64]) {
    let values = values.iter().map(|&v| v as f32).collect();
    obj.put(DataElement::new(tag, VR::FL, PrimitiveValue::F32(values)));
}

pub(crate) fn put_opt_fl(obj: &mut InMemDicomObject, tag: Tag, value: Option<f64>) {
    if let Some(value) = value {
        put_fl(obj, tag, &[value]);
    }
}

pub(crate) fn put_sequence(obj: &mut InMemDicomObject, tag: Tag, items: Vec<InMemDicomObject>) {
    obj.put(DataElement::new(
        tag,
        VR::SQ,
        DataSetSequence::new(items, Length::UNDEFINED),
    ));
}

/// Format a value as a decimal string of at most 16 characters.
pub(crate) fn format_ds(value: f64) -> String {
    if value == 0.0 {
        return "0".to_string();
    }
    let plain = value.to_string();
    if plain.len() <= DS_MAX_LEN {
        return plain;
    }
    for precision in (0..DS_MAX_LEN).rev() {
        let fixed = format!("{:.*}", precision, value);
        let fixed = if fixed.contains('.') {
            fixed.trim_end_matches('0').trim_end_matches('.').to_string()
        } else {
            fixed
        };
        if fixed.len() <= DS_MAX_LEN {
            return fixed;
        }
    }
    let mut precision = 9;
    loop {
        let sci = format!("{:.*e}", precision, value);
        if sci.len() <= DS_MAX_LEN || precision == 0 {
            return sci;
        }
        precision -= 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dicom::dictionary_std::tags;

    #[test]
    fn test_format_ds_short_values() {
        assert_eq!(format_ds(0.0), "0");
        assert_eq!(format_ds(-0.0), "0");
        assert_eq!(format_ds(421.0), "421");
        assert_eq!(format_ds(-12.5), "-12.5");
    }

    #[test]
    fn test_format_ds_limits_length() {
        for v in [1.0 / 3.0, 2.0 / 7.0 * 1000.0, -123456.789012345, 1e-12, 6.02e23] {
            let s = format_ds(v);
            assert!(s.len() <= DS_MAX_LEN, "{} -> {}", v, s);
            let parsed: f64 = s.parse().unwrap();
            assert!((parsed - v).abs() <= 1e-9 * v.abs().max(1.0), "{} -> {}", v, s);
        }
    }

    #[test]
    fn test_put_and_get() {
        let mut obj = InMemDicomObject::new_empty();
        put_str(&mut obj, tags::PATIENT_NAME, VR::PN, "Doe^Jane");
        put_ds(&mut obj, tags::SLICE_THICKNESS, 2.5);
        put_is(&mut obj, tags::ROWS, 12);
        put_fl(&mut obj, tags::PIXEL_SPACING, &[1.5, -2.0]);

        assert_eq!(get_string(&obj, tags::PATIENT_NAME).as_deref(), Some("Doe^Jane"));
        assert_eq!(get_f64(&obj, tags::SLICE_THICKNESS), Some(2.5));
        assert_eq!(get_i32(&obj, tags::ROWS), Some(12));
        assert_eq!(get_f64_vec(&obj, tags::PIXEL_SPACING), Some(vec![1.5, -2.0]));
        assert!(get_f64(&obj, tags::PATIENT_ID).is_none());
    }

    #[test]
    fn test_sequences() {
        let mut item = InMemDicomObject::new_empty();
        put_is(&mut item, tags::ROWS, 3);
        let mut obj = InMemDicomObject::new_empty();
        assert!(get_items(&obj, tags::REFERENCED_IMAGE_SEQUENCE).is_empty());
        put_sequence(&mut obj, tags::REFERENCED_IMAGE_SEQUENCE, vec![item.clone(), item]);
        let items = get_items(&obj, tags::REFERENCED_IMAGE_SEQUENCE);
        assert_eq!(items.len(), 2);
        assert_eq!(get_i32(&items[1], tags::ROWS), Some(3));
    }
}
