//! Full attribute dump of a DICOM object.

use std::fmt::Write;

use dicom::dictionary_std::StandardDataDictionary;
use dicom::core::dictionary::DataDictionary;
use dicom::object::InMemDicomObject;

/// Longest value text shown before truncation.
const MAX_VALUE_LEN: usize = 80;

/// Render every element of `obj`, descending into sequences.
pub fn dump(obj: &InMemDicomObject) -> String {
    let mut out = String::new();
    dump_into(&mut out, obj, 0);
    out
}

fn dump_into(out: &mut String, obj: &InMemDicomObject, depth: usize) {
    let indent = "  ".repeat(depth);
    for elem in obj.iter() {
        let header = elem.header();
        let name = StandardDataDictionary
            .by_tag(header.tag)
            .map(|entry| entry.alias)
            .unwrap_or("Unknown");

        match elem.items() {
            Some(items) => {
                let _ = writeln!(
                    out,
                    "{}{} {:<40} {}: <{} item(s)>",
                    indent,
                    header.tag,
                    name,
                    header.vr,
                    items.len()
                );
                for (i, item) in items.iter().enumerate() {
                    let _ = writeln!(out, "{}  Item #{}", indent, i);
                    dump_into(out, item, depth + 2);
                }
            }
            None => {
                let value = match elem.to_str() {
                    Ok(text) => truncate(&text),
                    Err(_) => "<binary>".to_string(),
                };
                let _ = writeln!(
                    out,
                    "{}{} {:<40} {}: {}",
                    indent, header.tag, name, header.vr, value
                );
            }
        }
    }
}

fn truncate(text: &str) -> String {
    if text.chars().count() <= MAX_VALUE_LEN {
        text.to_string()
    } else {
        let head: String = text.chars().take(MAX_VALUE_LEN).collect();
        format!("{}...", head)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::{put_is, put_sequence, put_str};
    use dicom::core::VR;
    use dicom::dictionary_std::tags;

    #[test]
    fn test_dump_nested() {
        let mut beam = InMemDicomObject::new_empty();
        put_is(&mut beam, tags::BEAM_NUMBER, 1);
        let mut obj = InMemDicomObject::new_empty();
        put_str(&mut obj, tags::PATIENT_NAME, VR::PN, "Doe^Jane");
        put_sequence(&mut obj, tags::ION_BEAM_SEQUENCE, vec![beam]);

        let text = dump(&obj);
        assert!(text.contains("PatientName"));
        assert!(text.contains("Doe^Jane"));
        assert!(text.contains("IonBeamSequence"));
        assert!(text.contains("<1 item(s)>"));
        assert!(text.contains("    (300A,00C0) BeamNumber"));
    }

    #[test]
    fn test_truncate() {
        let long = "x".repeat(100);
        assert_eq!(truncate(&long).len(), MAX_VALUE_LEN + 3);
        assert_eq!(truncate("short"), "short");
    }
}
