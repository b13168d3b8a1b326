//! Attribute access helpers.

use dicom_core::value::PrimitiveValue;
use dicom_core::{DataElement, Tag, VR};
use dicom_dictionary_std::tags;
use dicom_object::InMemDicomObject;

/// Tags of the attributes describing the membership of an instance
/// in a concatenation.
pub(crate) const CONCATENATION_ATTRIBUTES: [Tag; 9] = [
    tags::CONCATENATION_UID,
    tags::IN_CONCATENATION_NUMBER,
    tags::IN_CONCATENATION_TOTAL_NUMBER,
    tags::SOP_INSTANCE_UID_OF_CONCATENATION_SOURCE,
    tags::CONCATENATION_FRAME_OFFSET_NUMBER,
    tags::NUMBER_OF_FRAMES,
    tags::CONTENT_DATE,
    tags::CONTENT_TIME,
    tags::SOP_INSTANCE_UID,
];

/// Get a string value, without padding.
/// Empty values are reported as absent.
pub(crate) fn get_str(obj: &InMemDicomObject, tag: Tag) -> Option<String> {
    obj.get(tag)
        .and_then(|e| e.to_str().ok())
        .map(|s| s.trim_end_matches([' ', '\0']).trim_start().to_string())
        .filter(|s| !s.is_empty())
}

/// Get an unsigned 16-bit value.
/// Absent, empty or unconvertible values are reported as `None`.
pub(crate) fn get_u16(obj: &InMemDicomObject, tag: Tag) -> Option<u16> {
    obj.get(tag)
        .filter(|e| e.value().multiplicity() > 0)
        .and_then(|e| e.to_int::<u16>().ok())
}

/// Get an unsigned 32-bit value, also accepting integer strings.
pub(crate) fn get_u32(obj: &InMemDicomObject, tag: Tag) -> Option<u32> {
    obj.get(tag)
        .filter(|e| e.value().multiplicity() > 0)
        .and_then(|e| e.to_int::<u32>().ok())
}

/// The items of a sequence, if the element is present and is a sequence.
pub(crate) fn items(obj: &InMemDicomObject, tag: Tag) -> Option<&[InMemDicomObject]> {
    obj.get(tag).and_then(|e| e.value().items())
}

pub(crate) fn put_str(obj: &mut InMemDicomObject, tag: Tag, vr: VR, value: impl Into<String>) {
    obj.put(DataElement::new(
        tag,
        vr,
        PrimitiveValue::from(value.into()),
    ));
}

pub(crate) fn put_u16(obj: &mut InMemDicomObject, tag: Tag, value: u16) {
    obj.put(DataElement::new(tag, VR::US, PrimitiveValue::from(value)));
}

pub(crate) fn put_u32(obj: &mut InMemDicomObject, tag: Tag, value: u32) {
    obj.put(DataElement::new(tag, VR::UL, PrimitiveValue::from(value)));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strings_are_trimmed() {
        let obj = InMemDicomObject::from_element_iter([
            DataElement::new(tags::PATIENT_ID, VR::LO, "ABC "),
            DataElement::new(tags::SOP_INSTANCE_UID, VR::UI, "1.2.3\0"),
            DataElement::new(tags::STUDY_INSTANCE_UID, VR::UI, ""),
        ]);
        assert_eq!(get_str(&obj, tags::PATIENT_ID).as_deref(), Some("ABC"));
        assert_eq!(get_str(&obj, tags::SOP_INSTANCE_UID).as_deref(), Some("1.2.3"));
        assert_eq!(get_str(&obj, tags::STUDY_INSTANCE_UID), None);
        assert_eq!(get_str(&obj, tags::SERIES_INSTANCE_UID), None);
    }

    #[test]
    fn integers_from_strings_and_binary() {
        let obj = InMemDicomObject::from_element_iter([
            DataElement::new(tags::NUMBER_OF_FRAMES, VR::IS, "12 "),
            DataElement::new(tags::ROWS, VR::US, PrimitiveValue::from(512_u16)),
        ]);
        assert_eq!(get_u32(&obj, tags::NUMBER_OF_FRAMES), Some(12));
        assert_eq!(get_u16(&obj, tags::ROWS), Some(512));
        assert_eq!(get_u16(&obj, tags::COLUMNS), None);
    }
}
