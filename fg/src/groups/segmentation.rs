use crate::group::{compare_with, first_item, get_int, put_sequence, FunctionalGroup};
use crate::types::FunctionalGroupType;
use crate::Result;
use dicom_core::{DataElement, PrimitiveValue, VR};
use dicom_dictionary_std::tags;
use dicom_object::InMemDicomObject;
use std::any::Any;
use std::cmp::Ordering;

const GROUP: FunctionalGroupType = FunctionalGroupType::Segmentation;

/// The _Segmentation_ functional group,
/// identifying the segment which a frame belongs to.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SegmentationGroup {
    referenced_segment_number: Option<u16>,
}

impl SegmentationGroup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn referenced_segment_number(&self) -> Option<u16> {
        self.referenced_segment_number
    }

    pub fn set_referenced_segment_number(&mut self, value: u16) {
        self.referenced_segment_number = Some(value);
    }
}

impl FunctionalGroup for SegmentationGroup {
    fn group_type(&self) -> FunctionalGroupType {
        GROUP
    }

    fn read(&mut self, item: &InMemDicomObject) -> Result<()> {
        *self = Self::default();
        let seq_item = first_item(item, GROUP)?;
        self.referenced_segment_number = get_int(
            seq_item,
            tags::REFERENCED_SEGMENT_NUMBER,
            GROUP,
            "ReferencedSegmentNumber",
        )?;
        Ok(())
    }

    fn write(&self, item: &mut InMemDicomObject) -> Result<()> {
        let mut seq_item = InMemDicomObject::new_empty();
        if let Some(v) = self.referenced_segment_number {
            seq_item.put(DataElement::new(
                tags::REFERENCED_SEGMENT_NUMBER,
                VR::US,
                PrimitiveValue::from(v),
            ));
        }
        put_sequence(item, GROUP.sequence_tag(), vec![seq_item]);
        Ok(())
    }

    fn compare(&self, other: &dyn FunctionalGroup) -> Ordering {
        compare_with(self, other, |a, b| {
            a.referenced_segment_number.cmp(&b.referenced_segment_number)
        })
    }

    fn clone_group(&self) -> Box<dyn FunctionalGroup> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
