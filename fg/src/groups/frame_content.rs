use crate::group::{
    cmp_opt_float, compare_with, first_item, get_int, get_multi_float, get_multi_int, get_string,
    put_sequence, FunctionalGroup,
};
use crate::types::FunctionalGroupType;
use crate::Result;
use dicom_core::{DataElement, PrimitiveValue, VR};
use dicom_dictionary_std::tags;
use dicom_object::InMemDicomObject;
use std::any::Any;
use std::cmp::Ordering;

const GROUP: FunctionalGroupType = FunctionalGroupType::FrameContent;

/// The _Frame Content_ functional group.
///
/// This group is only permitted per-frame,
/// and every frame of an enhanced multi-frame object is expected to have one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameContentGroup {
    frame_acquisition_number: Option<u16>,
    frame_reference_datetime: Option<String>,
    frame_acquisition_datetime: Option<String>,
    frame_acquisition_duration: Option<f64>,
    stack_id: Option<String>,
    in_stack_position_number: Option<u32>,
    temporal_position_index: Option<u32>,
    dimension_index_values: Vec<u32>,
}

impl FrameContentGroup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frame_acquisition_number(&self) -> Option<u16> {
        self.frame_acquisition_number
    }

    pub fn set_frame_acquisition_number(&mut self, value: u16) {
        self.frame_acquisition_number = Some(value);
    }

    pub fn frame_reference_datetime(&self) -> Option<&str> {
        self.frame_reference_datetime.as_deref()
    }

    pub fn set_frame_reference_datetime(&mut self, value: impl Into<String>) {
        self.frame_reference_datetime = Some(value.into());
    }

    pub fn frame_acquisition_datetime(&self) -> Option<&str> {
        self.frame_acquisition_datetime.as_deref()
    }

    pub fn set_frame_acquisition_datetime(&mut self, value: impl Into<String>) {
        self.frame_acquisition_datetime = Some(value.into());
    }

    /// Frame acquisition duration in milliseconds
    pub fn frame_acquisition_duration(&self) -> Option<f64> {
        self.frame_acquisition_duration
    }

    pub fn set_frame_acquisition_duration(&mut self, value: f64) {
        self.frame_acquisition_duration = Some(value);
    }

    pub fn stack_id(&self) -> Option<&str> {
        self.stack_id.as_deref()
    }

    pub fn set_stack_id(&mut self, value: impl Into<String>) {
        self.stack_id = Some(value.into());
    }

    pub fn in_stack_position_number(&self) -> Option<u32> {
        self.in_stack_position_number
    }

    pub fn set_in_stack_position_number(&mut self, value: u32) {
        self.in_stack_position_number = Some(value);
    }

    pub fn temporal_position_index(&self) -> Option<u32> {
        self.temporal_position_index
    }

    pub fn set_temporal_position_index(&mut self, value: u32) {
        self.temporal_position_index = Some(value);
    }

    /// The index of this frame along each dimension
    /// of the multi-frame dimension module (1-based).
    pub fn dimension_index_values(&self) -> &[u32] {
        &self.dimension_index_values
    }

    pub fn set_dimension_index_values(&mut self, values: Vec<u32>) {
        self.dimension_index_values = values;
    }
}

impl FunctionalGroup for FrameContentGroup {
    fn group_type(&self) -> FunctionalGroupType {
        GROUP
    }

    fn read(&mut self, item: &InMemDicomObject) -> Result<()> {
        *self = Self::default();
        let seq_item = first_item(item, GROUP)?;

        self.frame_acquisition_number = get_int(
            seq_item,
            tags::FRAME_ACQUISITION_NUMBER,
            GROUP,
            "FrameAcquisitionNumber",
        )?;
        self.frame_reference_datetime = get_string(seq_item, tags::FRAME_REFERENCE_DATE_TIME);
        self.frame_acquisition_datetime = get_string(seq_item, tags::FRAME_ACQUISITION_DATE_TIME);
        self.frame_acquisition_duration = get_multi_float(
            seq_item,
            tags::FRAME_ACQUISITION_DURATION,
            GROUP,
            "FrameAcquisitionDuration",
        )?
        .first()
        .copied();
        self.stack_id = get_string(seq_item, tags::STACK_ID);
        self.in_stack_position_number = get_int(
            seq_item,
            tags::IN_STACK_POSITION_NUMBER,
            GROUP,
            "InStackPositionNumber",
        )?;
        self.temporal_position_index = get_int(
            seq_item,
            tags::TEMPORAL_POSITION_INDEX,
            GROUP,
            "TemporalPositionIndex",
        )?;
        self.dimension_index_values = get_multi_int(
            seq_item,
            tags::DIMENSION_INDEX_VALUES,
            GROUP,
            "DimensionIndexValues",
        )?;
        Ok(())
    }

    fn write(&self, item: &mut InMemDicomObject) -> Result<()> {
        let mut seq_item = InMemDicomObject::new_empty();
        if let Some(v) = self.frame_acquisition_number {
            seq_item.put(DataElement::new(
                tags::FRAME_ACQUISITION_NUMBER,
                VR::US,
                PrimitiveValue::from(v),
            ));
        }
        if let Some(v) = &self.frame_reference_datetime {
            seq_item.put(DataElement::new(
                tags::FRAME_REFERENCE_DATE_TIME,
                VR::DT,
                v.as_str(),
            ));
        }
        if let Some(v) = &self.frame_acquisition_datetime {
            seq_item.put(DataElement::new(
                tags::FRAME_ACQUISITION_DATE_TIME,
                VR::DT,
                v.as_str(),
            ));
        }
        if let Some(v) = self.frame_acquisition_duration {
            seq_item.put(DataElement::new(
                tags::FRAME_ACQUISITION_DURATION,
                VR::FD,
                PrimitiveValue::from(v),
            ));
        }
        if let Some(v) = &self.stack_id {
            seq_item.put(DataElement::new(tags::STACK_ID, VR::SH, v.as_str()));
        }
        if let Some(v) = self.in_stack_position_number {
            seq_item.put(DataElement::new(
                tags::IN_STACK_POSITION_NUMBER,
                VR::UL,
                PrimitiveValue::from(v),
            ));
        }
        if let Some(v) = self.temporal_position_index {
            seq_item.put(DataElement::new(
                tags::TEMPORAL_POSITION_INDEX,
                VR::UL,
                PrimitiveValue::from(v),
            ));
        }
        if !self.dimension_index_values.is_empty() {
            seq_item.put(DataElement::new(
                tags::DIMENSION_INDEX_VALUES,
                VR::UL,
                PrimitiveValue::U32(self.dimension_index_values.iter().copied().collect()),
            ));
        }
        put_sequence(item, GROUP.sequence_tag(), vec![seq_item]);
        Ok(())
    }

    fn compare(&self, other: &dyn FunctionalGroup) -> Ordering {
        compare_with(self, other, |a, b| {
            a.frame_acquisition_number
                .cmp(&b.frame_acquisition_number)
                .then_with(|| a.frame_reference_datetime.cmp(&b.frame_reference_datetime))
                .then_with(|| {
                    a.frame_acquisition_datetime
                        .cmp(&b.frame_acquisition_datetime)
                })
                .then_with(|| {
                    cmp_opt_float(a.frame_acquisition_duration, b.frame_acquisition_duration)
                })
                .then_with(|| a.stack_id.cmp(&b.stack_id))
                .then_with(|| a.in_stack_position_number.cmp(&b.in_stack_position_number))
                .then_with(|| a.temporal_position_index.cmp(&b.temporal_position_index))
                .then_with(|| a.dimension_index_values.cmp(&b.dimension_index_values))
        })
    }

    fn clone_group(&self) -> Box<dyn FunctionalGroup> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_read() {
        let mut group = FrameContentGroup::new();
        group.set_frame_acquisition_number(3);
        group.set_stack_id("1");
        group.set_in_stack_position_number(7);
        group.set_frame_acquisition_duration(12.5);
        group.set_dimension_index_values(vec![1, 7]);

        let mut item = InMemDicomObject::new_empty();
        group.write(&mut item).unwrap();
        assert!(item.get(GROUP.sequence_tag()).is_some());

        let mut read = FrameContentGroup::new();
        read.set_temporal_position_index(99);
        read.read(&item).unwrap();
        assert_eq!(read.temporal_position_index(), None);
        assert_eq!(read.stack_id(), Some("1"));
        assert_eq!(read.in_stack_position_number(), Some(7));
        assert_eq!(read.dimension_index_values(), &[1, 7]);
        assert_eq!(read.compare(&group), Ordering::Equal);
    }

    #[test]
    fn different_values_are_not_equal() {
        let mut a = FrameContentGroup::new();
        a.set_dimension_index_values(vec![1, 1]);
        let mut b = FrameContentGroup::new();
        b.set_dimension_index_values(vec![1, 2]);
        assert_eq!(a.compare(&b), Ordering::Less);
        assert_eq!(b.compare(&a), Ordering::Greater);
    }
}
