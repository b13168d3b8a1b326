use crate::group::{
    cmp_floats, compare_with, first_item, get_multi_float, put_decimals, put_sequence,
    FunctionalGroup,
};
use crate::types::FunctionalGroupType;
use crate::Result;
use dicom_dictionary_std::tags;
use dicom_object::InMemDicomObject;
use std::any::Any;
use std::cmp::Ordering;

const GROUP: FunctionalGroupType = FunctionalGroupType::PlanePosition;

/// The _Plane Position (Patient)_ functional group.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlanePositionGroup {
    image_position: Vec<f64>,
}

impl PlanePositionGroup {
    pub fn new() -> Self {
        Self::default()
    }

    /// The x, y and z coordinates of the upper left hand corner
    /// of the frame, in mm.
    pub fn image_position(&self) -> Option<[f64; 3]> {
        match self.image_position.as_slice() {
            [x, y, z] => Some([*x, *y, *z]),
            _ => None,
        }
    }

    pub fn set_image_position(&mut self, x: f64, y: f64, z: f64) {
        self.image_position = vec![x, y, z];
    }
}

impl FunctionalGroup for PlanePositionGroup {
    fn group_type(&self) -> FunctionalGroupType {
        GROUP
    }

    fn read(&mut self, item: &InMemDicomObject) -> Result<()> {
        *self = Self::default();
        let seq_item = first_item(item, GROUP)?;
        self.image_position = get_multi_float(
            seq_item,
            tags::IMAGE_POSITION_PATIENT,
            GROUP,
            "ImagePositionPatient",
        )?;
        Ok(())
    }

    fn write(&self, item: &mut InMemDicomObject) -> Result<()> {
        let mut seq_item = InMemDicomObject::new_empty();
        if !self.image_position.is_empty() {
            put_decimals(
                &mut seq_item,
                tags::IMAGE_POSITION_PATIENT,
                &self.image_position,
            );
        }
        put_sequence(item, GROUP.sequence_tag(), vec![seq_item]);
        Ok(())
    }

    fn compare(&self, other: &dyn FunctionalGroup) -> Ordering {
        compare_with(self, other, |a, b| {
            cmp_floats(&a.image_position, &b.image_position)
        })
    }

    fn clone_group(&self) -> Box<dyn FunctionalGroup> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
