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

const GROUP: FunctionalGroupType = FunctionalGroupType::PlaneOrientation;

/// The _Plane Orientation (Patient)_ functional group.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlaneOrientationGroup {
    image_orientation: Vec<f64>,
}

impl PlaneOrientationGroup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Direction cosines of the first row followed by the first column.
    pub fn image_orientation(&self) -> Option<[f64; 6]> {
        <[f64; 6]>::try_from(self.image_orientation.as_slice()).ok()
    }

    pub fn set_image_orientation(&mut self, row: [f64; 3], column: [f64; 3]) {
        self.image_orientation = row.iter().chain(&column).copied().collect();
    }
}

impl FunctionalGroup for PlaneOrientationGroup {
    fn group_type(&self) -> FunctionalGroupType {
        GROUP
    }

    fn read(&mut self, item: &InMemDicomObject) -> Result<()> {
        *self = Self::default();
        let seq_item = first_item(item, GROUP)?;
        self.image_orientation = get_multi_float(
            seq_item,
            tags::IMAGE_ORIENTATION_PATIENT,
            GROUP,
            "ImageOrientationPatient",
        )?;
        Ok(())
    }

    fn write(&self, item: &mut InMemDicomObject) -> Result<()> {
        let mut seq_item = InMemDicomObject::new_empty();
        if !self.image_orientation.is_empty() {
            put_decimals(
                &mut seq_item,
                tags::IMAGE_ORIENTATION_PATIENT,
                &self.image_orientation,
            );
        }
        put_sequence(item, GROUP.sequence_tag(), vec![seq_item]);
        Ok(())
    }

    fn compare(&self, other: &dyn FunctionalGroup) -> Ordering {
        compare_with(self, other, |a, b| {
            cmp_floats(&a.image_orientation, &b.image_orientation)
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
        let mut group = PlaneOrientationGroup::new();
        group.set_image_orientation([1., 0., 0.], [0., 1., 0.]);

        let mut item = InMemDicomObject::new_empty();
        group.write(&mut item).unwrap();

        let mut read = PlaneOrientationGroup::new();
        read.read(&item).unwrap();
        assert_eq!(read.image_orientation(), Some([1., 0., 0., 0., 1., 0.]));
        assert_eq!(read.compare(&group), Ordering::Equal);

        let mut other = PlaneOrientationGroup::new();
        other.set_image_orientation([0., 1., 0.], [0., 0., -1.]);
        assert_ne!(read.compare(&other), Ordering::Equal);
    }
}
