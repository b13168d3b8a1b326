use crate::group::{
    cmp_floats, cmp_opt_float, compare_with, first_item, get_multi_float, put_decimals,
    put_sequence, FunctionalGroup,
};
use crate::types::FunctionalGroupType;
use crate::Result;
use dicom_dictionary_std::tags;
use dicom_object::InMemDicomObject;
use std::any::Any;
use std::cmp::Ordering;

const GROUP: FunctionalGroupType = FunctionalGroupType::PixelMeasures;

/// The _Pixel Measures_ functional group.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PixelMeasuresGroup {
    pixel_spacing: Vec<f64>,
    slice_thickness: Option<f64>,
    spacing_between_slices: Option<f64>,
}

impl PixelMeasuresGroup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Physical distance between pixel centers in mm,
    /// as row spacing followed by column spacing.
    pub fn pixel_spacing(&self) -> Option<(f64, f64)> {
        match self.pixel_spacing.as_slice() {
            [row, col] => Some((*row, *col)),
            _ => None,
        }
    }

    pub fn set_pixel_spacing(&mut self, row: f64, column: f64) {
        self.pixel_spacing = vec![row, column];
    }

    pub fn slice_thickness(&self) -> Option<f64> {
        self.slice_thickness
    }

    pub fn set_slice_thickness(&mut self, value: f64) {
        self.slice_thickness = Some(value);
    }

    pub fn spacing_between_slices(&self) -> Option<f64> {
        self.spacing_between_slices
    }

    pub fn set_spacing_between_slices(&mut self, value: f64) {
        self.spacing_between_slices = Some(value);
    }
}

impl FunctionalGroup for PixelMeasuresGroup {
    fn group_type(&self) -> FunctionalGroupType {
        GROUP
    }

    fn read(&mut self, item: &InMemDicomObject) -> Result<()> {
        *self = Self::default();
        let seq_item = first_item(item, GROUP)?;
        self.pixel_spacing = get_multi_float(seq_item, tags::PIXEL_SPACING, GROUP, "PixelSpacing")?;
        self.slice_thickness =
            get_multi_float(seq_item, tags::SLICE_THICKNESS, GROUP, "SliceThickness")?
                .first()
                .copied();
        self.spacing_between_slices = get_multi_float(
            seq_item,
            tags::SPACING_BETWEEN_SLICES,
            GROUP,
            "SpacingBetweenSlices",
        )?
        .first()
        .copied();
        Ok(())
    }

    fn write(&self, item: &mut InMemDicomObject) -> Result<()> {
        let mut seq_item = InMemDicomObject::new_empty();
        if !self.pixel_spacing.is_empty() {
            put_decimals(&mut seq_item, tags::PIXEL_SPACING, &self.pixel_spacing);
        }
        if let Some(v) = self.slice_thickness {
            put_decimals(&mut seq_item, tags::SLICE_THICKNESS, &[v]);
        }
        if let Some(v) = self.spacing_between_slices {
            put_decimals(&mut seq_item, tags::SPACING_BETWEEN_SLICES, &[v]);
        }
        put_sequence(item, GROUP.sequence_tag(), vec![seq_item]);
        Ok(())
    }

    fn compare(&self, other: &dyn FunctionalGroup) -> Ordering {
        compare_with(self, other, |a, b| {
            cmp_floats(&a.pixel_spacing, &b.pixel_spacing)
                .then_with(|| cmp_opt_float(a.slice_thickness, b.slice_thickness))
                .then_with(|| cmp_opt_float(a.spacing_between_slices, b.spacing_between_slices))
        })
    }

    fn clone_group(&self) -> Box<dyn FunctionalGroup> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
