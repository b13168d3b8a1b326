use crate::group::{compare_with, put_sequence, same_items, sequence_items, FunctionalGroup};
use crate::types::FunctionalGroupType;
use crate::Result;
use dicom_object::InMemDicomObject;
use std::any::Any;
use std::cmp::Ordering;

/// A functional group kept without interpretation.
///
/// The items of the group's sequence are read and written back as they are.
/// This is used for every group type without a dedicated implementation,
/// as well as for sequences not recognized as a functional group
/// (see [`FunctionalGroupType::Unknown`]).
#[derive(Debug, Clone, PartialEq)]
pub struct OpaqueGroup {
    group_type: FunctionalGroupType,
    items: Vec<InMemDicomObject>,
}

impl OpaqueGroup {
    /// Create an empty group of the given type.
    pub fn new(group_type: FunctionalGroupType) -> Self {
        OpaqueGroup {
            group_type,
            items: Vec::new(),
        }
    }

    /// Create a group of the given type with the given sequence items.
    pub fn with_items(group_type: FunctionalGroupType, items: Vec<InMemDicomObject>) -> Self {
        OpaqueGroup { group_type, items }
    }

    /// The items of the group's sequence.
    pub fn items(&self) -> &[InMemDicomObject] {
        &self.items
    }

    /// Mutable access to the items of the group's sequence.
    pub fn items_mut(&mut self) -> &mut Vec<InMemDicomObject> {
        &mut self.items
    }
}

impl FunctionalGroup for OpaqueGroup {
    fn group_type(&self) -> FunctionalGroupType {
        self.group_type
    }

    fn read(&mut self, item: &InMemDicomObject) -> Result<()> {
        self.items = sequence_items(item, self.group_type)?.to_vec();
        Ok(())
    }

    fn write(&self, item: &mut InMemDicomObject) -> Result<()> {
        put_sequence(item, self.group_type.sequence_tag(), self.items.clone());
        Ok(())
    }

    fn compare(&self, other: &dyn FunctionalGroup) -> Ordering {
        compare_with(self, other, |a, b| {
            if same_items(&a.items, &b.items) {
                Ordering::Equal
            } else {
                // no natural order between data sets
                a.items.len().cmp(&b.items.len()).then(Ordering::Greater)
            }
        })
    }

    fn clone_group(&self) -> Box<dyn FunctionalGroup> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
