//! Functional group registry implementation.
//!
//! The registry maps each functional group type
//! to a constructor of its concrete implementation.
//! It is built once on first use and is read-only afterwards.

use crate::group::FunctionalGroup;
use crate::groups::{
    FrameContentGroup, OpaqueGroup, PixelMeasuresGroup, PlaneOrientationGroup,
    PlanePositionGroup, SegmentationGroup,
};
use crate::types::FunctionalGroupType;
use crate::Result;
use dicom_core::Tag;
use dicom_object::InMemDicomObject;
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::fmt;

/// A constructor of an empty functional group.
pub type GroupConstructor = fn() -> Box<dyn FunctionalGroup>;

static REGISTRY: Lazy<FunctionalGroupRegistry> = Lazy::new(FunctionalGroupRegistry::standard);

/// Retrieve the global functional group registry.
#[inline]
pub fn registry() -> &'static FunctionalGroupRegistry {
    &REGISTRY
}

/// Main implementation of a registry of functional group constructors.
///
/// Group types without a registered constructor
/// are served by [`OpaqueGroup`].
pub struct FunctionalGroupRegistry {
    m: HashMap<FunctionalGroupType, GroupConstructor>,
}

impl fmt::Debug for FunctionalGroupRegistry {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut types: Vec<_> = self.m.keys().collect();
        types.sort();
        f.debug_struct("FunctionalGroupRegistry")
            .field("types", &types)
            .finish()
    }
}

impl Default for FunctionalGroupRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

impl FunctionalGroupRegistry {
    /// Create a registry without any constructors.
    pub fn empty() -> Self {
        FunctionalGroupRegistry { m: HashMap::new() }
    }

    /// Create a registry with the constructors of all typed groups
    /// implemented by this crate.
    pub fn standard() -> Self {
        let mut registry = Self::empty();
        registry.register(FunctionalGroupType::FrameContent, || {
            Box::new(FrameContentGroup::new())
        });
        registry.register(FunctionalGroupType::PixelMeasures, || {
            Box::new(PixelMeasuresGroup::new())
        });
        registry.register(FunctionalGroupType::PlanePosition, || {
            Box::new(PlanePositionGroup::new())
        });
        registry.register(FunctionalGroupType::PlaneOrientation, || {
            Box::new(PlaneOrientationGroup::new())
        });
        registry.register(FunctionalGroupType::Segmentation, || {
            Box::new(SegmentationGroup::new())
        });
        registry
    }

    /// Register a constructor for the given group type,
    /// replacing any previous one.
    pub fn register(&mut self, group_type: FunctionalGroupType, ctor: GroupConstructor) {
        self.m.insert(group_type, ctor);
    }

    /// Obtain the constructor registered for the given group type.
    pub fn get(&self, group_type: FunctionalGroupType) -> Option<GroupConstructor> {
        self.m.get(&group_type).copied()
    }

    /// Create an empty group of the given type.
    ///
    /// This never fails:
    /// types without a constructor produce an [`OpaqueGroup`].
    pub fn create(&self, group_type: FunctionalGroupType) -> Box<dyn FunctionalGroup> {
        match self.get(group_type) {
            Some(ctor) => ctor(),
            None => Box::new(OpaqueGroup::new(group_type)),
        }
    }

    /// Create an empty group for the given sequence tag.
    pub fn create_for_tag(&self, tag: Tag) -> Box<dyn FunctionalGroup> {
        self.create(FunctionalGroupType::from_sequence_tag(tag))
    }

    /// Create the group identified by `tag` and read it
    /// from the given functional groups item.
    pub fn read_group(&self, item: &InMemDicomObject, tag: Tag) -> Result<Box<dyn FunctionalGroup>> {
        let mut group = self.create_for_tag(tag);
        group.read(item)?;
        Ok(group)
    }
}
