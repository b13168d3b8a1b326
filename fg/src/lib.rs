//! This crate implements the functional groups of
//! DICOM enhanced multi-frame objects.
//!
//! Each frame of an enhanced multi-frame instance is described
//! by a set of functional groups,
//! which are either _shared_ by all frames
//! (in the _Shared Functional Groups Sequence_)
//! or recorded for each frame individually
//! (in the _Per-Frame Functional Groups Sequence_).
//!
//! - [`FunctionalGroup`] is the interface implemented by every group,
//!   with [`groups`] containing the concrete implementations.
//! - [`registry`] maps sequence tags to group constructors,
//!   falling back to an opaque pass-through group for unknown sequences.
//! - [`FunctionalGroups`] holds the shared and per-frame groups
//!   of one multi-frame instance.
//!
//! # Example
//!
//! ```
//! # use dicom_fg::{FunctionalGroups, FunctionalGroupType};
//! # use dicom_fg::groups::{FrameContentGroup, PixelMeasuresGroup};
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut groups = FunctionalGroups::new();
//! let mut measures = PixelMeasuresGroup::new();
//! measures.set_pixel_spacing(0.5, 0.5);
//! groups.add_shared(&measures)?;
//!
//! let mut content = FrameContentGroup::new();
//! content.set_dimension_index_values(vec![1, 1]);
//! groups.add_per_frame(0, &content)?;
//!
//! let (group, per_frame) = groups
//!     .get(0, FunctionalGroupType::PixelMeasures)
//!     .expect("pixel measures should be available for frame 0");
//! assert!(!per_frame);
//! assert_eq!(group.group_type(), FunctionalGroupType::PixelMeasures);
//! # Ok(())
//! # }
//! ```
use dicom_core::Tag;
use snafu::{Backtrace, Snafu};

pub mod group;
pub mod groups;
pub mod interface;
pub mod registry;
pub mod types;

pub use crate::group::FunctionalGroup;
pub use crate::interface::FunctionalGroups;
pub use crate::registry::{registry, FunctionalGroupRegistry};
pub use crate::types::{FunctionalGroupType, SharingClass};

/// An error when reading, writing or arranging functional groups.
#[derive(Debug, Snafu)]
#[non_exhaustive]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    /// The sequence of a functional group was not found
    #[snafu(display("Missing sequence {} for functional group {}", tag, group_type))]
    MissingSequence {
        group_type: FunctionalGroupType,
        tag: Tag,
        backtrace: Backtrace,
    },

    /// The sequence of a functional group has no items
    #[snafu(display("Sequence of functional group {} is empty", group_type))]
    EmptySequence {
        group_type: FunctionalGroupType,
        backtrace: Backtrace,
    },

    /// An attribute of a functional group could not be converted
    #[snafu(display("Could not convert attribute `{}` of functional group {}", name, group_type))]
    ConvertValue {
        group_type: FunctionalGroupType,
        name: &'static str,
        source: dicom_core::value::ConvertValueError,
        backtrace: Backtrace,
    },

    /// A group was about to be placed where its sharing class forbids it
    #[snafu(display("Functional group {} is {} and cannot be stored {}", group_type, sharing, target))]
    NotPermitted {
        group_type: FunctionalGroupType,
        sharing: SharingClass,
        target: &'static str,
        backtrace: Backtrace,
    },

    /// A functional groups sequence of the data set was not found or was empty
    #[snafu(display("Missing or empty {}", name))]
    MissingFunctionalGroups {
        name: &'static str,
        backtrace: Backtrace,
    },

    /// The functional group structure is not valid
    #[snafu(display("Functional group structure check failed with {} error(s)", errors))]
    StructureCheck { errors: usize, backtrace: Backtrace },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
