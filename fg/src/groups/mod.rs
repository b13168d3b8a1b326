//! Concrete functional group implementations.
//!
//! Only a few groups are modelled with typed attributes.
//! All other groups, including those not known to this library,
//! are kept as an [`OpaqueGroup`],
//! which preserves the sequence content verbatim.

mod frame_content;
mod opaque;
mod pixel_measures;
mod plane_orientation;
mod plane_position;
mod segmentation;

pub use self::frame_content::FrameContentGroup;
pub use self::opaque::OpaqueGroup;
pub use self::pixel_measures::PixelMeasuresGroup;
pub use self::plane_orientation::PlaneOrientationGroup;
pub use self::plane_position::PlanePositionGroup;
pub use self::segmentation::SegmentationGroup;
