//! Functional group type identifiers and their sharing classification.

use dicom_core::Tag;
use std::fmt;

/// Tags of the top-level sequences introducing each functional group macro.
///
/// Each functional group is stored in an item of either the
/// _Shared Functional Groups Sequence_ or the _Per-Frame Functional Groups Sequence_
/// as a single sequence element with one of these tags.
pub mod tags {
    use dicom_core::Tag;

    /// Derivation Image Sequence (0008,9124)
    pub const DERIVATION_IMAGE_SEQUENCE: Tag = Tag(0x0008, 0x9124);
    /// Referenced Image Sequence (0008,1140)
    pub const REFERENCED_IMAGE_SEQUENCE: Tag = Tag(0x0008, 0x1140);
    /// Cardiac Synchronization Sequence (0018,9118)
    pub const CARDIAC_SYNCHRONIZATION_SEQUENCE: Tag = Tag(0x0018, 0x9118);
    /// CT Acquisition Type Sequence (0018,9301)
    pub const CT_ACQUISITION_TYPE_SEQUENCE: Tag = Tag(0x0018, 0x9301);
    /// CT Acquisition Details Sequence (0018,9304)
    pub const CT_ACQUISITION_DETAILS_SEQUENCE: Tag = Tag(0x0018, 0x9304);
    /// CT Table Dynamics Sequence (0018,9308)
    pub const CT_TABLE_DYNAMICS_SEQUENCE: Tag = Tag(0x0018, 0x9308);
    /// CT Geometry Sequence (0018,9312)
    pub const CT_GEOMETRY_SEQUENCE: Tag = Tag(0x0018, 0x9312);
    /// CT Reconstruction Sequence (0018,9314)
    pub const CT_RECONSTRUCTION_SEQUENCE: Tag = Tag(0x0018, 0x9314);
    /// CT Exposure Sequence (0018,9321)
    pub const CT_EXPOSURE_SEQUENCE: Tag = Tag(0x0018, 0x9321);
    /// CT X-Ray Details Sequence (0018,9325)
    pub const CT_XRAY_DETAILS_SEQUENCE: Tag = Tag(0x0018, 0x9325);
    /// CT Position Sequence (0018,9326)
    pub const CT_POSITION_SEQUENCE: Tag = Tag(0x0018, 0x9326);
    /// CT Image Frame Type Sequence (0018,9329)
    pub const CT_IMAGE_FRAME_TYPE_SEQUENCE: Tag = Tag(0x0018, 0x9329);
    /// CT Additional X-Ray Source Sequence (0018,9360)
    pub const CT_ADDITIONAL_XRAY_SOURCE_SEQUENCE: Tag = Tag(0x0018, 0x9360);
    /// Irradiation Event Identification Sequence (0018,9477)
    pub const IRRADIATION_EVENT_IDENTIFICATION_SEQUENCE: Tag = Tag(0x0018, 0x9477);
    /// Image Data Type Sequence (0018,9807)
    pub const IMAGE_DATA_TYPE_SEQUENCE: Tag = Tag(0x0018, 0x9807);
    /// Frame Anatomy Sequence (0020,9071)
    pub const FRAME_ANATOMY_SEQUENCE: Tag = Tag(0x0020, 0x9071);
    /// Frame Content Sequence (0020,9111)
    pub const FRAME_CONTENT_SEQUENCE: Tag = Tag(0x0020, 0x9111);
    /// Plane Position Sequence (0020,9113)
    pub const PLANE_POSITION_SEQUENCE: Tag = Tag(0x0020, 0x9113);
    /// Plane Orientation Sequence (0020,9116)
    pub const PLANE_ORIENTATION_SEQUENCE: Tag = Tag(0x0020, 0x9116);
    /// Unassigned Shared Converted Attributes Sequence (0020,9170)
    pub const UNASSIGNED_SHARED_CONVERTED_ATTRIBUTES_SEQUENCE: Tag = Tag(0x0020, 0x9170);
    /// Unassigned Per-Frame Converted Attributes Sequence (0020,9171)
    pub const UNASSIGNED_PER_FRAME_CONVERTED_ATTRIBUTES_SEQUENCE: Tag = Tag(0x0020, 0x9171);
    /// Respiratory Synchronization Sequence (0020,9253)
    pub const RESPIRATORY_SYNCHRONIZATION_SEQUENCE: Tag = Tag(0x0020, 0x9253);
    /// Temporal Position Sequence (0020,9310)
    pub const TEMPORAL_POSITION_SEQUENCE: Tag = Tag(0x0020, 0x9310);
    /// Plane Position (Volume) Sequence (0020,930E)
    pub const PLANE_POSITION_VOLUME_SEQUENCE: Tag = Tag(0x0020, 0x930E);
    /// Plane Orientation (Volume) Sequence (0020,930F)
    pub const PLANE_ORIENTATION_VOLUME_SEQUENCE: Tag = Tag(0x0020, 0x930F);
    /// Pixel Measures Sequence (0028,9110)
    pub const PIXEL_MEASURES_SEQUENCE: Tag = Tag(0x0028, 0x9110);
    /// Frame VOI LUT Sequence (0028,9132)
    pub const FRAME_VOILUT_SEQUENCE: Tag = Tag(0x0028, 0x9132);
    /// Pixel Value Transformation Sequence (0028,9145)
    pub const PIXEL_VALUE_TRANSFORMATION_SEQUENCE: Tag = Tag(0x0028, 0x9145);
    /// Parametric Map Frame Type Sequence (0040,9092)
    pub const PARAMETRIC_MAP_FRAME_TYPE_SEQUENCE: Tag = Tag(0x0040, 0x9092);
    /// Real World Value Mapping Sequence (0040,9096)
    pub const REAL_WORLD_VALUE_MAPPING_SEQUENCE: Tag = Tag(0x0040, 0x9096);
    /// Segment Identification Sequence (0062,000A)
    pub const SEGMENT_IDENTIFICATION_SEQUENCE: Tag = Tag(0x0062, 0x000A);
}

/// Whether a functional group may appear in the shared functional groups,
/// in the per-frame functional groups, or in either of them.
#[derive(Debug, Copy, Clone, Eq, Hash, PartialEq)]
pub enum SharingClass {
    /// only permitted in the shared functional groups
    SharedOnly,
    /// only permitted in the per-frame functional groups
    PerFrameOnly,
    /// permitted as shared or per-frame
    Either,
    /// no classification known (e.g. unrecognized groups)
    Unspecified,
}

impl SharingClass {
    /// Whether a group of this class may be stored as a shared group.
    pub fn allows_shared(self) -> bool {
        !matches!(self, SharingClass::PerFrameOnly)
    }

    /// Whether a group of this class may be stored for an individual frame.
    pub fn allows_per_frame(self) -> bool {
        !matches!(self, SharingClass::SharedOnly)
    }
}

impl fmt::Display for SharingClass {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            SharingClass::SharedOnly => "shared only",
            SharingClass::PerFrameOnly => "per-frame only",
            SharingClass::Either => "shared or per-frame",
            SharingClass::Unspecified => "unspecified",
        })
    }
}

/// Identifier of a functional group macro.
///
/// Groups are identified by the tag of their top-level sequence.
/// Any sequence not recognized here is represented by
/// [`FunctionalGroupType::Unknown`], which keeps the sequence tag.
#[derive(Debug, Copy, Clone, Eq, Hash, PartialEq, PartialOrd, Ord)]
pub enum FunctionalGroupType {
    FrameContent,
    PlanePosition,
    PlaneOrientation,
    PixelMeasures,
    FrameVoiLut,
    PixelValueTransformation,
    DerivationImage,
    ReferencedImage,
    RealWorldValueMapping,
    FrameAnatomy,
    CardiacSynchronization,
    RespiratorySynchronization,
    IrradiationEventIdentification,
    TemporalPosition,
    UnassignedSharedConvertedAttributes,
    UnassignedPerFrameConvertedAttributes,
    ImageDataType,
    Segmentation,
    ParametricMapFrameType,
    PlanePositionVolume,
    PlaneOrientationVolume,
    CtImageFrameType,
    CtAcquisitionType,
    CtAcquisitionDetails,
    CtTableDynamics,
    CtGeometry,
    CtReconstruction,
    CtExposure,
    CtXRayDetails,
    CtPosition,
    CtAdditionalXRaySource,
    /// A functional group not known to this library,
    /// identified by its sequence tag
    Unknown(Tag),
}

use self::FunctionalGroupType::*;

/// All known functional group types (`Unknown` excluded).
pub const KNOWN_TYPES: &[FunctionalGroupType] = &[
    FrameContent,
    PlanePosition,
    PlaneOrientation,
    PixelMeasures,
    FrameVoiLut,
    PixelValueTransformation,
    DerivationImage,
    ReferencedImage,
    RealWorldValueMapping,
    FrameAnatomy,
    CardiacSynchronization,
    RespiratorySynchronization,
    IrradiationEventIdentification,
    TemporalPosition,
    UnassignedSharedConvertedAttributes,
    UnassignedPerFrameConvertedAttributes,
    ImageDataType,
    Segmentation,
    ParametricMapFrameType,
    PlanePositionVolume,
    PlaneOrientationVolume,
    CtImageFrameType,
    CtAcquisitionType,
    CtAcquisitionDetails,
    CtTableDynamics,
    CtGeometry,
    CtReconstruction,
    CtExposure,
    CtXRayDetails,
    CtPosition,
    CtAdditionalXRaySource,
];

impl FunctionalGroupType {
    /// The tag of the sequence holding this functional group.
    pub fn sequence_tag(self) -> Tag {
        match self {
            FrameContent => tags::FRAME_CONTENT_SEQUENCE,
            PlanePosition => tags::PLANE_POSITION_SEQUENCE,
            PlaneOrientation => tags::PLANE_ORIENTATION_SEQUENCE,
            PixelMeasures => tags::PIXEL_MEASURES_SEQUENCE,
            FrameVoiLut => tags::FRAME_VOILUT_SEQUENCE,
            PixelValueTransformation => tags::PIXEL_VALUE_TRANSFORMATION_SEQUENCE,
            DerivationImage => tags::DERIVATION_IMAGE_SEQUENCE,
            ReferencedImage => tags::REFERENCED_IMAGE_SEQUENCE,
            RealWorldValueMapping => tags::REAL_WORLD_VALUE_MAPPING_SEQUENCE,
            FrameAnatomy => tags::FRAME_ANATOMY_SEQUENCE,
            CardiacSynchronization => tags::CARDIAC_SYNCHRONIZATION_SEQUENCE,
            RespiratorySynchronization => tags::RESPIRATORY_SYNCHRONIZATION_SEQUENCE,
            IrradiationEventIdentification => tags::IRRADIATION_EVENT_IDENTIFICATION_SEQUENCE,
            TemporalPosition => tags::TEMPORAL_POSITION_SEQUENCE,
            UnassignedSharedConvertedAttributes => {
                tags::UNASSIGNED_SHARED_CONVERTED_ATTRIBUTES_SEQUENCE
            }
            UnassignedPerFrameConvertedAttributes => {
                tags::UNASSIGNED_PER_FRAME_CONVERTED_ATTRIBUTES_SEQUENCE
            }
            ImageDataType => tags::IMAGE_DATA_TYPE_SEQUENCE,
            Segmentation => tags::SEGMENT_IDENTIFICATION_SEQUENCE,
            ParametricMapFrameType => tags::PARAMETRIC_MAP_FRAME_TYPE_SEQUENCE,
            PlanePositionVolume => tags::PLANE_POSITION_VOLUME_SEQUENCE,
            PlaneOrientationVolume => tags::PLANE_ORIENTATION_VOLUME_SEQUENCE,
            CtImageFrameType => tags::CT_IMAGE_FRAME_TYPE_SEQUENCE,
            CtAcquisitionType => tags::CT_ACQUISITION_TYPE_SEQUENCE,
            CtAcquisitionDetails => tags::CT_ACQUISITION_DETAILS_SEQUENCE,
            CtTableDynamics => tags::CT_TABLE_DYNAMICS_SEQUENCE,
            CtGeometry => tags::CT_GEOMETRY_SEQUENCE,
            CtReconstruction => tags::CT_RECONSTRUCTION_SEQUENCE,
            CtExposure => tags::CT_EXPOSURE_SEQUENCE,
            CtXRayDetails => tags::CT_XRAY_DETAILS_SEQUENCE,
            CtPosition => tags::CT_POSITION_SEQUENCE,
            CtAdditionalXRaySource => tags::CT_ADDITIONAL_XRAY_SOURCE_SEQUENCE,
            Unknown(tag) => tag,
        }
    }

    /// Identify the functional group introduced by the given sequence tag.
    ///
    /// Unrecognized tags map to [`FunctionalGroupType::Unknown`].
    pub fn from_sequence_tag(tag: Tag) -> Self {
        KNOWN_TYPES
            .iter()
            .copied()
            .find(|t| t.sequence_tag() == tag)
            .unwrap_or(Unknown(tag))
    }

    /// Whether this group type is known to the library.
    pub fn is_known(self) -> bool {
        !matches!(self, Unknown(_))
    }

    /// The sharing classification of this group type.
    pub fn sharing(self) -> SharingClass {
        match self {
            FrameContent
            | Segmentation
            | TemporalPosition
            | UnassignedPerFrameConvertedAttributes => SharingClass::PerFrameOnly,
            UnassignedSharedConvertedAttributes => SharingClass::SharedOnly,
            Unknown(_) => SharingClass::Unspecified,
            _ => SharingClass::Either,
        }
    }

    /// The name of the functional group macro.
    pub fn name(self) -> &'static str {
        match self {
            FrameContent => "Frame Content",
            PlanePosition => "Plane Position (Patient)",
            PlaneOrientation => "Plane Orientation (Patient)",
            PixelMeasures => "Pixel Measures",
            FrameVoiLut => "Frame VOI LUT",
            PixelValueTransformation => "Pixel Value Transformation",
            DerivationImage => "Derivation Image",
            ReferencedImage => "Referenced Image",
            RealWorldValueMapping => "Real World Value Mapping",
            FrameAnatomy => "Frame Anatomy",
            CardiacSynchronization => "Cardiac Synchronization",
            RespiratorySynchronization => "Respiratory Synchronization",
            IrradiationEventIdentification => "Irradiation Event Identification",
            TemporalPosition => "Temporal Position",
            UnassignedSharedConvertedAttributes => "Unassigned Shared Converted Attributes",
            UnassignedPerFrameConvertedAttributes => "Unassigned Per-Frame Converted Attributes",
            ImageDataType => "Image Data Type",
            Segmentation => "Segmentation",
            ParametricMapFrameType => "Parametric Map Frame Type",
            PlanePositionVolume => "Plane Position (Volume)",
            PlaneOrientationVolume => "Plane Orientation (Volume)",
            CtImageFrameType => "CT Image Frame Type",
            CtAcquisitionType => "CT Acquisition Type",
            CtAcquisitionDetails => "CT Acquisition Details",
            CtTableDynamics => "CT Table Dynamics",
            CtGeometry => "CT Geometry",
            CtReconstruction => "CT Reconstruction",
            CtExposure => "CT Exposure",
            CtXRayDetails => "CT X-Ray Details",
            CtPosition => "CT Position",
            CtAdditionalXRaySource => "CT Additional X-Ray Source",
            Unknown(_) => "Unknown",
        }
    }
}

impl fmt::Display for FunctionalGroupType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Unknown(tag) => write!(f, "Unknown {}", tag),
            t => f.write_str(t.name()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn sequence_tags_map_back_to_types() {
        for &t in KNOWN_TYPES {
            assert_eq!(FunctionalGroupType::from_sequence_tag(t.sequence_tag()), t);
        }
    }

    #[test]
    fn unrecognized_tag_is_unknown() {
        let tag = Tag(0x0009, 0x1010);
        let t = FunctionalGroupType::from_sequence_tag(tag);
        assert_eq!(t, FunctionalGroupType::Unknown(tag));
        assert_eq!(t.sequence_tag(), tag);
        assert_eq!(t.sharing(), SharingClass::Unspecified);
        assert!(!t.is_known());
    }

    #[rstest]
    #[case(FrameContent, SharingClass::PerFrameOnly)]
    #[case(Segmentation, SharingClass::PerFrameOnly)]
    #[case(TemporalPosition, SharingClass::PerFrameOnly)]
    #[case(UnassignedPerFrameConvertedAttributes, SharingClass::PerFrameOnly)]
    #[case(UnassignedSharedConvertedAttributes, SharingClass::SharedOnly)]
    #[case(PixelMeasures, SharingClass::Either)]
    #[case(CtExposure, SharingClass::Either)]
    #[case(Unknown(Tag(0x0009, 0x1010)), SharingClass::Unspecified)]
    fn classification(#[case] group_type: FunctionalGroupType, #[case] sharing: SharingClass) {
        assert_eq!(group_type.sharing(), sharing);
    }

    #[test]
    fn sharing_permissions() {
        assert!(!SharingClass::PerFrameOnly.allows_shared());
        assert!(!SharingClass::SharedOnly.allows_per_frame());
        assert!(SharingClass::Unspecified.allows_shared());
        assert!(SharingClass::Either.allows_per_frame());
    }
}
