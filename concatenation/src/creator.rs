//! Splitting a multi-frame instance into a concatenation.
//!
//! See [`ConcatenationCreator`].

use crate::attributes::{get_str, get_u16, get_u32, items, put_str, put_u16, put_u32};
use crate::frame::{bits_per_frame, copy_bits, put_pixel_data};
use crate::uid::new_uid;
use crate::{
    BuildMetaSnafu, ConcatenationCompleteSnafu, FragmentTooLargeSnafu, FrameCountMismatchSnafu,
    InvalidAttributeSnafu, InvalidFramesPerInstanceSnafu, MissingAttributeSnafu,
    NotConfiguredSnafu, PerFrameItemsExhaustedSnafu, PixelDataTooShortSnafu, Result,
    TooManyInstancesSnafu, UnsupportedPhotometricInterpretationSnafu,
    UnsupportedPlanarConfigurationSnafu, UnsupportedSopClassSnafu, WriteFileSnafu, MAX_FRAGMENT_BYTES,
    MAX_INSTANCES,
};
use dicom_core::header::Header;
use dicom_core::value::DataSetSequence;
use dicom_core::{DataElement, VR};
use dicom_dictionary_std::{tags, uids};
use dicom_object::{
    FileMetaTableBuilder, InMemDicomObject, IMPLEMENTATION_CLASS_UID, IMPLEMENTATION_VERSION_NAME,
};
use snafu::{ensure, OptionExt, ResultExt};
use std::borrow::Cow;
use std::ops::Range;
use std::path::Path;
use tracing::{debug, info, warn};

/// The number of frames per instance used by
/// [`configure_with_defaults`](ConcatenationCreator::configure_with_defaults).
pub const DEFAULT_FRAMES_PER_INSTANCE: u32 = 25;

/// Ophthalmic Optical Coherence Tomography B-scan Volume Analysis Storage
const OPHTHALMIC_OCT_BSCAN_VOLUME_ANALYSIS_STORAGE: &str = "1.2.840.10008.5.1.4.1.1.77.1.5.8";

/// SOP classes which do not permit concatenations
const UNSUPPORTED_SOP_CLASSES: [&str; 2] = [
    uids::OPHTHALMIC_TOMOGRAPHY_IMAGE_STORAGE,
    OPHTHALMIC_OCT_BSCAN_VOLUME_ANALYSIS_STORAGE,
];

const SUPPORTED_PHOTOMETRIC_INTERPRETATIONS: [&str; 4] =
    ["RGB", "YBR_FULL", "MONOCHROME1", "MONOCHROME2"];

/// The properties of a concatenation, as determined from its source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConcatenationDescriptor {
    /// The UID shared by all instances of the concatenation
    pub concatenation_uid: String,
    /// The SOP Instance UID of the source instance
    pub source_uid: String,
    /// The effective number of frames per instance,
    /// which may have been adjusted for 1-bit pixel data
    pub frames_per_instance: u32,
    pub total_frames: u32,
    pub total_instances: u16,
    pub bits_per_frame: u64,
}

/// The concatenation attributes of one instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FragmentDescriptor {
    pub concatenation_uid: String,
    /// The offset of the first frame of this instance
    /// in the source instance (0-based)
    pub frame_offset_number: u32,
    /// The position of this instance in the concatenation (1-based)
    pub in_concatenation_number: u16,
    pub in_concatenation_total_number: u16,
    pub source_uid: String,
    /// The newly generated SOP Instance UID of this instance
    pub sop_instance_uid: String,
    pub number_of_frames: u32,
}

impl FragmentDescriptor {
    /// The range of source frames contained in this instance.
    pub fn frames(&self) -> Range<u32> {
        self.frame_offset_number..self.frame_offset_number + self.number_of_frames
    }
}

/// One instance of a concatenation.
#[derive(Debug, Clone, PartialEq)]
pub struct Fragment {
    pub dataset: InMemDicomObject,
    pub descriptor: FragmentDescriptor,
}

#[derive(Debug)]
struct Input<'a> {
    source: Cow<'a, InMemDicomObject>,
    pixel_data: Cow<'a, [u8]>,
    frames_per_instance: u32,
    instance_number: String,
}

#[derive(Debug)]
struct Prepared<'a> {
    /// the source data set without pixel data and per-frame groups
    template: InMemDicomObject,
    per_frame_items: Vec<InMemDicomObject>,
    pixel_data: Cow<'a, [u8]>,
    bits_allocated: u16,
    instance_number: String,
    descriptor: ConcatenationDescriptor,
    /// number of instances already written
    written: u32,
    /// index of the next per-frame functional groups item
    next_item: usize,
}

#[derive(Debug)]
enum State<'a> {
    Unconfigured,
    Configured(Box<Input<'a>>),
    Ready(Box<Prepared<'a>>),
}

/// Splits a multi-frame instance into the instances of a concatenation.
///
/// The creator is configured with a source data set and its pixel data,
/// each of which may be borrowed or handed over.
/// The source is validated on first use,
/// after which instances are produced one at a time
/// with [`write_next_instance`](Self::write_next_instance)
/// until [`Error::ConcatenationComplete`](crate::Error::ConcatenationComplete)
/// is returned.
///
/// Every instance receives a copy of all source attributes
/// (including the shared functional groups),
/// its range of pixel data frames
/// and the matching items of the per-frame functional groups.
#[derive(Debug)]
pub struct ConcatenationCreator<'a> {
    concatenation_uid: String,
    state: State<'a>,
}

impl Default for ConcatenationCreator<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> ConcatenationCreator<'a> {
    pub fn new() -> Self {
        ConcatenationCreator {
            concatenation_uid: String::new(),
            state: State::Unconfigured,
        }
    }

    /// Configure the creator with a source instance.
    ///
    /// `pixel_data` holds the native pixel data of all frames.
    /// Any pixel data element in `source` is not used.
    /// The same `instance_number` is given to every instance.
    ///
    /// Any previous configuration is discarded,
    /// and a new Concatenation UID is generated.
    /// Validation is deferred until the creator is first used.
    pub fn configure(
        &mut self,
        source: Cow<'a, InMemDicomObject>,
        pixel_data: Cow<'a, [u8]>,
        frames_per_instance: u32,
        instance_number: impl Into<String>,
    ) {
        self.concatenation_uid = new_uid();
        self.state = State::Configured(Box::new(Input {
            source,
            pixel_data,
            frames_per_instance,
            instance_number: instance_number.into(),
        }));
    }

    /// Configure the creator with [`DEFAULT_FRAMES_PER_INSTANCE`]
    /// and instance number 1.
    pub fn configure_with_defaults(
        &mut self,
        source: Cow<'a, InMemDicomObject>,
        pixel_data: Cow<'a, [u8]>,
    ) {
        self.configure(source, pixel_data, DEFAULT_FRAMES_PER_INSTANCE, "1");
    }

    /// The number of instances of the concatenation,
    /// or 0 if the creator is not configured or its source is invalid.
    pub fn number_of_instances(&mut self) -> usize {
        match self.prepare() {
            Ok(prepared) => usize::from(prepared.descriptor.total_instances),
            Err(e) => {
                warn!("Cannot create concatenation: {}", e);
                0
            }
        }
    }

    /// Validate the configuration and obtain the concatenation's properties.
    pub fn descriptor(&mut self) -> Result<&ConcatenationDescriptor> {
        Ok(&self.prepare()?.descriptor)
    }

    /// Whether all instances have been written.
    pub fn is_complete(&self) -> bool {
        match &self.state {
            State::Ready(prepared) => {
                prepared.written >= u32::from(prepared.descriptor.total_instances)
            }
            _ => false,
        }
    }

    /// Produce the next instance of the concatenation.
    ///
    /// Once all instances are written,
    /// this returns [`Error::ConcatenationComplete`](crate::Error::ConcatenationComplete).
    /// On any other error the creator stays at the same instance.
    pub fn write_next_instance(&mut self) -> Result<Fragment> {
        let prepared = self.prepare()?;
        let fragment = prepared.build_next()?;
        prepared.advance(&fragment.descriptor);
        Ok(fragment)
    }

    /// Produce the next instance of the concatenation
    /// and save it as a DICOM file with Explicit VR Little Endian.
    ///
    /// The creator only moves on to the following instance
    /// if the file was written successfully.
    pub fn write_next_instance_to_file(
        &mut self,
        path: impl AsRef<Path>,
    ) -> Result<FragmentDescriptor> {
        let path = path.as_ref();
        let prepared = self.prepare()?;
        let Fragment {
            dataset,
            descriptor,
        } = prepared.build_next()?;

        let mut meta = FileMetaTableBuilder::new()
            .transfer_syntax(uids::EXPLICIT_VR_LITTLE_ENDIAN)
            .media_storage_sop_instance_uid(descriptor.sop_instance_uid.as_str())
            .implementation_class_uid(IMPLEMENTATION_CLASS_UID)
            .implementation_version_name(IMPLEMENTATION_VERSION_NAME);
        if let Some(sop_class_uid) = get_str(&dataset, tags::SOP_CLASS_UID) {
            meta = meta.media_storage_sop_class_uid(sop_class_uid);
        }
        let file = dataset.with_meta(meta).context(BuildMetaSnafu)?;
        file.write_to_file(path).context(WriteFileSnafu { path })?;

        debug!(
            "Wrote instance {}/{} to {}",
            descriptor.in_concatenation_number,
            descriptor.in_concatenation_total_number,
            path.display()
        );
        prepared.advance(&descriptor);
        Ok(descriptor)
    }

    /// Iterate over the remaining instances of the concatenation.
    ///
    /// The iterator ends after the last instance
    /// or after the first error.
    pub fn fragments(&mut self) -> Fragments<'_, 'a> {
        Fragments {
            creator: self,
            done: false,
        }
    }

    /// Validate the configuration if not done yet.
    fn prepare(&mut self) -> Result<&mut Prepared<'a>> {
        if let State::Configured(input) = &self.state {
            let (descriptor, bits_allocated) = validate(input, &self.concatenation_uid)?;
            if let State::Configured(input) =
                std::mem::replace(&mut self.state, State::Unconfigured)
            {
                self.state = State::Ready(Box::new(Prepared::new(
                    *input,
                    descriptor,
                    bits_allocated,
                )));
            }
        }
        match &mut self.state {
            State::Ready(prepared) => Ok(&mut **prepared),
            _ => NotConfiguredSnafu.fail(),
        }
    }
}

/// Check the source of a concatenation and compute its properties.
fn validate(input: &Input<'_>, concatenation_uid: &str) -> Result<(ConcatenationDescriptor, u16)> {
    let source: &InMemDicomObject = &input.source;
    ensure!(input.frames_per_instance > 0, InvalidFramesPerInstanceSnafu);

    if let Some(sop_class_uid) = get_str(source, tags::SOP_CLASS_UID) {
        ensure!(
            !UNSUPPORTED_SOP_CLASSES.contains(&sop_class_uid.as_str()),
            UnsupportedSopClassSnafu { uid: sop_class_uid }
        );
    }

    let photometric = get_str(source, tags::PHOTOMETRIC_INTERPRETATION).context(
        MissingAttributeSnafu {
            name: "PhotometricInterpretation",
        },
    )?;
    ensure!(
        SUPPORTED_PHOTOMETRIC_INTERPRETATIONS.contains(&photometric.as_str()),
        UnsupportedPhotometricInterpretationSnafu { value: photometric }
    );
    if let Some(planar_configuration) = get_u16(source, tags::PLANAR_CONFIGURATION) {
        ensure!(
            planar_configuration == 0,
            UnsupportedPlanarConfigurationSnafu {
                value: planar_configuration
            }
        );
    }

    let bits_allocated = get_u16(source, tags::BITS_ALLOCATED).context(MissingAttributeSnafu {
        name: "BitsAllocated",
    })?;
    let rows = get_u16(source, tags::ROWS).context(MissingAttributeSnafu { name: "Rows" })?;
    let columns =
        get_u16(source, tags::COLUMNS).context(MissingAttributeSnafu { name: "Columns" })?;
    let samples_per_pixel = get_u16(source, tags::SAMPLES_PER_PIXEL).unwrap_or(1);
    let bits_per_frame = bits_per_frame(rows, columns, bits_allocated, samples_per_pixel)?;

    let total_frames = if source.get(tags::NUMBER_OF_FRAMES).is_some() {
        get_u32(source, tags::NUMBER_OF_FRAMES)
            .filter(|n| *n > 0)
            .context(InvalidAttributeSnafu {
                name: "NumberOfFrames",
            })?
    } else {
        1
    };

    let mut frames_per_instance = input.frames_per_instance;
    if bits_allocated == 1 && (bits_per_frame * u64::from(frames_per_instance)) % 8 != 0 {
        let adjusted = (frames_per_instance.saturating_add(7) / 8 * 8).min(total_frames);
        info!(
            "Adjusting frames per instance from {} to {} to keep 1-bit pixel data byte aligned",
            frames_per_instance, adjusted
        );
        frames_per_instance = adjusted;
    }

    let total_instances = u64::from(total_frames.div_ceil(frames_per_instance));
    ensure!(
        total_instances <= u64::from(MAX_INSTANCES),
        TooManyInstancesSnafu {
            instances: total_instances
        }
    );

    let fragment_bytes = bits_per_frame
        .saturating_mul(u64::from(frames_per_instance.min(total_frames)))
        .div_ceil(8);
    ensure!(
        fragment_bytes <= MAX_FRAGMENT_BYTES,
        FragmentTooLargeSnafu {
            bytes: fragment_bytes
        }
    );

    let per_frame_items = items(source, tags::PER_FRAME_FUNCTIONAL_GROUPS_SEQUENCE).map_or(0, |i| i.len());
    ensure!(
        per_frame_items == total_frames as usize,
        FrameCountMismatchSnafu {
            expected: total_frames,
            found: per_frame_items,
        }
    );

    let needed_bytes = bits_per_frame
        .saturating_mul(u64::from(total_frames))
        .div_ceil(8);
    ensure!(
        input.pixel_data.len() as u64 >= needed_bytes,
        PixelDataTooShortSnafu {
            expected: needed_bytes,
            found: input.pixel_data.len(),
        }
    );

    let source_uid = get_str(source, tags::SOP_INSTANCE_UID).context(MissingAttributeSnafu {
        name: "SOPInstanceUID",
    })?;

    debug!(
        "Concatenation {} of {} frames in {} instances",
        concatenation_uid, total_frames, total_instances
    );
    Ok((
        ConcatenationDescriptor {
            concatenation_uid: concatenation_uid.to_string(),
            source_uid,
            frames_per_instance,
            total_frames,
            total_instances: total_instances as u16,
            bits_per_frame,
        },
        bits_allocated,
    ))
}

impl<'a> Prepared<'a> {
    fn new(input: Input<'a>, descriptor: ConcatenationDescriptor, bits_allocated: u16) -> Self {
        let Input {
            source,
            pixel_data,
            instance_number,
            ..
        } = input;
        let (template, per_frame_items) = split_source(source);
        Prepared {
            template,
            per_frame_items,
            pixel_data,
            bits_allocated,
            instance_number,
            descriptor,
            written: 0,
            next_item: 0,
        }
    }

    /// Build the next instance without moving forward.
    fn build_next(&self) -> Result<Fragment> {
        let d = &self.descriptor;
        ensure!(
            self.written < u32::from(d.total_instances),
            ConcatenationCompleteSnafu
        );

        let in_concatenation_number = (self.written + 1) as u16;
        let frame_offset_number = self.written * d.frames_per_instance;
        let number_of_frames = d
            .frames_per_instance
            .min(d.total_frames - frame_offset_number);

        let per_frame_items = self
            .per_frame_items
            .get(self.next_item..self.next_item + number_of_frames as usize)
            .context(PerFrameItemsExhaustedSnafu {
                in_concatenation_number,
            })?
            .to_vec();

        let pixels = copy_bits(
            &self.pixel_data,
            u64::from(frame_offset_number) * d.bits_per_frame,
            u64::from(number_of_frames) * d.bits_per_frame,
        );

        let descriptor = FragmentDescriptor {
            concatenation_uid: d.concatenation_uid.clone(),
            frame_offset_number,
            in_concatenation_number,
            in_concatenation_total_number: d.total_instances,
            source_uid: d.source_uid.clone(),
            sop_instance_uid: new_uid(),
            number_of_frames,
        };

        let mut dataset = self.template.clone();
        dataset.put(DataElement::new(
            tags::PER_FRAME_FUNCTIONAL_GROUPS_SEQUENCE,
            VR::SQ,
            DataSetSequence::from(per_frame_items),
        ));
        put_pixel_data(&mut dataset, pixels, self.bits_allocated);
        put_str(
            &mut dataset,
            tags::CONCATENATION_UID,
            VR::UI,
            descriptor.concatenation_uid.as_str(),
        );
        put_str(
            &mut dataset,
            tags::INSTANCE_NUMBER,
            VR::IS,
            self.instance_number.as_str(),
        );
        put_u32(
            &mut dataset,
            tags::CONCATENATION_FRAME_OFFSET_NUMBER,
            frame_offset_number,
        );
        put_str(
            &mut dataset,
            tags::SOP_INSTANCE_UID_OF_CONCATENATION_SOURCE,
            VR::UI,
            descriptor.source_uid.as_str(),
        );
        put_u16(
            &mut dataset,
            tags::IN_CONCATENATION_NUMBER,
            in_concatenation_number,
        );
        put_u16(
            &mut dataset,
            tags::IN_CONCATENATION_TOTAL_NUMBER,
            d.total_instances,
        );
        put_str(
            &mut dataset,
            tags::NUMBER_OF_FRAMES,
            VR::IS,
            number_of_frames.to_string(),
        );
        put_str(
            &mut dataset,
            tags::SOP_INSTANCE_UID,
            VR::UI,
            descriptor.sop_instance_uid.as_str(),
        );

        Ok(Fragment {
            dataset,
            descriptor,
        })
    }

    fn advance(&mut self, descriptor: &FragmentDescriptor) {
        self.written += 1;
        self.next_item += descriptor.number_of_frames as usize;
    }
}

/// Separate the source into a template for all instances
/// and its per-frame functional groups items.
fn split_source(source: Cow<'_, InMemDicomObject>) -> (InMemDicomObject, Vec<InMemDicomObject>) {
    match source {
        Cow::Owned(mut obj) => {
            obj.remove_element(tags::PIXEL_DATA);
            let items = obj
                .take_element(tags::PER_FRAME_FUNCTIONAL_GROUPS_SEQUENCE)
                .ok()
                .and_then(|e| e.into_value().into_items())
                .map(|items| items.into_vec())
                .unwrap_or_default();
            (obj, items)
        }
        Cow::Borrowed(obj) => {
            let template = InMemDicomObject::from_element_iter(
                obj.into_iter()
                    .filter(|e| {
                        e.tag() != tags::PIXEL_DATA
                            && e.tag() != tags::PER_FRAME_FUNCTIONAL_GROUPS_SEQUENCE
                    })
                    .cloned(),
            );
            let items = items(obj, tags::PER_FRAME_FUNCTIONAL_GROUPS_SEQUENCE)
                .map(|items| items.to_vec())
                .unwrap_or_default();
            (template, items)
        }
    }
}

/// An iterator over the instances of a concatenation.
///
/// See [`ConcatenationCreator::fragments`].
#[derive(Debug)]
pub struct Fragments<'c, 'a> {
    creator: &'c mut ConcatenationCreator<'a>,
    done: bool,
}

impl Iterator for Fragments<'_, '_> {
    type Item = Result<Fragment>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.creator.write_next_instance() {
            Ok(fragment) => Some(Ok(fragment)),
            Err(e) if e.is_complete() => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Error, ErrorKind};
    use dicom_core::PrimitiveValue;
    use rstest::rstest;

    fn source(rows: u16, columns: u16, bits_allocated: u16, frames: u32) -> InMemDicomObject {
        let per_frame: Vec<_> = (0..frames)
            .map(|i| {
                InMemDicomObject::from_element_iter([DataElement::new(
                    tags::DIMENSION_INDEX_VALUES,
                    VR::UL,
                    PrimitiveValue::from(i + 1),
                )])
            })
            .collect();
        InMemDicomObject::from_element_iter([
            DataElement::new(
                tags::SOP_CLASS_UID,
                VR::UI,
                uids::ENHANCED_CT_IMAGE_STORAGE,
            ),
            DataElement::new(tags::SOP_INSTANCE_UID, VR::UI, "1.2.3.4"),
            DataElement::new(tags::SAMPLES_PER_PIXEL, VR::US, PrimitiveValue::from(1_u16)),
            DataElement::new(tags::PHOTOMETRIC_INTERPRETATION, VR::CS, "MONOCHROME2"),
            DataElement::new(tags::NUMBER_OF_FRAMES, VR::IS, frames.to_string()),
            DataElement::new(tags::ROWS, VR::US, PrimitiveValue::from(rows)),
            DataElement::new(tags::COLUMNS, VR::US, PrimitiveValue::from(columns)),
            DataElement::new(
                tags::BITS_ALLOCATED,
                VR::US,
                PrimitiveValue::from(bits_allocated),
            ),
            DataElement::new(
                tags::PER_FRAME_FUNCTIONAL_GROUPS_SEQUENCE,
                VR::SQ,
                DataSetSequence::from(per_frame),
            ),
        ])
    }

    fn creator_for(
        obj: InMemDicomObject,
        pixel_data: Vec<u8>,
        frames_per_instance: u32,
    ) -> ConcatenationCreator<'static> {
        let mut creator = ConcatenationCreator::new();
        creator.configure(
            Cow::Owned(obj),
            Cow::Owned(pixel_data),
            frames_per_instance,
            "7",
        );
        creator
    }

    #[test]
    fn unconfigured_creator() {
        let mut creator = ConcatenationCreator::new();
        assert_eq!(creator.number_of_instances(), 0);
        let err = creator.write_next_instance().unwrap_err();
        assert!(matches!(err, Error::NotConfigured { .. }));
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[rstest]
    #[case(10, 1, 10)]
    #[case(10, 3, 4)]
    #[case(10, 10, 1)]
    #[case(10, 25, 1)]
    fn instance_count(#[case] frames: u32, #[case] per_instance: u32, #[case] expected: usize) {
        let pixel_data = vec![0_u8; 4 * frames as usize];
        let mut creator = creator_for(source(2, 2, 8, frames), pixel_data, per_instance);
        assert_eq!(creator.number_of_instances(), expected);
    }

    #[test]
    fn one_bit_frames_per_instance_rounded_up() {
        // 3x3 frames of 9 bits each
        let mut creator = creator_for(source(3, 3, 1, 20), vec![0; 23], 5);
        let descriptor = creator.descriptor().unwrap();
        assert_eq!(descriptor.frames_per_instance, 8);
        assert_eq!(descriptor.total_instances, 3);
        assert_eq!(
            descriptor.bits_per_frame * u64::from(descriptor.frames_per_instance) % 8,
            0
        );

        // capped at the number of frames
        let mut creator = creator_for(source(3, 3, 1, 4), vec![0; 5], 3);
        assert_eq!(creator.descriptor().unwrap().frames_per_instance, 4);
    }

    #[test]
    fn one_bit_pixel_data_is_sliced_by_bits() {
        // 16 frames of 3x3 pixels, frame i has only pixel i % 9 set
        let mut data = vec![0_u8; (16 * 9_usize).div_ceil(8)];
        for i in 0..16 {
            let bit = i * 9 + i % 9;
            data[bit / 8] |= 1 << (bit % 8);
        }
        let mut creator = creator_for(source(3, 3, 1, 16), data.clone(), 8);
        let fragments: Vec<_> = creator.fragments().collect::<Result<_>>().unwrap();
        assert_eq!(fragments.len(), 2);

        let second = crate::frame::pixel_data_bytes(&fragments[1].dataset).unwrap();
        // 8 frames of 9 bits start at byte 9 of the source
        assert_eq!(&second[..9], &data[9..18]);
    }

    #[rstest]
    #[case("PALETTE COLOR")]
    #[case("YBR_FULL_422")]
    fn unsupported_photometric_interpretation(#[case] value: &str) {
        let mut obj = source(2, 2, 8, 1);
        obj.put(DataElement::new(
            tags::PHOTOMETRIC_INTERPRETATION,
            VR::CS,
            value,
        ));
        let mut creator = creator_for(obj, vec![0; 4], 1);
        let err = creator.descriptor().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedLayout);
    }

    #[test]
    fn unsupported_layouts() {
        let mut obj = source(2, 2, 8, 1);
        obj.put(DataElement::new(
            tags::PLANAR_CONFIGURATION,
            VR::US,
            PrimitiveValue::from(1_u16),
        ));
        let mut creator = creator_for(obj, vec![0; 4], 1);
        assert!(matches!(
            creator.descriptor(),
            Err(Error::UnsupportedPlanarConfiguration { value: 1, .. })
        ));

        let mut creator = creator_for(source(2, 2, 12, 1), vec![0; 6], 1);
        assert!(matches!(
            creator.descriptor(),
            Err(Error::UnsupportedBitsAllocated { value: 12, .. })
        ));

        let mut creator = creator_for(source(0, 2, 8, 1), vec![], 1);
        assert!(matches!(
            creator.descriptor(),
            Err(Error::InvalidImageDimensions { .. })
        ));

        let mut obj = source(2, 2, 8, 1);
        obj.put(DataElement::new(
            tags::SOP_CLASS_UID,
            VR::UI,
            OPHTHALMIC_OCT_BSCAN_VOLUME_ANALYSIS_STORAGE,
        ));
        let mut creator = creator_for(obj, vec![0; 4], 1);
        assert!(matches!(
            creator.descriptor(),
            Err(Error::UnsupportedSopClass { .. })
        ));
    }

    #[test]
    fn configuration_errors() {
        let mut creator = creator_for(source(2, 2, 8, 2), vec![0; 8], 0);
        assert!(matches!(
            creator.descriptor(),
            Err(Error::InvalidFramesPerInstance { .. })
        ));

        let mut obj = source(2, 2, 8, 2);
        obj.remove_element(tags::ROWS);
        let mut creator = creator_for(obj, vec![0; 8], 1);
        assert!(matches!(
            creator.descriptor(),
            Err(Error::MissingAttribute { name: "Rows", .. })
        ));
    }

    #[test]
    fn capacity_limits() {
        let pixel_data = vec![0_u8; 70_000];
        let mut creator = creator_for(source(1, 1, 8, 70_000), pixel_data, 1);
        let err = creator.descriptor().unwrap_err();
        assert!(matches!(err, Error::TooManyInstances { instances: 70_000, .. }));
        assert_eq!(err.kind(), ErrorKind::CapacityExceeded);

        // 65535 x 65535 x 8 bits x 3 samples in one frame is above the limit
        let mut obj = source(u16::MAX, u16::MAX, 8, 1);
        obj.put(DataElement::new(
            tags::SAMPLES_PER_PIXEL,
            VR::US,
            PrimitiveValue::from(3_u16),
        ));
        obj.put(DataElement::new(tags::PHOTOMETRIC_INTERPRETATION, VR::CS, "RGB"));
        let mut creator = creator_for(obj, vec![], 1);
        assert!(matches!(
            creator.descriptor(),
            Err(Error::FragmentTooLarge { .. })
        ));
    }

    #[test]
    fn consistency_errors() {
        let mut obj = source(2, 2, 8, 3);
        obj.put(DataElement::new(tags::NUMBER_OF_FRAMES, VR::IS, "4"));
        let mut creator = creator_for(obj, vec![0; 16], 1);
        assert!(matches!(
            creator.descriptor(),
            Err(Error::FrameCountMismatch {
                expected: 4,
                found: 3,
                ..
            })
        ));

        let mut creator = creator_for(source(2, 2, 8, 3), vec![0; 11], 1);
        let err = creator.descriptor().unwrap_err();
        assert!(matches!(err, Error::PixelDataTooShort { expected: 12, found: 11, .. }));
        assert_eq!(err.kind(), ErrorKind::Consistency);
        // still failing on further use
        assert_eq!(creator.number_of_instances(), 0);
    }

    #[test]
    fn fragments_carry_concatenation_attributes() {
        let pixel_data: Vec<u8> = (0..5_u8).flat_map(|i| [i; 4]).collect();
        let obj = source(2, 2, 8, 5);
        let mut creator = ConcatenationCreator::new();
        creator.configure(Cow::Borrowed(&obj), Cow::Borrowed(&pixel_data[..]), 2, "7");

        let fragments: Vec<_> = creator.fragments().collect::<Result<_>>().unwrap();
        assert!(creator.is_complete());
        assert_eq!(fragments.len(), 3);

        let uid = creator.descriptor().unwrap().concatenation_uid.clone();
        for (i, fragment) in fragments.iter().enumerate() {
            let d = &fragment.descriptor;
            let ds = &fragment.dataset;
            assert_eq!(d.in_concatenation_number as usize, i + 1);
            assert_eq!(d.frame_offset_number as usize, i * 2);
            assert_eq!(d.concatenation_uid, uid);
            assert_eq!(get_str(ds, tags::CONCATENATION_UID).as_deref(), Some(uid.as_str()));
            assert_eq!(get_str(ds, tags::INSTANCE_NUMBER).as_deref(), Some("7"));
            assert_eq!(
                get_str(ds, tags::SOP_INSTANCE_UID_OF_CONCATENATION_SOURCE).as_deref(),
                Some("1.2.3.4")
            );
            assert_eq!(
                get_str(ds, tags::SOP_INSTANCE_UID).as_deref(),
                Some(d.sop_instance_uid.as_str())
            );
            assert_eq!(get_u16(ds, tags::IN_CONCATENATION_TOTAL_NUMBER), Some(3));
            assert_eq!(
                get_u32(ds, tags::CONCATENATION_FRAME_OFFSET_NUMBER),
                Some(d.frame_offset_number)
            );
            assert_eq!(get_u32(ds, tags::NUMBER_OF_FRAMES), Some(d.number_of_frames));

            // per-frame items follow the frames
            let items = items(ds, tags::PER_FRAME_FUNCTIONAL_GROUPS_SEQUENCE).unwrap();
            assert_eq!(items.len() as u32, d.number_of_frames);
            for (item, frame) in items.iter().zip(d.frames()) {
                assert_eq!(get_u32(item, tags::DIMENSION_INDEX_VALUES), Some(frame + 1));
            }
        }
        assert_eq!(fragments[2].descriptor.number_of_frames, 1);
        let total: u32 = fragments.iter().map(|f| f.descriptor.number_of_frames).sum();
        assert_eq!(total, 5);

        let last = crate::frame::pixel_data_bytes(&fragments[2].dataset).unwrap();
        assert_eq!(last, vec![4; 4]);

        let err = creator.write_next_instance().unwrap_err();
        assert!(err.is_complete());
        assert_eq!(err.kind(), ErrorKind::Complete);
        assert_eq!(creator.fragments().count(), 0);

        // the source is left untouched
        assert!(obj.get(tags::CONCATENATION_UID).is_none());
    }

    #[test]
    fn reconfiguring_generates_a_new_uid() {
        let mut creator = creator_for(source(2, 2, 8, 1), vec![0; 4], 1);
        let first = creator.descriptor().unwrap().concatenation_uid.clone();
        creator.configure_with_defaults(Cow::Owned(source(2, 2, 8, 1)), Cow::Owned(vec![0; 4]));
        let second = creator.descriptor().unwrap();
        assert_ne!(first, second.concatenation_uid);
        assert_eq!(second.frames_per_instance, DEFAULT_FRAMES_PER_INSTANCE);
    }
}
