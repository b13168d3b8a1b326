//! Splitting multi-frame data sets into files and loading them back.
use dicom_concatenation::{ConcatenationCreator, ConcatenationLoader, ErrorKind, FailureReason};
use dicom_core::value::DataSetSequence;
use dicom_core::{DataElement, PrimitiveValue, VR};
use dicom_dictionary_std::{tags, uids};
use dicom_fg::groups::{FrameContentGroup, PixelMeasuresGroup};
use dicom_fg::{FunctionalGroupType, FunctionalGroups};
use dicom_object::{FileMetaTableBuilder, InMemDicomObject, IMPLEMENTATION_CLASS_UID};
use rstest::rstest;
use std::borrow::Cow;
use std::path::Path;

const SOURCE_UID: &str = "1.2.826.0.1.3680043.9.7433.1.1";

fn base_dataset(rows: u16, columns: u16, bits_allocated: u16, frames: u32) -> InMemDicomObject {
    InMemDicomObject::from_element_iter([
        DataElement::new(tags::SOP_CLASS_UID, VR::UI, uids::ENHANCED_MR_IMAGE_STORAGE),
        DataElement::new(tags::SOP_INSTANCE_UID, VR::UI, SOURCE_UID),
        DataElement::new(tags::STUDY_INSTANCE_UID, VR::UI, "1.2.826.0.1.3680043.9.7433.2"),
        DataElement::new(tags::SERIES_INSTANCE_UID, VR::UI, "1.2.826.0.1.3680043.9.7433.3"),
        DataElement::new(tags::PATIENT_ID, VR::LO, "ANON-01"),
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
    ])
}

/// A multi-frame data set with shared pixel measures
/// and a frame content group per frame.
fn enhanced_dataset(rows: u16, columns: u16, bits_allocated: u16, frames: u32) -> InMemDicomObject {
    let mut obj = base_dataset(rows, columns, bits_allocated, frames);
    let mut groups = FunctionalGroups::new();
    let mut measures = PixelMeasuresGroup::new();
    measures.set_pixel_spacing(0.5, 0.5);
    groups.add_shared(&measures).unwrap();
    for frame in 0..frames {
        let mut content = FrameContentGroup::new();
        content.set_in_stack_position_number(frame + 1);
        content.set_dimension_index_values(vec![1, frame + 1]);
        groups.add_per_frame(frame as usize, &content).unwrap();
    }
    groups.write(&mut obj).unwrap();
    obj
}

fn file_meta(sop_instance_uid: &str) -> FileMetaTableBuilder {
    FileMetaTableBuilder::new()
        .transfer_syntax(uids::EXPLICIT_VR_LITTLE_ENDIAN)
        .media_storage_sop_class_uid(uids::ENHANCED_MR_IMAGE_STORAGE)
        .media_storage_sop_instance_uid(sop_instance_uid)
        .implementation_class_uid(IMPLEMENTATION_CLASS_UID)
}

fn split_to_dir(
    source: &InMemDicomObject,
    pixel_data: &[u8],
    frames_per_instance: u32,
    dir: &Path,
) -> String {
    let mut creator = ConcatenationCreator::new();
    creator.configure(
        Cow::Borrowed(source),
        Cow::Borrowed(pixel_data),
        frames_per_instance,
        "1",
    );
    let n = creator.number_of_instances();
    assert!(n > 0);
    for i in 1..=n {
        creator
            .write_next_instance_to_file(dir.join(format!("part_{}.dcm", i)))
            .unwrap();
    }
    assert!(creator.is_complete());
    creator.descriptor().unwrap().concatenation_uid.clone()
}

#[test]
fn split_and_merge_16_bit() {
    let dir = tempfile::tempdir().unwrap();
    // two 2x2 frames, 16 bits allocated
    let pixel_data: Vec<u8> = (1..=16).collect();
    let source = enhanced_dataset(2, 2, 16, 2);
    let uid = split_to_dir(&source, &pixel_data, 1, dir.path());

    let mut loader = ConcatenationLoader::new();
    loader.scan_directory(dir.path(), "*.dcm", false).unwrap();
    assert!(loader.failures().is_empty());
    assert_eq!(loader.groups().len(), 1);

    let group = &loader.groups()[&uid];
    assert_eq!(group.instances.len(), 2);
    assert_eq!(group.number_of_frames, 2);
    assert_eq!(group.in_concatenation_total_number, 2);
    assert_eq!(group.source_uid.as_deref(), Some(SOURCE_UID));

    let merged = loader.load(&uid).unwrap();
    assert_eq!(merged.frames, vec![pixel_data[..8].to_vec(), pixel_data[8..].to_vec()]);

    let ds = &merged.dataset;
    assert_eq!(
        ds.element(tags::SOP_INSTANCE_UID).unwrap().to_str().unwrap(),
        SOURCE_UID
    );
    assert_eq!(
        ds.element(tags::NUMBER_OF_FRAMES)
            .unwrap()
            .to_int::<u32>()
            .unwrap(),
        2
    );
    assert_eq!(
        ds.element(tags::PATIENT_ID).unwrap().to_str().unwrap().trim_end(),
        "ANON-01"
    );
    let content_date = ds.element(tags::CONTENT_DATE).unwrap().to_str().unwrap();
    assert_eq!(content_date.trim().len(), 8);
    let content_time = ds.element(tags::CONTENT_TIME).unwrap().to_str().unwrap();
    assert_eq!(content_time.trim().len(), 6);
    for tag in [
        tags::CONCATENATION_UID,
        tags::IN_CONCATENATION_NUMBER,
        tags::IN_CONCATENATION_TOTAL_NUMBER,
        tags::SOP_INSTANCE_UID_OF_CONCATENATION_SOURCE,
        tags::CONCATENATION_FRAME_OFFSET_NUMBER,
        tags::PIXEL_DATA,
    ] {
        assert!(ds.get(tag).is_none(), "{} should be removed", tag);
    }
}

#[test]
fn functional_groups_survive_the_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let frames = 5_u32;
    let pixel_data: Vec<u8> = (0..frames as u8).flat_map(|i| [i; 9]).collect();
    let source = enhanced_dataset(3, 3, 8, frames);
    let uid = split_to_dir(&source, &pixel_data, 2, dir.path());

    let mut loader = ConcatenationLoader::new();
    loader.scan_directory(dir.path(), "*", true).unwrap();
    let merged = loader.load(&uid).unwrap();
    assert_eq!(merged.frames.len(), 5);
    for (i, frame) in merged.frames.iter().enumerate() {
        assert_eq!(frame, &vec![i as u8; 9]);
    }

    let mut groups = FunctionalGroups::new();
    groups.read(&merged.dataset).unwrap();
    assert!(groups.check());
    assert_eq!(groups.number_of_frames(), 5);

    let (measures, per_frame) = groups.get(4, FunctionalGroupType::PixelMeasures).unwrap();
    assert!(!per_frame);
    assert_eq!(
        measures
            .downcast_ref::<PixelMeasuresGroup>()
            .unwrap()
            .pixel_spacing(),
        Some((0.5, 0.5))
    );
    for frame in 0..5 {
        let content = groups
            .per_frame(frame, FunctionalGroupType::FrameContent)
            .and_then(|g| g.downcast_ref::<FrameContentGroup>())
            .unwrap();
        assert_eq!(content.in_stack_position_number(), Some(frame as u32 + 1));
        assert_eq!(content.dimension_index_values(), &[1, frame as u32 + 1]);
    }
}

#[rstest]
#[case(10, 3)]
#[case(7, 7)]
#[case(1, 25)]
fn fragments_cover_all_frames(#[case] frames: u32, #[case] frames_per_instance: u32) {
    let pixel_data = vec![0_u8; 4 * frames as usize];
    let source = enhanced_dataset(2, 2, 8, frames);
    let mut creator = ConcatenationCreator::new();
    creator.configure(
        Cow::Borrowed(&source),
        Cow::Borrowed(&pixel_data[..]),
        frames_per_instance,
        "1",
    );
    let expected_instances = frames.div_ceil(frames_per_instance) as usize;
    assert_eq!(creator.number_of_instances(), expected_instances);

    let fragments: Vec<_> = creator
        .fragments()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(fragments.len(), expected_instances);

    let mut next_frame = 0;
    let mut sop_instance_uids = std::collections::HashSet::new();
    for (i, fragment) in fragments.iter().enumerate() {
        let d = &fragment.descriptor;
        assert_eq!(usize::from(d.in_concatenation_number), i + 1);
        assert_eq!(usize::from(d.in_concatenation_total_number), expected_instances);
        assert_eq!(d.frame_offset_number, next_frame);
        assert!(d.number_of_frames <= frames_per_instance);
        assert_ne!(d.sop_instance_uid, SOURCE_UID);
        assert!(sop_instance_uids.insert(d.sop_instance_uid.clone()));
        next_frame += d.number_of_frames;
    }
    assert_eq!(next_frame, frames);
}

#[test]
fn binary_frames_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    // 12 frames of 3x3 pixels, 9 bits each, frame i has pixel (i % 9) set
    let frames = 12_usize;
    let mut pixel_data = vec![0_u8; (frames * 9).div_ceil(8)];
    for i in 0..frames {
        let bit = i * 9 + i % 9;
        pixel_data[bit / 8] |= 1 << (bit % 8);
    }
    let source = enhanced_dataset(3, 3, 1, frames as u32);

    let mut creator = ConcatenationCreator::new();
    creator.configure(
        Cow::Borrowed(&source),
        Cow::Borrowed(&pixel_data[..]),
        5,
        "1",
    );
    // 5 frames of 9 bits are not byte aligned
    assert_eq!(creator.descriptor().unwrap().frames_per_instance, 8);
    assert_eq!(creator.number_of_instances(), 2);
    for i in 1..=2 {
        creator
            .write_next_instance_to_file(dir.path().join(format!("seg_{}.dcm", i)))
            .unwrap();
    }
    let uid = creator.descriptor().unwrap().concatenation_uid.clone();

    let mut loader = ConcatenationLoader::new();
    loader.scan_directory(dir.path(), "seg_?.dcm", false).unwrap();
    let merged = loader.load(&uid).unwrap();
    assert_eq!(merged.frames.len(), frames);
    for (i, frame) in merged.frames.iter().enumerate() {
        let mut expected = vec![0_u8; 2];
        let bit = i % 9;
        expected[bit / 8] |= 1 << (bit % 8);
        assert_eq!(frame, &expected, "frame #{}", i);
    }
    assert_eq!(
        dicom_concatenation::frame::pack_binary_frames(&merged.frames, 9),
        pixel_data
    );
}

#[test]
fn scanning_reports_failures() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("notes.dcm"), b"not a DICOM file").unwrap();

    let mut loader = ConcatenationLoader::new();
    loader.scan_directory(dir.path(), "*", true).unwrap();
    assert!(loader.groups().is_empty());
    assert_eq!(loader.failures().len(), 1);
    assert_eq!(loader.failures()[0].reason, FailureReason::NotDicom);

    // a regular multi-frame file is not part of a concatenation
    let plain = base_dataset(2, 2, 8, 1)
        .with_meta(file_meta(SOURCE_UID))
        .unwrap();
    let plain_path = dir.path().join("plain.dcm");
    plain.write_to_file(&plain_path).unwrap();
    loader.scan_files([&plain_path]);
    assert_eq!(loader.failures().len(), 2);
    assert_eq!(loader.failures()[1].reason, FailureReason::NotConcatenation);
    assert_eq!(
        loader.failures()[1].sop_instance_uid.as_deref(),
        Some(SOURCE_UID)
    );
}

#[test]
fn non_dicom_file_does_not_stop_the_scan() {
    let dir = tempfile::tempdir().unwrap();
    let pixel_data: Vec<u8> = (1..=8).collect();
    let source = enhanced_dataset(2, 2, 8, 2);
    let uid = split_to_dir(&source, &pixel_data, 1, dir.path());
    std::fs::write(dir.path().join("junk.dcm"), b"not a DICOM file").unwrap();

    let mut loader = ConcatenationLoader::new();
    loader.scan_directory(dir.path(), "*.dcm", false).unwrap();

    assert_eq!(loader.failures().len(), 1);
    assert_eq!(loader.failures()[0].reason, FailureReason::NotDicom);
    assert!(loader.failures()[0].path.ends_with("junk.dcm"));

    assert_eq!(loader.groups().len(), 1);
    let group = &loader.groups()[&uid];
    assert_eq!(group.instances.len(), 2);
    assert_eq!(group.number_of_frames, 2);

    let merged = loader.load(&uid).unwrap();
    assert_eq!(merged.frames, vec![pixel_data[..4].to_vec(), pixel_data[4..].to_vec()]);
}

#[test]
fn inconsistent_instance_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let source = enhanced_dataset(2, 2, 8, 2);
    let pixel_data = vec![7_u8; 8];
    let mut creator = ConcatenationCreator::new();
    creator.configure(
        Cow::Borrowed(&source),
        Cow::Borrowed(&pixel_data[..]),
        1,
        "1",
    );
    let first = creator
        .write_next_instance_to_file(dir.path().join("a.dcm"))
        .unwrap();

    // alter the second instance before writing it
    let mut fragment = creator.write_next_instance().unwrap();
    fragment.dataset.put(DataElement::new(
        tags::ROWS,
        VR::US,
        PrimitiveValue::from(4_u16),
    ));
    fragment
        .dataset
        .with_meta(file_meta(&fragment.descriptor.sop_instance_uid))
        .unwrap()
        .write_to_file(dir.path().join("b.dcm"))
        .unwrap();

    let mut loader = ConcatenationLoader::new();
    loader.scan_directory(dir.path(), "*.dcm", false).unwrap();
    assert_eq!(loader.failures().len(), 1);
    assert_eq!(loader.failures()[0].reason, FailureReason::Inconsistent);

    let group = &loader.groups()[&first.concatenation_uid];
    assert_eq!(group.instances.len(), 1);
    // the merge works with what was accepted
    let merged = loader.load(&first.concatenation_uid).unwrap();
    assert_eq!(merged.frames, vec![vec![7_u8; 4]]);
}

#[test]
fn two_concatenations_in_one_directory() {
    let dir = tempfile::tempdir().unwrap();
    let a = tempfile::tempdir_in(dir.path()).unwrap();
    let b = tempfile::tempdir_in(dir.path()).unwrap();
    let source = enhanced_dataset(2, 2, 8, 3);
    let pixel_data: Vec<u8> = (0..12).collect();
    let uid_a = split_to_dir(&source, &pixel_data, 2, a.path());
    let uid_b = split_to_dir(&source, &pixel_data, 1, b.path());
    assert_ne!(uid_a, uid_b);

    let mut loader = ConcatenationLoader::new();
    loader.scan_directory(dir.path(), "*.dcm", false).unwrap();
    assert!(loader.groups().is_empty());

    loader.scan_directory(dir.path(), "*.dcm", true).unwrap();
    assert_eq!(loader.groups().len(), 2);
    assert_eq!(loader.groups()[&uid_a].instances.len(), 2);
    assert_eq!(loader.groups()[&uid_b].instances.len(), 3);

    let merged_a = loader.load(&uid_a).unwrap();
    let merged_b = loader.load(&uid_b).unwrap();
    assert_eq!(merged_a.frames, merged_b.frames);
    assert_eq!(merged_a.frames.concat(), pixel_data);
}

#[test]
fn unknown_concatenation_leaves_output_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let mut loader = ConcatenationLoader::new();
    loader.scan_directory(dir.path(), "*", true).unwrap();
    assert!(loader.groups().is_empty());
    assert!(loader.failures().is_empty());

    let mut dataset = base_dataset(1, 1, 8, 1);
    let mut frames = Vec::new();
    let err = loader
        .load_into("1.2.3.4.5", &mut dataset, &mut frames)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert!(frames.is_empty());
    assert_eq!(dataset, base_dataset(1, 1, 8, 1));
}

#[test]
fn missing_directory_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let mut loader = ConcatenationLoader::new();
    let err = loader
        .scan_directory(dir.path().join("missing"), "*", true)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Io);
}

#[test]
fn sequence_of_per_frame_items_must_match() {
    let mut source = base_dataset(2, 2, 8, 2);
    source.put(DataElement::new(
        tags::PER_FRAME_FUNCTIONAL_GROUPS_SEQUENCE,
        VR::SQ,
        DataSetSequence::from(vec![InMemDicomObject::new_empty()]),
    ));
    let mut creator = ConcatenationCreator::new();
    creator.configure(Cow::Owned(source), Cow::Owned(vec![0; 8]), 1, "1");
    assert_eq!(creator.number_of_instances(), 0);
    let err = creator.write_next_instance().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Consistency);
    assert_eq!(creator.fragments().count(), 1);
}
