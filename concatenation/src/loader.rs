//! Scanning for concatenation instances and merging them.
//!
//! See [`ConcatenationLoader`].

use crate::attributes::{get_str, get_u16, get_u32, put_str, CONCATENATION_ATTRIBUTES};
use crate::frame::{bits_per_frame, bytes_per_frame, extract_binary_frames, split_frames};
use crate::uid::new_uid;
use crate::{
    ConcatenationNotFoundSnafu, EncapsulatedPixelDataSnafu, ListDirectorySnafu,
    MissingAttributeSnafu, MissingPixelDataSnafu, PixelDataTooShortSnafu, ReadFileSnafu, Result,
};
use chrono::Local;
use dicom_core::value::{DataSetSequence, PrimitiveValue, Value};
use dicom_core::{DataElement, VR};
use dicom_dictionary_std::tags;
use dicom_object::{InMemDicomObject, OpenFileOptions};
use snafu::{ensure, OptionExt, ResultExt};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Why a scanned file was not added to a concatenation.
#[derive(Debug, Copy, Clone, Eq, Hash, PartialEq)]
pub enum FailureReason {
    /// The file could not be read as a DICOM file
    NotDicom,
    /// The file has no Concatenation UID
    NotConcatenation,
    /// The file is the first of its concatenation
    /// but lacks attributes needed to describe it
    MissingData,
    /// The file does not agree with the instances
    /// already found for its concatenation
    Inconsistent,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FailureReason::NotDicom => "No DICOM file",
            FailureReason::NotConcatenation => "File is not part of Concatenation",
            FailureReason::MissingData => "File does not provide all required Concatenation Data",
            FailureReason::Inconsistent => "Concatenation Data inconsistent to rest of Concatenation",
        };
        f.write_str(s)
    }
}

/// A file which could not be added to any concatenation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanFailure {
    pub path: PathBuf,
    pub reason: FailureReason,
    /// The SOP Instance UID of the file, if it could be read
    pub sop_instance_uid: Option<String>,
}

impl fmt::Display for ScanFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path.display(), self.reason)?;
        if let Some(uid) = &self.sop_instance_uid {
            write!(f, " (SOP Instance UID {})", uid)?;
        }
        Ok(())
    }
}

/// One file found for a concatenation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedInstance {
    pub path: PathBuf,
    pub sop_instance_uid: String,
    pub number_of_frames: u32,
    pub in_concatenation_number: u16,
}

/// The description of a concatenation found by scanning,
/// taken from its first file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanGroup {
    pub concatenation_uid: String,
    pub source_uid: Option<String>,
    pub sop_class_uid: String,
    pub study_instance_uid: String,
    pub series_instance_uid: String,
    pub patient_id: Option<String>,
    pub bits_allocated: u16,
    pub rows: u16,
    pub columns: u16,
    pub samples_per_pixel: u16,
    /// The declared number of instances (0 if no file declares it)
    pub in_concatenation_total_number: u16,
    /// The sum of the frames of all instances found
    pub number_of_frames: u32,
    /// The instances found, ordered by In-concatenation Number
    pub instances: Vec<ScannedInstance>,
}

impl fmt::Display for ScanGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let opt = |s: &Option<String>| s.clone().unwrap_or_default();
        writeln!(f, "Concatenation UID*           : {}", self.concatenation_uid)?;
        writeln!(f, "  SOP Class UID*             : {}", self.sop_class_uid)?;
        writeln!(f, "  Concatenation Source UID*  : {}", opt(&self.source_uid))?;
        writeln!(f, "  Number of Frames (computed): {}", self.number_of_frames)?;
        writeln!(
            f,
            "  In-conc. Total Number      : {}",
            self.in_concatenation_total_number
        )?;
        writeln!(f, "  Patient ID                 : {}", opt(&self.patient_id))?;
        writeln!(f, "  Study Instance UID*        : {}", self.study_instance_uid)?;
        writeln!(f, "  Series Instance UID*       : {}", self.series_instance_uid)?;
        writeln!(f, "  Bits Allocated*            : {}", self.bits_allocated)?;
        writeln!(f, "  Rows*                      : {}", self.rows)?;
        writeln!(f, "  Columns*                   : {}", self.columns)?;
        writeln!(f, "  Samples per Pixel          : {}", self.samples_per_pixel)?;
        writeln!(f, "  Files:")?;
        for (i, instance) in self.instances.iter().enumerate() {
            writeln!(f, "    {}. {}", i + 1, instance.path.display())?;
            writeln!(f, "    SOP Instance UID: {}", instance.sop_instance_uid)?;
            writeln!(f, "    Number of Frames: {}", instance.number_of_frames)?;
            writeln!(
                f,
                "    In-Concatenation Number: {}",
                instance.in_concatenation_number
            )?;
        }
        Ok(())
    }
}

impl ScanGroup {
    /// Whether the attributes of another file agree with this group.
    ///
    /// Patient ID and source UID may be missing on either side,
    /// and a total number of 0 stands for an unknown value.
    fn accepts(&self, other: &ScanGroup) -> bool {
        fn empty_or_equal(a: &Option<String>, b: &Option<String>) -> bool {
            a.is_none() || b.is_none() || a == b
        }

        self.bits_allocated == other.bits_allocated
            && self.columns == other.columns
            && self.rows == other.rows
            && self.sop_class_uid == other.sop_class_uid
            && self.series_instance_uid == other.series_instance_uid
            && self.study_instance_uid == other.study_instance_uid
            && empty_or_equal(&self.patient_id, &other.patient_id)
            && empty_or_equal(&self.source_uid, &other.source_uid)
            && (self.in_concatenation_total_number == 0
                || other.in_concatenation_total_number == 0
                || self.in_concatenation_total_number == other.in_concatenation_total_number)
            && self.concatenation_uid == other.concatenation_uid
    }

    /// Insert an instance after all instances
    /// with a lower or equal In-concatenation Number.
    fn insert(&mut self, instance: ScannedInstance, in_concatenation_total_number: u16) {
        let pos = self
            .instances
            .iter()
            .position(|i| i.in_concatenation_number > instance.in_concatenation_number)
            .unwrap_or(self.instances.len());
        self.number_of_frames = self
            .number_of_frames
            .saturating_add(instance.number_of_frames);
        if self.in_concatenation_total_number == 0 {
            self.in_concatenation_total_number = in_concatenation_total_number;
        }
        self.instances.insert(pos, instance);
    }
}

/// A concatenation merged into one data set.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedConcatenation {
    /// The reconstructed source data set, without pixel data
    pub dataset: InMemDicomObject,
    /// The frames of all instances, in order
    pub frames: Vec<Vec<u8>>,
}

/// Finds concatenation instances among files
/// and merges them back into one multi-frame data set.
///
/// Scanning only reads the attributes before the pixel data.
/// Files which cannot be used are recorded in [`failures`](Self::failures)
/// instead of aborting the scan.
#[derive(Debug, Default)]
pub struct ConcatenationLoader {
    ignore_missing_source_uid: bool,
    groups: BTreeMap<String, ScanGroup>,
    failures: Vec<ScanFailure>,
}

impl ConcatenationLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept concatenations whose instances do not declare
    /// the SOP Instance UID of the concatenation source.
    ///
    /// A new SOP Instance UID is then created when loading.
    pub fn set_ignore_missing_source_uid(&mut self, ignore: bool) {
        self.ignore_missing_source_uid = ignore;
    }

    pub fn ignore_missing_source_uid(&self) -> bool {
        self.ignore_missing_source_uid
    }

    /// The concatenations found so far, by Concatenation UID.
    pub fn groups(&self) -> &BTreeMap<String, ScanGroup> {
        &self.groups
    }

    /// The files which could not be added to a concatenation.
    pub fn failures(&self) -> &[ScanFailure] {
        &self.failures
    }

    /// Scan the files under a directory whose name matches `pattern`.
    ///
    /// The pattern may contain the wildcards `*` and `?`.
    /// Unless `recursive` is set, only the directory itself is listed.
    pub fn scan_directory(
        &mut self,
        dir: impl AsRef<Path>,
        pattern: &str,
        recursive: bool,
    ) -> Result<()> {
        let dir = dir.as_ref();
        let mut walker = WalkDir::new(dir).min_depth(1).sort_by_file_name();
        if !recursive {
            walker = walker.max_depth(1);
        }

        let mut files = Vec::new();
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) if e.depth() == 0 => {
                    return Err(e).context(ListDirectorySnafu { path: dir });
                }
                Err(e) => {
                    warn!("Skipping directory entry: {}", e);
                    continue;
                }
            };
            if entry.file_type().is_file()
                && wildcard_match(pattern, &entry.file_name().to_string_lossy())
            {
                files.push(entry.into_path());
            }
        }
        debug!("Found {} files for concatenation scanning", files.len());
        self.scan_files(files);
        Ok(())
    }

    /// Scan the given files for concatenation instances.
    pub fn scan_files<I, P>(&mut self, files: I)
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        for (i, path) in files.into_iter().enumerate() {
            let path = path.as_ref();
            debug!("Scanning file #{}: {}", i + 1, path.display());
            match OpenFileOptions::new()
                .read_until(tags::PIXEL_DATA)
                .open_file(path)
            {
                Ok(obj) => self.scan_dataset(path, &obj),
                Err(e) => {
                    debug!("Could not read {}: {}", path.display(), e);
                    self.failures.push(ScanFailure {
                        path: path.to_path_buf(),
                        reason: FailureReason::NotDicom,
                        sop_instance_uid: None,
                    });
                }
            }
        }
        self.check_totals();
    }

    /// Add a data set read from `path` to its concatenation,
    /// or record why it cannot be added.
    fn scan_dataset(&mut self, path: &Path, obj: &InMemDicomObject) {
        let sop_instance_uid = get_str(obj, tags::SOP_INSTANCE_UID);
        if let Err(reason) = self.insert_dataset(path, obj) {
            self.failures.push(ScanFailure {
                path: path.to_path_buf(),
                reason,
                sop_instance_uid,
            });
        }
    }

    fn insert_dataset(
        &mut self,
        path: &Path,
        obj: &InMemDicomObject,
    ) -> std::result::Result<(), FailureReason> {
        let concatenation_uid =
            get_str(obj, tags::CONCATENATION_UID).ok_or(FailureReason::NotConcatenation)?;

        let info = ScanGroup {
            concatenation_uid: concatenation_uid.clone(),
            source_uid: get_str(obj, tags::SOP_INSTANCE_UID_OF_CONCATENATION_SOURCE),
            sop_class_uid: get_str(obj, tags::SOP_CLASS_UID).unwrap_or_default(),
            study_instance_uid: get_str(obj, tags::STUDY_INSTANCE_UID).unwrap_or_default(),
            series_instance_uid: get_str(obj, tags::SERIES_INSTANCE_UID).unwrap_or_default(),
            patient_id: get_str(obj, tags::PATIENT_ID),
            bits_allocated: get_u16(obj, tags::BITS_ALLOCATED).unwrap_or(0),
            rows: get_u16(obj, tags::ROWS).unwrap_or(0),
            columns: get_u16(obj, tags::COLUMNS).unwrap_or(0),
            samples_per_pixel: get_u16(obj, tags::SAMPLES_PER_PIXEL).unwrap_or(1).max(1),
            in_concatenation_total_number: get_u16(obj, tags::IN_CONCATENATION_TOTAL_NUMBER)
                .unwrap_or(0),
            number_of_frames: 0,
            instances: Vec::new(),
        };
        let instance = ScannedInstance {
            path: path.to_path_buf(),
            sop_instance_uid: get_str(obj, tags::SOP_INSTANCE_UID).unwrap_or_default(),
            number_of_frames: get_u32(obj, tags::NUMBER_OF_FRAMES).unwrap_or(0),
            in_concatenation_number: get_u16(obj, tags::IN_CONCATENATION_NUMBER).unwrap_or(0),
        };

        match self.groups.get_mut(&concatenation_uid) {
            Some(group) => {
                if !group.accepts(&info) {
                    return Err(FailureReason::Inconsistent);
                }
                group.insert(instance, info.in_concatenation_total_number);
            }
            None => {
                let complete = (info.source_uid.is_some() || self.ignore_missing_source_uid)
                    && !info.study_instance_uid.is_empty()
                    && !info.series_instance_uid.is_empty()
                    && !info.sop_class_uid.is_empty()
                    && info.bits_allocated != 0
                    && info.rows != 0
                    && info.columns != 0
                    && instance.in_concatenation_number != 0
                    && !instance.sop_instance_uid.is_empty()
                    && instance.number_of_frames != 0;
                if !complete {
                    return Err(FailureReason::MissingData);
                }
                let mut group = info;
                let total = group.in_concatenation_total_number;
                group.insert(instance, total);
                self.groups.insert(concatenation_uid, group);
            }
        }
        Ok(())
    }

    fn check_totals(&self) {
        for group in self.groups.values() {
            let declared = usize::from(group.in_concatenation_total_number);
            if declared > 0 && declared != group.instances.len() {
                warn!(
                    "In-Concatenation Total Number ({}) does not match number of instances ({}) found for concatenation {}",
                    declared,
                    group.instances.len(),
                    group.concatenation_uid
                );
            }
        }
    }

    /// Merge the instances of a scanned concatenation.
    pub fn load(&self, concatenation_uid: &str) -> Result<LoadedConcatenation> {
        let mut dataset = InMemDicomObject::new_empty();
        let mut frames = Vec::new();
        self.load_into(concatenation_uid, &mut dataset, &mut frames)?;
        Ok(LoadedConcatenation { dataset, frames })
    }

    /// Merge the instances of a scanned concatenation
    /// into the given data set, appending its frames to `frames`.
    ///
    /// The content of `dataset` is replaced.
    /// On error, neither `dataset` nor `frames` is modified.
    pub fn load_into(
        &self,
        concatenation_uid: &str,
        dataset: &mut InMemDicomObject,
        frames: &mut Vec<Vec<u8>>,
    ) -> Result<()> {
        let group = self
            .groups
            .get(concatenation_uid)
            .context(ConcatenationNotFoundSnafu {
                uid: concatenation_uid,
            })?;
        debug!(
            "Loading concatenation {} from {} instances",
            concatenation_uid,
            group.instances.len()
        );

        let mut merged: Option<InMemDicomObject> = None;
        let mut per_frame_items = Vec::new();
        let mut loaded_frames = Vec::with_capacity(group.number_of_frames as usize);

        for instance in &group.instances {
            let path = &instance.path;
            let mut obj = dicom_object::open_file(path)
                .context(ReadFileSnafu { path })?
                .into_inner();

            let fragment_frames = extract_frames(&obj, group, instance)?;
            loaded_frames.extend(fragment_frames);

            if let Some(items) = obj
                .take_element(tags::PER_FRAME_FUNCTIONAL_GROUPS_SEQUENCE)
                .ok()
                .and_then(|e| e.into_value().into_items())
            {
                per_frame_items.extend(items.into_vec());
            }

            if merged.is_none() {
                merged = Some(self.prepare_template(obj, group)?);
            }
        }

        let mut merged = merged.context(ConcatenationNotFoundSnafu {
            uid: concatenation_uid,
        })?;
        merged.put(DataElement::new(
            tags::PER_FRAME_FUNCTIONAL_GROUPS_SEQUENCE,
            VR::SQ,
            DataSetSequence::from(per_frame_items),
        ));
        insert_destination_attributes(&mut merged, group);

        *dataset = merged;
        frames.extend(loaded_frames);
        Ok(())
    }

    /// Turn the first instance into the base of the merged data set.
    fn prepare_template(
        &self,
        mut obj: InMemDicomObject,
        group: &ScanGroup,
    ) -> Result<InMemDicomObject> {
        ensure!(
            group.source_uid.is_some() || self.ignore_missing_source_uid,
            MissingAttributeSnafu {
                name: "SOPInstanceUIDOfConcatenationSource",
            }
        );
        for tag in CONCATENATION_ATTRIBUTES {
            obj.remove_element(tag);
        }
        obj.remove_element(tags::PIXEL_DATA);
        Ok(obj)
    }
}

/// Extract the frames of one instance.
fn extract_frames(
    obj: &InMemDicomObject,
    group: &ScanGroup,
    instance: &ScannedInstance,
) -> Result<Vec<Vec<u8>>> {
    let path = &instance.path;
    let element = obj
        .get(tags::PIXEL_DATA)
        .context(MissingPixelDataSnafu { path })?;
    ensure!(
        !matches!(element.value(), Value::PixelSequence(_)),
        EncapsulatedPixelDataSnafu
    );
    let pixel_data = crate::frame::pixel_data_bytes(obj).context(MissingPixelDataSnafu { path })?;

    let frames = if group.bits_allocated == 1 {
        let bits = bits_per_frame(
            group.rows,
            group.columns,
            group.bits_allocated,
            group.samples_per_pixel,
        )?;
        extract_binary_frames(&pixel_data, instance.number_of_frames, bits).context(
            PixelDataTooShortSnafu {
                expected: (bits * u64::from(instance.number_of_frames)).div_ceil(8),
                found: pixel_data.len(),
            },
        )?
    } else {
        let size = bytes_per_frame(
            group.rows,
            group.columns,
            group.bits_allocated,
            group.samples_per_pixel,
        )?;
        split_frames(&pixel_data, instance.number_of_frames, size).context(
            PixelDataTooShortSnafu {
                expected: size as u64 * u64::from(instance.number_of_frames),
                found: pixel_data.len(),
            },
        )?
    };
    Ok(frames)
}

/// Stamp the identity of the merged instance.
fn insert_destination_attributes(obj: &mut InMemDicomObject, group: &ScanGroup) {
    let uid = match &group.source_uid {
        Some(uid) => uid.clone(),
        None => {
            let uid = new_uid();
            warn!(
                "SOP Instance UID of Concatenation Source (0020,0242) not set, created new SOP Instance UID {}",
                uid
            );
            uid
        }
    };
    put_str(obj, tags::SOP_INSTANCE_UID, VR::UI, uid);
    put_str(
        obj,
        tags::NUMBER_OF_FRAMES,
        VR::IS,
        group.number_of_frames.to_string(),
    );
    let now = Local::now();
    obj.put(DataElement::new(
        tags::CONTENT_DATE,
        VR::DA,
        PrimitiveValue::from(now.format("%Y%m%d").to_string()),
    ));
    obj.put(DataElement::new(
        tags::CONTENT_TIME,
        VR::TM,
        PrimitiveValue::from(now.format("%H%M%S").to_string()),
    ));
}

/// Match a file name against a pattern with `*` and `?` wildcards.
fn wildcard_match(pattern: &str, name: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let name: Vec<char> = name.chars().collect();
    let (mut p, mut n) = (0, 0);
    // position of the last `*` and the name position it was tried at
    let mut backtrack: Option<(usize, usize)> = None;

    while n < name.len() {
        match pattern.get(p) {
            Some('*') => {
                backtrack = Some((p, n));
                p += 1;
            }
            Some(c) if *c == '?' || *c == name[n] => {
                p += 1;
                n += 1;
            }
            _ => match backtrack {
                Some((star, at)) => {
                    p = star + 1;
                    n = at + 1;
                    backtrack = Some((star, at + 1));
                }
                None => return false,
            },
        }
    }
    pattern[p..].iter().all(|c| *c == '*')
}
