//! This crate splits DICOM multi-frame instances into concatenations
//! and merges concatenations back into a single multi-frame instance.
//!
//! A _concatenation_ is a group of SOP instances
//! sharing the same Concatenation UID,
//! each of them holding a consecutive range of frames
//! of one logical multi-frame instance.
//! This is used when the pixel data would exceed the length limit
//! of a single instance,
//! or when the instance would be impractical to transfer at once.
//!
//! - [`ConcatenationCreator`] consumes a source data set and its pixel data
//!   and produces the instances of a concatenation one at a time.
//! - [`ConcatenationLoader`] scans files for concatenation instances,
//!   groups them by Concatenation UID,
//!   and reconstructs the source data set and its frames.
//!
//! Only native (uncompressed) pixel data is supported,
//! with 1, 8 or 16 bits allocated.
//!
//! # Example
//!
//! ```no_run
//! # use std::borrow::Cow;
//! # use dicom_concatenation::{ConcatenationCreator, ConcatenationLoader};
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! # let source = dicom_object::InMemDicomObject::new_empty();
//! # let pixel_data: Vec<u8> = Vec::new();
//! let mut creator = ConcatenationCreator::new();
//! creator.configure(Cow::Borrowed(&source), Cow::Borrowed(&pixel_data[..]), 10, "1");
//! for i in 1..=creator.number_of_instances() {
//!     creator.write_next_instance_to_file(format!("out/part_{}.dcm", i))?;
//! }
//!
//! let mut loader = ConcatenationLoader::new();
//! loader.scan_directory("out", "*.dcm", false)?;
//! let uid = creator.descriptor()?.concatenation_uid.clone();
//! let merged = loader.load(&uid)?;
//! assert_eq!(merged.frames.len() as u32, creator.descriptor()?.total_frames);
//! # Ok(())
//! # }
//! ```
use snafu::{Backtrace, Snafu};
use std::path::PathBuf;

mod attributes;
pub mod creator;
pub mod frame;
pub mod loader;
pub mod uid;

pub use crate::creator::{
    ConcatenationCreator, ConcatenationDescriptor, Fragment, FragmentDescriptor, Fragments,
    DEFAULT_FRAMES_PER_INSTANCE,
};
pub use crate::loader::{
    ConcatenationLoader, FailureReason, LoadedConcatenation, ScanFailure, ScanGroup,
    ScannedInstance,
};

/// The maximum number of instances in a concatenation,
/// bounded by the 16-bit In-concatenation Number.
pub const MAX_INSTANCES: u32 = 65_535;

/// The maximum number of pixel data bytes in one concatenation instance.
pub const MAX_FRAGMENT_BYTES: u64 = 4_294_967_294;

/// An error which may occur when creating or loading a concatenation.
#[derive(Debug, Snafu)]
#[non_exhaustive]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    /// The creator has not been configured
    NotConfigured { backtrace: Backtrace },

    /// Frames per instance must be greater than zero
    InvalidFramesPerInstance { backtrace: Backtrace },

    /// A required attribute is missing from the source data set
    #[snafu(display("Missing attribute {}", name))]
    MissingAttribute {
        name: &'static str,
        backtrace: Backtrace,
    },

    /// An attribute of the source data set has an invalid value
    #[snafu(display("Invalid value for attribute {}", name))]
    InvalidAttribute {
        name: &'static str,
        backtrace: Backtrace,
    },

    #[snafu(display("Concatenations are not supported for SOP class {}", uid))]
    UnsupportedSopClass { uid: String, backtrace: Backtrace },

    #[snafu(display("Unsupported photometric interpretation `{}`", value))]
    UnsupportedPhotometricInterpretation { value: String, backtrace: Backtrace },

    #[snafu(display("Unsupported planar configuration {}", value))]
    UnsupportedPlanarConfiguration { value: u16, backtrace: Backtrace },

    #[snafu(display("Unsupported Bits Allocated {} (must be 1, 8 or 16)", value))]
    UnsupportedBitsAllocated { value: u16, backtrace: Backtrace },

    #[snafu(display(
        "Invalid image dimensions: {} rows, {} columns, {} bits allocated",
        rows,
        columns,
        bits_allocated
    ))]
    InvalidImageDimensions {
        rows: u16,
        columns: u16,
        bits_allocated: u16,
        backtrace: Backtrace,
    },

    /// Pixel data is encapsulated, only native pixel data is supported
    EncapsulatedPixelData { backtrace: Backtrace },

    #[snafu(display(
        "Concatenation would need {} instances (maximum is {})",
        instances,
        MAX_INSTANCES
    ))]
    TooManyInstances { instances: u64, backtrace: Backtrace },

    #[snafu(display(
        "Concatenation instance would hold {} bytes of pixel data (maximum is {})",
        bytes,
        MAX_FRAGMENT_BYTES
    ))]
    FragmentTooLarge { bytes: u64, backtrace: Backtrace },

    #[snafu(display(
        "Per-frame functional groups have {} items, but there are {} frames",
        found,
        expected
    ))]
    FrameCountMismatch {
        expected: u32,
        found: usize,
        backtrace: Backtrace,
    },

    #[snafu(display(
        "Pixel data has {} bytes, but {} bytes are needed for all frames",
        found,
        expected
    ))]
    PixelDataTooShort {
        expected: u64,
        found: usize,
        backtrace: Backtrace,
    },

    #[snafu(display(
        "No per-frame functional group items left for instance #{}",
        in_concatenation_number
    ))]
    PerFrameItemsExhausted {
        in_concatenation_number: u16,
        backtrace: Backtrace,
    },

    #[snafu(display("Missing pixel data in {}", path.display()))]
    MissingPixelData { path: PathBuf, backtrace: Backtrace },

    #[snafu(display("Concatenation {} not found", uid))]
    ConcatenationNotFound { uid: String, backtrace: Backtrace },

    #[snafu(display("Could not read file {}", path.display()))]
    ReadFile {
        path: PathBuf,
        #[snafu(source(from(dicom_object::ReadError, Box::from)))]
        source: Box<dicom_object::ReadError>,
    },

    #[snafu(display("Could not write file {}", path.display()))]
    WriteFile {
        path: PathBuf,
        #[snafu(source(from(dicom_object::WriteError, Box::from)))]
        source: Box<dicom_object::WriteError>,
    },

    /// Could not build the file meta group
    BuildMeta {
        #[snafu(source(from(dicom_object::WithMetaError, Box::from)))]
        source: Box<dicom_object::WithMetaError>,
    },

    #[snafu(display("Could not list directory {}", path.display()))]
    ListDirectory {
        path: PathBuf,
        source: walkdir::Error,
        backtrace: Backtrace,
    },

    /// All instances of the concatenation have been written
    ConcatenationComplete {},
}

/// The kind of an [`Error`], for callers deciding how to react.
#[derive(Debug, Copy, Clone, Eq, Hash, PartialEq)]
pub enum ErrorKind {
    /// The creator was not configured properly
    Configuration,
    /// The pixel data layout or SOP class cannot be handled
    UnsupportedLayout,
    /// A limit on the number of instances or bytes was exceeded
    CapacityExceeded,
    /// Frame counts or data sets are not consistent with each other
    Consistency,
    /// The requested concatenation is not known
    NotFound,
    /// A file could not be read or written
    Io,
    /// No more instances to write; this is not a failure
    Complete,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::NotConfigured { .. }
            | Error::InvalidFramesPerInstance { .. }
            | Error::MissingAttribute { .. }
            | Error::InvalidAttribute { .. } => ErrorKind::Configuration,
            Error::UnsupportedSopClass { .. }
            | Error::UnsupportedPhotometricInterpretation { .. }
            | Error::UnsupportedPlanarConfiguration { .. }
            | Error::UnsupportedBitsAllocated { .. }
            | Error::InvalidImageDimensions { .. }
            | Error::EncapsulatedPixelData { .. } => ErrorKind::UnsupportedLayout,
            Error::TooManyInstances { .. } | Error::FragmentTooLarge { .. } => {
                ErrorKind::CapacityExceeded
            }
            Error::FrameCountMismatch { .. }
            | Error::PixelDataTooShort { .. }
            | Error::PerFrameItemsExhausted { .. }
            | Error::MissingPixelData { .. } => ErrorKind::Consistency,
            Error::ConcatenationNotFound { .. } => ErrorKind::NotFound,
            Error::ReadFile { .. }
            | Error::WriteFile { .. }
            | Error::BuildMeta { .. }
            | Error::ListDirectory { .. } => ErrorKind::Io,
            Error::ConcatenationComplete { .. } => ErrorKind::Complete,
        }
    }

    /// Whether this is the signal that all instances have been written.
    pub fn is_complete(&self) -> bool {
        matches!(self, Error::ConcatenationComplete { .. })
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
