//! A CLI tool for splitting DICOM multi-frame files into concatenations
//! and merging concatenations back into a single multi-frame file.
use clap::{Parser, Subcommand};
use dicom_concatenation::frame::{bits_per_frame, pack_binary_frames, pixel_data_bytes, put_pixel_data};
use dicom_concatenation::{ConcatenationCreator, ConcatenationLoader, DEFAULT_FRAMES_PER_INSTANCE};
use dicom_dictionary_std::{tags, uids};
use dicom_encoding::transfer_syntax::Codec;
use dicom_encoding::TransferSyntaxIndex;
use dicom_fg::FunctionalGroups;
use dicom_object::{open_file, FileMetaTableBuilder, InMemDicomObject, IMPLEMENTATION_CLASS_UID};
use dicom_transfer_syntax_registry::TransferSyntaxRegistry;
use snafu::prelude::*;
use snafu::{Report, Whatever};
use std::borrow::Cow;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn, Level};

/// Split DICOM multi-frame files into concatenations and merge them back
#[derive(Debug, Parser)]
#[command(version)]
struct App {
    #[command(subcommand)]
    command: Command,
    /// verbose mode
    #[arg(short = 'v', long = "verbose", global = true)]
    verbose: bool,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Split a multi-frame file into the instances of a concatenation
    Split {
        /// the multi-frame DICOM file to split
        file: PathBuf,
        /// the directory to write the instances to
        #[arg(short = 'o', long = "out-dir", default_value = ".")]
        out_dir: PathBuf,
        /// the maximum number of frames in each instance
        #[arg(short = 'n', long = "frames-per-instance", default_value_t = DEFAULT_FRAMES_PER_INSTANCE)]
        frames_per_instance: u32,
        /// the instance number given to all instances
        #[arg(long = "instance-number", default_value = "1")]
        instance_number: String,
        /// the file name prefix of each instance
        /// (default is the input file name without extension)
        #[arg(long = "prefix")]
        prefix: Option<String>,
    },
    /// Scan files for concatenations and print what was found
    Scan {
        /// the DICOM files or directories to scan
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        /// only scan files whose name matches this pattern (wildcards `*` and `?`)
        #[arg(short = 'p', long = "pattern", default_value = "*")]
        pattern: String,
        /// do not descend into subdirectories
        #[arg(long = "no-recursive")]
        no_recursive: bool,
        /// accept instances without SOP Instance UID of Concatenation Source
        #[arg(long = "ignore-missing-source-uid")]
        ignore_missing_source_uid: bool,
    },
    /// Merge a concatenation back into a single multi-frame file
    Merge {
        /// the directory holding the instances of the concatenation
        dir: PathBuf,
        /// the Concatenation UID to merge
        /// (can be omitted if only one concatenation is found)
        #[arg(short = 'u', long = "uid")]
        uid: Option<String>,
        /// path to the merged DICOM file
        #[arg(short = 'o', long = "out", required = true)]
        output: PathBuf,
        /// only scan files whose name matches this pattern (wildcards `*` and `?`)
        #[arg(short = 'p', long = "pattern", default_value = "*")]
        pattern: String,
        /// do not descend into subdirectories
        #[arg(long = "no-recursive")]
        no_recursive: bool,
        /// accept instances without SOP Instance UID of Concatenation Source
        #[arg(long = "ignore-missing-source-uid")]
        ignore_missing_source_uid: bool,
    },
}

#[derive(Debug, Snafu)]
enum Error {
    #[snafu(display("Could not open file {}", path.display()))]
    OpenFile {
        path: PathBuf,
        #[snafu(source(from(dicom_object::ReadError, Box::from)))]
        source: Box<dicom_object::ReadError>,
    },

    /// Unsupported file transfer syntax {uid}
    UnsupportedTransferSyntax { uid: String },

    /// Pixel data of transfer syntax {uid} is not native, decompress the file first
    EncapsulatedTransferSyntax { uid: String },

    #[snafu(display("File {} has no native pixel data", path.display()))]
    MissingPixelData { path: PathBuf },

    #[snafu(display("Could not create directory {}", path.display()))]
    CreateDirectory {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Could not process concatenation
    Concatenation {
        source: dicom_concatenation::Error,
    },

    /// No concatenation found
    NoConcatenation {},

    /// Found {count} concatenations, select one with --uid
    AmbiguousConcatenation { count: usize },

    /// Could not build the file meta group
    BuildMeta {
        #[snafu(source(from(dicom_object::WithMetaError, Box::from)))]
        source: Box<dicom_object::WithMetaError>,
    },

    #[snafu(display("Could not write file {}", path.display()))]
    WriteFile {
        path: PathBuf,
        #[snafu(source(from(dicom_object::WriteError, Box::from)))]
        source: Box<dicom_object::WriteError>,
    },
}

impl Error {
    /// The process exit code for this error.
    fn exit_code(&self) -> i32 {
        match self {
            Error::OpenFile { .. }
            | Error::UnsupportedTransferSyntax { .. }
            | Error::EncapsulatedTransferSyntax { .. }
            | Error::MissingPixelData { .. } => -1,
            Error::Concatenation { .. }
            | Error::NoConcatenation { .. }
            | Error::AmbiguousConcatenation { .. } => -2,
            Error::CreateDirectory { .. } | Error::BuildMeta { .. } | Error::WriteFile { .. } => -3,
        }
    }
}

fn main() {
    let app = App::parse();

    tracing::subscriber::set_global_default(
        tracing_subscriber::FmtSubscriber::builder()
            .with_max_level(if app.verbose { Level::DEBUG } else { Level::INFO })
            .finish(),
    )
    .whatever_context("Could not set up global logging subscriber")
    .unwrap_or_else(|e: Whatever| {
        eprintln!("[ERROR] {}", Report::from_error(e));
    });

    run(app).unwrap_or_else(|e| {
        let code = e.exit_code();
        error!("{}", Report::from_error(e));
        std::process::exit(code);
    });
}

fn run(app: App) -> Result<(), Error> {
    match app.command {
        Command::Split {
            file,
            out_dir,
            frames_per_instance,
            instance_number,
            prefix,
        } => split(&file, &out_dir, frames_per_instance, instance_number, prefix),
        Command::Scan {
            paths,
            pattern,
            no_recursive,
            ignore_missing_source_uid,
        } => {
            let mut loader = ConcatenationLoader::new();
            loader.set_ignore_missing_source_uid(ignore_missing_source_uid);
            scan(&mut loader, &paths, &pattern, !no_recursive)?;

            for group in loader.groups().values() {
                println!("{}", group);
            }
            if !loader.failures().is_empty() {
                println!("Failures:");
                for failure in loader.failures() {
                    println!("  {}", failure);
                }
            }
            Ok(())
        }
        Command::Merge {
            dir,
            uid,
            output,
            pattern,
            no_recursive,
            ignore_missing_source_uid,
        } => {
            let mut loader = ConcatenationLoader::new();
            loader.set_ignore_missing_source_uid(ignore_missing_source_uid);
            scan(&mut loader, &[dir], &pattern, !no_recursive)?;
            for failure in loader.failures() {
                debug!("Skipped {}", failure);
            }
            merge(&loader, uid, &output)
        }
    }
}

fn split(
    file: &Path,
    out_dir: &Path,
    frames_per_instance: u32,
    instance_number: String,
    prefix: Option<String>,
) -> Result<(), Error> {
    let obj = open_file(file).context(OpenFileSnafu { path: file })?;

    let ts_uid = obj.meta().transfer_syntax();
    let ts = TransferSyntaxRegistry
        .get(ts_uid)
        .context(UnsupportedTransferSyntaxSnafu { uid: ts_uid })?;
    ensure!(
        ts.is_codec_free() || matches!(ts.codec(), Codec::Dataset(_)),
        EncapsulatedTransferSyntaxSnafu { uid: ts_uid }
    );

    let pixel_data = pixel_data_bytes(&obj).context(MissingPixelDataSnafu { path: file })?;
    let source = obj.into_inner();

    let prefix = prefix.unwrap_or_else(|| {
        file.file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "instance".to_string())
    });
    std::fs::create_dir_all(out_dir).context(CreateDirectorySnafu { path: out_dir })?;

    let mut creator = ConcatenationCreator::new();
    creator.configure(
        Cow::Owned(source),
        Cow::Owned(pixel_data),
        frames_per_instance,
        instance_number,
    );
    let descriptor = creator.descriptor().context(ConcatenationSnafu)?;
    info!(
        "Splitting {} frames into {} instances of concatenation {}",
        descriptor.total_frames, descriptor.total_instances, descriptor.concatenation_uid
    );

    for i in 1.. {
        let path = out_dir.join(format!("{}_{}.dcm", prefix, i));
        match creator.write_next_instance_to_file(&path) {
            Ok(fragment) => {
                debug!(
                    "Frames {}..{} written to {}",
                    fragment.frames().start,
                    fragment.frames().end,
                    path.display()
                );
            }
            Err(e) if e.is_complete() => break,
            Err(e) => return Err(e).context(ConcatenationSnafu),
        }
    }
    Ok(())
}

fn scan(
    loader: &mut ConcatenationLoader,
    paths: &[PathBuf],
    pattern: &str,
    recursive: bool,
) -> Result<(), Error> {
    for path in paths {
        if path.is_dir() {
            loader
                .scan_directory(path, pattern, recursive)
                .context(ConcatenationSnafu)?;
        } else {
            loader.scan_files([path]);
        }
    }
    info!(
        "Found {} concatenation(s), {} file(s) not used",
        loader.groups().len(),
        loader.failures().len()
    );
    Ok(())
}

fn merge(loader: &ConcatenationLoader, uid: Option<String>, output: &Path) -> Result<(), Error> {
    let uid = match uid {
        Some(uid) => uid,
        None => {
            let mut uids = loader.groups().keys();
            match (uids.next(), uids.len()) {
                (Some(uid), 0) => uid.clone(),
                (None, _) => return NoConcatenationSnafu.fail(),
                (Some(_), more) => {
                    return AmbiguousConcatenationSnafu { count: more + 1 }.fail();
                }
            }
        }
    };

    let loaded = loader.load(&uid).context(ConcatenationSnafu)?;
    let mut dataset = loaded.dataset;
    let frames = loaded.frames;

    let mut groups = FunctionalGroups::new();
    match groups.read(&dataset) {
        Ok(()) => {
            if !groups.check() {
                warn!("Functional groups of the merged data set are not consistent");
            }
        }
        Err(e) => debug!("No functional groups checked: {}", e),
    }

    let group = loader
        .groups()
        .get(&uid)
        .context(NoConcatenationSnafu)?;
    let pixel_data = if group.bits_allocated == 1 {
        let bits = bits_per_frame(
            group.rows,
            group.columns,
            group.bits_allocated,
            group.samples_per_pixel,
        )
        .context(ConcatenationSnafu)?;
        pack_binary_frames(&frames, bits)
    } else {
        frames.concat()
    };
    put_pixel_data(&mut dataset, pixel_data, group.bits_allocated);

    write_file(dataset, &group.sop_class_uid, output)?;
    info!(
        "Merged {} frames of concatenation {} into {}",
        frames.len(),
        uid,
        output.display()
    );
    Ok(())
}

fn write_file(dataset: InMemDicomObject, sop_class_uid: &str, path: &Path) -> Result<(), Error> {
    let sop_instance_uid = dataset
        .element(tags::SOP_INSTANCE_UID)
        .ok()
        .and_then(|e| e.to_str().ok())
        .map(|s| s.trim_end_matches('\0').to_string())
        .unwrap_or_default();
    let meta = FileMetaTableBuilder::new()
        .transfer_syntax(uids::EXPLICIT_VR_LITTLE_ENDIAN)
        .media_storage_sop_class_uid(sop_class_uid)
        .media_storage_sop_instance_uid(sop_instance_uid)
        .implementation_class_uid(IMPLEMENTATION_CLASS_UID);
    dataset
        .with_meta(meta)
        .context(BuildMetaSnafu)?
        .write_to_file(path)
        .context(WriteFileSnafu { path })
}

#[cfg(test)]
mod tests {
    use crate::App;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        App::command().debug_assert();
    }
}
