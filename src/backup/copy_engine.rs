//! Extension-based backup: flat copies into `<date folder>/<extension>/`.
//!
//! Destination names are claimed with [`File::create_new`], so two workers
//! racing for `report.pdf` can never both win it; the loser moves on to
//! `report_1.pdf`, `report_2.pdf`, ... An existing destination whose size and
//! modification time equal the source snapshot is left alone.

use crate::backup::aggregator::{CopyOutcome, ResultAggregator};
use crate::backup::discovery::FileDescriptor;
use crate::backup::file_ext::versioned_file_name;
use crate::backup::function_path;
use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use crate::backup::result_error::{WithFnName, WithMsg};

use function_name::named;
use getset::Getters;
use rayon::prelude::*;
use rayon::ThreadPool;

use std::fs::File;
use std::io::{BufWriter, ErrorKind, IntoInnerError};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

#[derive(Debug)]
enum Placement {
    Claimed(PathBuf, File),
    Identical(PathBuf),
}

#[derive(Clone, Debug, Getters)]
#[getset(get = "pub")]
pub struct ExtensionCopyEngine {
    date_folder: Arc<Path>,
}

impl ExtensionCopyEngine {
    pub fn new<P: Into<Arc<Path>>>(date_folder: P) -> Self {
        Self {
            date_folder: date_folder.into(),
        }
    }

    pub fn destination_dir(&self, descriptor: &FileDescriptor) -> PathBuf {
        self.date_folder.join(descriptor.extension().as_ref())
    }

    /// Copies, skips or versions a single file. Never fails as a whole: any
    /// error ends up as a `Failed` outcome.
    pub fn process(&self, descriptor: &FileDescriptor) -> CopyOutcome {
        match self.place_and_copy(descriptor) {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!("Backup of {:?} failed: {e}", descriptor.path());
                CopyOutcome::failed(descriptor, e.to_string())
            }
        }
    }

    /// Processes every descriptor on `pool`, returns after the last one is recorded.
    pub fn run(
        &self,
        descriptors: &[FileDescriptor],
        pool: &ThreadPool,
        aggregator: &ResultAggregator,
    ) {
        tracing::info!(
            "Copying {} files into {:?}",
            descriptors.len(),
            self.date_folder
        );
        pool.install(|| {
            descriptors
                .par_iter()
                .for_each(|d| aggregator.record_outcome(self.process(d)))
        });
        tracing::info!("Extension backup finished: {}", aggregator.counts());
    }

    #[named]
    fn place_and_copy(&self, descriptor: &FileDescriptor) -> Result<CopyOutcome> {
        let dir = self.destination_dir(descriptor);
        std::fs::create_dir_all(&dir)
            .map_err(Error::from)
            .with_msg(format!("Creating {dir:?} failed"))
            .with_fn_name(function_path!())?;

        match claim_destination(&dir, descriptor).with_fn_name(function_path!())? {
            Placement::Identical(dst) => {
                tracing::trace!("{:?} identical to {:?}, skipped", descriptor.path(), dst);
                Ok(CopyOutcome::skipped(descriptor, dst))
            }
            Placement::Claimed(dst, file) => {
                copy_with_mtime(descriptor.path(), descriptor.modified(), file)
                    .with_msg(format!("Copying {:?} to {:?} failed", descriptor.path(), dst))
                    .with_fn_name(function_path!())?;
                tracing::debug!("Copied {:?} -> {:?}", descriptor.path(), dst);
                Ok(CopyOutcome::success(descriptor, dst))
            }
        }
    }
}

fn claim_destination(dir: &Path, descriptor: &FileDescriptor) -> Result<Placement> {
    let mut n = 0;
    loop {
        let candidate = if n == 0 {
            dir.join(descriptor.name().as_ref())
        } else {
            dir.join(versioned_file_name(descriptor.name(), n))
        };

        match File::create_new(&candidate) {
            Ok(file) => return Ok(Placement::Claimed(candidate, file)),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                if is_identical(&candidate, descriptor)? {
                    return Ok(Placement::Identical(candidate));
                }
                tracing::trace!("{:?} taken by a different file", candidate);
            }
            Err(e) => {
                return Err(Error::from(e).with_msg(format!("Claiming {candidate:?} failed")));
            }
        }
        n += 1;
    }
}

/// Same size and modification time as the discovery snapshot.
pub fn is_identical<P: AsRef<Path>>(path: P, descriptor: &FileDescriptor) -> Result<bool> {
    let md = std::fs::metadata(path.as_ref())?;
    Ok(md.is_file() && md.len() == descriptor.size() && md.modified()? == descriptor.modified())
}

/// Streams `src` into `dst` and stamps `dst` with `modified`.
///
/// Shared by both engines; `dst` is already opened, either claimed exclusively
/// or truncated for an in-place overwrite.
pub fn copy_with_mtime<P: AsRef<Path>>(src: P, modified: SystemTime, dst: File) -> Result<()> {
    let mut src = File::open(src.as_ref())?;
    let mut writer = BufWriter::new(dst);
    std::io::copy(&mut src, &mut writer)?;
    let dst = writer.into_inner().map_err(IntoInnerError::into_error)?;
    dst.set_modified(modified)?;
    Ok(())
}
