//! Whole-folder backup.
//!
//! Each configured folder is mirrored to `<date folder>/<folder name>/`,
//! keeping relative paths. Unlike the extension engine a changed file is
//! overwritten in place, no versioned sibling is ever created.

use crate::backup::aggregator::{FolderCounts, FolderStatus, FolderSummary, ResultAggregator};
use crate::backup::copy_engine::copy_with_mtime;
use crate::backup::function_path;
use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use crate::backup::result_error::{WithFnName, WithMsg};

use function_name::named;
use getset::Getters;
use itertools::Itertools;
use rayon::prelude::*;
use rayon::ThreadPool;
use walkdir::WalkDir;

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum MirrorAction {
    Copied,
    Skipped,
}

#[derive(Clone, Debug, Getters)]
#[getset(get = "pub")]
pub struct FolderMirrorEngine {
    date_folder: Arc<Path>,
}

impl FolderMirrorEngine {
    pub fn new<P: Into<Arc<Path>>>(date_folder: P) -> Self {
        Self {
            date_folder: date_folder.into(),
        }
    }

    pub fn destination_root<P: AsRef<Path>>(&self, folder: P) -> PathBuf {
        match folder.as_ref().file_name() {
            Some(name) => self.date_folder.join(name),
            None => self.date_folder.to_path_buf(),
        }
    }

    /// Mirrors the folders one after the other. Every configured folder gets a
    /// summary; a missing one is warned about and recorded as failed.
    pub fn run(&self, folders: &[Arc<Path>], pool: &ThreadPool, aggregator: &ResultAggregator) {
        for folder in folders {
            match self.mirror_folder(folder, pool) {
                Ok(summary) => {
                    tracing::info!(
                        "Mirrored {:?}: {} copied, {} skipped, {} failed ({})",
                        summary.source_folder(),
                        summary.files_copied(),
                        summary.files_skipped(),
                        summary.files_failed(),
                        summary.status()
                    );
                    aggregator.record_folder(summary)
                }
                Err(e) => {
                    tracing::warn!("Skipping folder backup: {e}");
                    aggregator.record_folder(FolderSummary::new(
                        folder.clone(),
                        self.destination_root(folder),
                        FolderCounts::default(),
                        FolderStatus::Failed(e.root().to_string()),
                    ))
                }
            }
        }
    }

    /// Errors only when `folder` does not exist; every other failure is
    /// reflected in the returned summary.
    #[named]
    pub fn mirror_folder<P: AsRef<Path>>(&self, folder: P, pool: &ThreadPool) -> Result<FolderSummary> {
        let folder = folder.as_ref();
        if !folder.is_dir() {
            return Err(Error::source_folder_missing(folder).with_fn_name(function_path!()));
        }

        let dst_root = self.destination_root(folder);
        if let Err(e) = std::fs::create_dir_all(&dst_root) {
            tracing::error!("Cannot create {:?}: {e}", dst_root);
            return Ok(FolderSummary::new(
                folder.to_path_buf(),
                dst_root,
                FolderCounts::default(),
                FolderStatus::Failed(e.to_string()),
            ));
        }

        let (files, walk_errors): (Vec<_>, Vec<_>) = WalkDir::new(folder)
            .follow_links(true)
            .into_iter()
            .filter_map_ok(|de| de.file_type().is_file().then(|| de.into_path()))
            .partition_result();
        for e in &walk_errors {
            tracing::warn!("Cannot list entry under {:?}: {e}", folder);
        }

        let counts = pool.install(|| {
            files
                .par_iter()
                .map(|src| mirror_entry(src, folder, &dst_root))
                .fold(FolderCounts::default, |mut counts, res| {
                    match res {
                        Ok(MirrorAction::Copied) => counts.copied += 1,
                        Ok(MirrorAction::Skipped) => counts.skipped += 1,
                        Err(e) => {
                            tracing::warn!("{e}");
                            counts.failed += 1
                        }
                    }
                    counts
                })
                .reduce(FolderCounts::default, |a, b| FolderCounts {
                    copied: a.copied + b.copied,
                    skipped: a.skipped + b.skipped,
                    failed: a.failed + b.failed,
                })
        });
        let counts = FolderCounts {
            failed: counts.failed + walk_errors.len(),
            ..counts
        };

        Ok(FolderSummary::new(
            folder.to_path_buf(),
            dst_root,
            counts,
            FolderStatus::Success,
        ))
    }
}

#[named]
fn mirror_entry(src: &Path, src_root: &Path, dst_root: &Path) -> Result<MirrorAction> {
    let relative = src.strip_prefix(src_root)?;
    let dst = dst_root.join(relative);
    mirror_file(src, &dst)
        .with_msg(format!("Mirroring {src:?} to {dst:?} failed"))
        .with_fn_name(function_path!())
}

fn mirror_file(src: &Path, dst: &Path) -> Result<MirrorAction> {
    let src_md = std::fs::metadata(src)?;
    let src_modified = src_md.modified()?;

    if let Ok(dst_md) = std::fs::metadata(dst) {
        if dst_md.is_file() && dst_md.len() == src_md.len() && dst_md.modified()? == src_modified {
            tracing::trace!("{:?} unchanged, skipped", src);
            return Ok(MirrorAction::Skipped);
        }
    }

    if let Some(parent) = dst.parent() {
        std::fs::create_dir_all(parent)?;
    }
    copy_with_mtime(src, src_modified, File::create(dst)?)?;
    tracing::debug!("Mirrored {:?} -> {:?}", src, dst);
    Ok(MirrorAction::Copied)
}
