//! Per-file and per-folder result records and the thread-safe collector the
//! copy workers append to.

use crate::backup::discovery::{DiscoveryDiagnostic, FileDescriptor};

use chrono::{DateTime, Local};
use derive_more::Display;
use getset::{CopyGetters, Getters};

use std::cmp::Ordering as CmpOrdering;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

#[derive(Clone, Debug, PartialEq, Eq, Display)]
pub enum CopyStatus {
    #[display("Success")]
    Success,
    #[display("Skipped (identical)")]
    SkippedIdentical,
    #[display("Failed: {_0}")]
    Failed(String),
}

impl CopyStatus {
    fn rank(&self) -> u8 {
        match self {
            CopyStatus::Success => 0,
            CopyStatus::SkippedIdentical => 1,
            CopyStatus::Failed(_) => 2,
        }
    }
}

/// What happened to one discovered file.
#[derive(Clone, Debug, Getters)]
#[getset(get = "pub")]
pub struct CopyOutcome {
    source_path: Arc<Path>,
    /// `None` when the file could not be placed anywhere.
    destination_path: Option<Arc<Path>>,
    file_name: Arc<str>,
    extension: Arc<str>,
    size_bytes: u64,
    original_modified: DateTime<Local>,
    completed_at: DateTime<Local>,
    status: CopyStatus,
}

impl CopyOutcome {
    fn new(
        descriptor: &FileDescriptor,
        destination_path: Option<Arc<Path>>,
        status: CopyStatus,
    ) -> Self {
        Self {
            source_path: descriptor.path().clone(),
            destination_path,
            file_name: descriptor.name().clone(),
            extension: descriptor.extension().clone(),
            size_bytes: descriptor.size(),
            original_modified: descriptor.modified().into(),
            completed_at: Local::now(),
            status,
        }
    }

    pub fn success<P: Into<Arc<Path>>>(descriptor: &FileDescriptor, dst: P) -> Self {
        Self::new(descriptor, Some(dst.into()), CopyStatus::Success)
    }

    pub fn skipped<P: Into<Arc<Path>>>(descriptor: &FileDescriptor, dst: P) -> Self {
        Self::new(descriptor, Some(dst.into()), CopyStatus::SkippedIdentical)
    }

    pub fn failed<S: Into<String>>(descriptor: &FileDescriptor, reason: S) -> Self {
        Self::new(descriptor, None, CopyStatus::Failed(reason.into()))
    }

    fn report_order(&self, other: &Self) -> CmpOrdering {
        self.status
            .rank()
            .cmp(&other.status.rank())
            .then_with(|| self.extension.cmp(&other.extension))
            .then_with(|| self.file_name.cmp(&other.file_name))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Display)]
pub enum FolderStatus {
    #[display("Success")]
    Success,
    #[display("Failed: {_0}")]
    Failed(String),
}

/// Outcome of mirroring one configured folder.
#[derive(Clone, Debug, Getters, CopyGetters)]
pub struct FolderSummary {
    #[getset(get = "pub")]
    source_folder: Arc<Path>,
    #[getset(get = "pub")]
    destination_folder: Arc<Path>,
    #[getset(get_copy = "pub")]
    files_copied: usize,
    #[getset(get_copy = "pub")]
    files_skipped: usize,
    #[getset(get_copy = "pub")]
    files_failed: usize,
    #[getset(get = "pub")]
    completed_at: DateTime<Local>,
    #[getset(get = "pub")]
    status: FolderStatus,
}

impl FolderSummary {
    pub fn new<P1: Into<Arc<Path>>, P2: Into<Arc<Path>>>(
        source_folder: P1,
        destination_folder: P2,
        counts: FolderCounts,
        status: FolderStatus,
    ) -> Self {
        Self {
            source_folder: source_folder.into(),
            destination_folder: destination_folder.into(),
            files_copied: counts.copied,
            files_skipped: counts.skipped,
            files_failed: counts.failed,
            completed_at: Local::now(),
            status,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FolderCounts {
    pub copied: usize,
    pub skipped: usize,
    pub failed: usize,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Display)]
#[display("{success} copied, {skipped} skipped, {failed} failed")]
pub struct Counts {
    pub success: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl Counts {
    pub fn total(&self) -> usize {
        self.success + self.skipped + self.failed
    }
}

/// Append-only collector shared by reference with every copy worker.
///
/// The counters are bumped in [`ResultAggregator::record_outcome`] together
/// with the push, so they always agree with the record list. A report can only
/// be taken by consuming the aggregator, which the borrow checker only allows
/// once every worker holding a reference has returned.
#[derive(Debug, Default)]
pub struct ResultAggregator {
    outcomes: Mutex<Vec<CopyOutcome>>,
    folders: Mutex<Vec<FolderSummary>>,
    success_count: AtomicUsize,
    skip_count: AtomicUsize,
    fail_count: AtomicUsize,
}

impl ResultAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_outcome(&self, outcome: CopyOutcome) {
        let counter = match outcome.status {
            CopyStatus::Success => &self.success_count,
            CopyStatus::SkippedIdentical => &self.skip_count,
            CopyStatus::Failed(_) => &self.fail_count,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        self.outcomes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(outcome);
    }

    pub fn record_folder(&self, summary: FolderSummary) {
        self.folders
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(summary);
    }

    /// Running counters, usable while workers are still appending.
    pub fn counts(&self) -> Counts {
        Counts {
            success: self.success_count.load(Ordering::Relaxed),
            skipped: self.skip_count.load(Ordering::Relaxed),
            failed: self.fail_count.load(Ordering::Relaxed),
        }
    }

    pub fn into_report(self, diagnostics: Vec<DiscoveryDiagnostic>) -> BackupReport {
        let counts = self.counts();
        let mut outcomes = self
            .outcomes
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner);
        outcomes.sort_by(CopyOutcome::report_order);
        let folders = self
            .folders
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner);

        BackupReport {
            outcomes,
            folders,
            counts,
            diagnostics,
        }
    }
}

/// Final snapshot of a session, outcomes sorted by status, extension and name.
#[derive(Clone, Debug, Getters, CopyGetters)]
pub struct BackupReport {
    #[getset(get = "pub")]
    outcomes: Vec<CopyOutcome>,
    #[getset(get = "pub")]
    folders: Vec<FolderSummary>,
    #[getset(get_copy = "pub")]
    counts: Counts,
    #[getset(get = "pub")]
    diagnostics: Vec<DiscoveryDiagnostic>,
}
