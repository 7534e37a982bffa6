//! One backup run: discovery, extension copies, folder mirrors, in that order.

use crate::backup::aggregator::{BackupReport, ResultAggregator};
use crate::backup::copy_engine::ExtensionCopyEngine;
use crate::backup::discovery::{discover, work_items};
use crate::backup::function_path;
use crate::backup::log_writer::LogFiles;
use crate::backup::mirror::FolderMirrorEngine;
use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use crate::backup::result_error::WithFnName;

use bon::Builder;
use function_name::named;
use getset::{CopyGetters, Getters};
use itertools::Itertools;
use rayon::{ThreadPool, ThreadPoolBuilder};

use std::path::Path;
use std::sync::Arc;

#[derive(Clone, Debug, Builder, Getters, CopyGetters)]
pub struct BackupSession {
    #[builder(into)]
    #[getset(get = "pub")]
    backup_root: Arc<Path>,
    #[builder(into)]
    #[getset(get = "pub")]
    date_folder: Arc<Path>,
    #[getset(get = "pub")]
    source_roots: Vec<Arc<Path>>,
    #[getset(get = "pub")]
    extensions: Vec<Arc<str>>,
    #[builder(default)]
    #[getset(get = "pub")]
    folders: Vec<Arc<Path>>,
    #[builder(default = 1)]
    #[getset(get_copy = "pub")]
    max_parallelism: usize,
}

impl BackupSession {
    pub fn build_pool(&self) -> Result<ThreadPool> {
        Ok(ThreadPoolBuilder::new()
            .num_threads(self.max_parallelism)
            .thread_name(|i| format!("backup-worker-{i}"))
            .build()?)
    }

    /// Discovery runs to completion before the first copy starts, and the
    /// report is only taken once both copy phases have returned.
    #[named]
    pub fn execute(&self, pool: &ThreadPool) -> Result<BackupReport> {
        let items = work_items(&self.source_roots, &self.extensions);
        let (descriptors, diagnostics) = discover(&items, pool).into_parts();
        if descriptors.is_empty() {
            return Err(Error::empty_discovery(
                self.source_roots.iter().map(|r| r.to_path_buf()).collect_vec(),
                self.extensions.iter().map(|e| e.to_string()).collect_vec(),
            )
            .with_fn_name(function_path!()));
        }

        let aggregator = ResultAggregator::new();
        ExtensionCopyEngine::new(self.date_folder.clone()).run(&descriptors, pool, &aggregator);
        if !self.folders.is_empty() {
            FolderMirrorEngine::new(self.date_folder.clone()).run(&self.folders, pool, &aggregator);
        }

        let report = aggregator.into_report(diagnostics);
        debug_assert_eq!(report.counts().total(), descriptors.len());
        Ok(report)
    }
}

/// Everything a finished run produced.
#[derive(Clone, Debug, Getters)]
#[getset(get = "pub")]
pub struct SessionSummary {
    session: BackupSession,
    report: BackupReport,
    logs: LogFiles,
}

impl SessionSummary {
    pub fn new(session: BackupSession, report: BackupReport, logs: LogFiles) -> Self {
        Self {
            session,
            report,
            logs,
        }
    }
}
