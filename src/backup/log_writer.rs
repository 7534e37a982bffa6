//! CSV logs of a finished session.

use crate::backup::aggregator::{BackupReport, CopyOutcome, FolderSummary};
use crate::backup::function_path;
use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::{convert_error_vec, Result};
use crate::backup::result_error::{WithFnName, WithMsg};
use crate::backup::session::BackupSession;

use bon::Builder;
use chrono::{DateTime, Local};
use function_name::named;
use getset::Getters;
use itertools::Itertools;

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub static LOG_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
pub static FAILED_DESTINATION: &str = "FAILED";

pub static FILE_LOG_HEADERS: [&str; 8] = [
    "SourcePath",
    "DestinationPath",
    "FileName",
    "Extension",
    "SizeKB",
    "OriginalDate",
    "BackupDate",
    "Status",
];

pub static FOLDER_LOG_HEADERS: [&str; 7] = [
    "SourceFolder",
    "DestinationFolder",
    "FilesCopied",
    "FilesSkipped",
    "FilesFailed",
    "BackupDate",
    "Status",
];

#[derive(Clone, Debug, PartialEq, Eq, Getters)]
#[getset(get = "pub")]
pub struct LogFiles {
    file_log: PathBuf,
    folder_log: Option<PathBuf>,
}

pub trait LogWriter {
    /// Persists `report`. The folder log is only produced when the session
    /// has whole folders configured.
    fn write_logs(&self, session: &BackupSession, report: &BackupReport) -> Result<LogFiles>;
}

#[derive(Clone, Debug, Builder, Getters)]
#[getset(get = "pub")]
pub struct CsvLogWriter {
    /// Defaults to the session's date folder.
    #[builder(into)]
    log_dir: Option<Arc<Path>>,
    /// Distinguishes the logs of several runs on the same day.
    #[builder(into, default = Local::now().format("%H%M%S").to_string())]
    stamp: String,
}

impl CsvLogWriter {
    fn dir<'a>(&'a self, session: &'a BackupSession) -> &'a Path {
        self.log_dir
            .as_deref()
            .unwrap_or(session.date_folder().as_ref())
    }

    pub fn file_log_path(&self, session: &BackupSession) -> PathBuf {
        self.dir(session)
            .join(format!("backup_log_{}.csv", self.stamp))
    }

    pub fn folder_log_path(&self, session: &BackupSession) -> PathBuf {
        self.dir(session)
            .join(format!("folder_backup_log_{}.csv", self.stamp))
    }
}

impl LogWriter for CsvLogWriter {
    /// Both logs are attempted even when the first one fails.
    #[named]
    fn write_logs(&self, session: &BackupSession, report: &BackupReport) -> Result<LogFiles> {
        let file_log = self.file_log_path(session);
        let file_res = create_log(&file_log, |f| write_file_log(report.outcomes(), f));

        let folder_log = (!session.folders().is_empty()).then(|| self.folder_log_path(session));
        let folder_res = folder_log.as_ref().map_or(Ok(()), |path| {
            create_log(path, |f| write_folder_log(report.folders(), f))
        });

        convert_error_vec([file_res, folder_res].into_iter().filter_map(|r| r.err()).collect_vec())
            .with_fn_name(function_path!())?;

        Ok(LogFiles {
            file_log,
            folder_log,
        })
    }
}

fn create_log<F: FnOnce(File) -> Result<()>>(path: &Path, write: F) -> Result<()> {
    File::create(path)
        .map_err(Error::from)
        .and_then(write)
        .with_msg(format!("Writing {path:?} failed"))?;
    tracing::info!("Log written to {:?}", path);
    Ok(())
}

fn format_time(dt: &DateTime<Local>) -> String {
    dt.format(LOG_TIME_FORMAT).to_string()
}

fn size_kb(bytes: u64) -> String {
    format!("{:.2}", bytes as f64 / 1024.0)
}

fn file_record(outcome: &CopyOutcome) -> [String; 8] {
    [
        outcome.source_path().display().to_string(),
        outcome
            .destination_path()
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| FAILED_DESTINATION.to_string()),
        outcome.file_name().to_string(),
        outcome.extension().to_string(),
        size_kb(*outcome.size_bytes()),
        format_time(outcome.original_modified()),
        format_time(outcome.completed_at()),
        outcome.status().to_string(),
    ]
}

fn folder_record(summary: &FolderSummary) -> [String; 7] {
    [
        summary.source_folder().display().to_string(),
        summary.destination_folder().display().to_string(),
        summary.files_copied().to_string(),
        summary.files_skipped().to_string(),
        summary.files_failed().to_string(),
        format_time(summary.completed_at()),
        summary.status().to_string(),
    ]
}

pub fn write_file_log<W: Write>(outcomes: &[CopyOutcome], writer: W) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(FILE_LOG_HEADERS)?;
    for outcome in outcomes {
        wtr.write_record(file_record(outcome))?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_folder_log<W: Write>(folders: &[FolderSummary], writer: W) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(FOLDER_LOG_HEADERS)?;
    for summary in folders {
        wtr.write_record(folder_record(summary))?;
    }
    wtr.flush()?;
    Ok(())
}
