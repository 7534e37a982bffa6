//! Backup root validation and dated folder creation.
//!
//! Runs once before any discovery so an unusable destination fails the
//! session up front instead of in the middle of the copy phase.

use crate::backup::function_path;
use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use crate::backup::result_error::WithFnName;

use chrono::NaiveDate;
use function_name::named;
use getset::Getters;

use std::fs::File;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub static DATE_FOLDER_FORMAT: &str = "%Y-%m-%d";
static WRITE_PROBE_FILE_NAME: &str = ".dated_backup_write_probe";

pub trait DestinationResolver {
    /// Returns the created, writable folder for `date`.
    fn resolve(&self, date: NaiveDate) -> Result<PathBuf>;
}

/// Resolver for a local or mounted network backup root.
#[derive(Clone, Debug, Getters)]
#[getset(get = "pub")]
pub struct FsDestination {
    backup_root: Arc<Path>,
}

impl FsDestination {
    pub fn new<P: Into<Arc<Path>>>(backup_root: P) -> Self {
        Self {
            backup_root: backup_root.into(),
        }
    }

    pub fn date_folder(&self, date: NaiveDate) -> PathBuf {
        self.backup_root
            .join(date.format(DATE_FOLDER_FORMAT).to_string())
    }
}

impl DestinationResolver for FsDestination {
    #[named]
    fn resolve(&self, date: NaiveDate) -> Result<PathBuf> {
        ensure_dir(&self.backup_root).with_fn_name(function_path!())?;
        let date_folder = self.date_folder(date);
        ensure_dir(&date_folder).with_fn_name(function_path!())?;
        probe_writable(&date_folder).with_fn_name(function_path!())?;
        tracing::info!("Backup destination ready: {:?}", date_folder);
        Ok(date_folder)
    }
}

fn ensure_dir(dir: &Path) -> Result<()> {
    match std::fs::metadata(dir) {
        Ok(md) if md.is_dir() => Ok(()),
        Ok(_) => Err(Error::destination_inaccessible(dir, "not a directory")),
        Err(_) if !has_existing_ancestor(dir) => Err(Error::destination_unreachable(dir)),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            tracing::debug!("Creating {:?}", dir);
            std::fs::create_dir_all(dir).map_err(|e| classify_create_error(dir, e))
        }
        Err(e) => Err(Error::destination_inaccessible(dir, e.to_string())),
    }
}

/// A missing root whose every ancestor is missing too usually means an
/// unmounted drive or an unreachable share rather than a folder to create.
///
/// Only Windows roots can fail this: a UNC share (`\\server\share`) or a drive
/// letter that is not mapped. On Unix `/` always exists and relative paths end
/// in the current directory, so a missing mount point is created like any other
/// folder there.
fn has_existing_ancestor(dir: &Path) -> bool {
    dir.ancestors()
        .skip(1)
        .any(|a| a.as_os_str().is_empty() || a.exists())
}

fn classify_create_error(dir: &Path, e: std::io::Error) -> Error {
    match e.kind() {
        ErrorKind::PermissionDenied => Error::destination_inaccessible(dir, e.to_string()),
        _ => Error::destination_create_failed(e, dir),
    }
}

fn probe_writable(dir: &Path) -> Result<()> {
    let probe = dir.join(WRITE_PROBE_FILE_NAME);
    File::create(&probe)
        .and_then(|f| {
            drop(f);
            std::fs::remove_file(&probe)
        })
        .map_err(|e| Error::destination_inaccessible(dir, format!("write probe failed: {e}")))
}
