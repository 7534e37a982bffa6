//! Validation functions for configuration values.
//!
//! These only look at the configured values themselves; reachability and
//! writability of the backup root are checked by the destination resolver
//! when a session starts.

use crate::backup::file_ext::normalize_extension;

use sanitize_filename::{is_sanitized, sanitize};
use validator::ValidationError;

use std::path::{Path, PathBuf};

pub fn validate_extension_name<S: AsRef<str>>(ext: S) -> Result<(), ValidationError> {
    let ext = ext.as_ref();
    let Some(normalized) = normalize_extension(ext) else {
        return Err(ValidationError::new("InvalidExtension")
            .with_message(format!("Empty extension {ext:?}").into()));
    };
    if !is_sanitized(normalized.as_ref()) {
        return Err(ValidationError::new("InvalidExtension").with_message(
            format!(
                "Invalid extension {:?}, try sanitizing like {:?}",
                ext,
                sanitize(normalized.as_ref())
            )
            .into(),
        ));
    }
    // matched against the last extension of a file name only
    if normalized.contains('.') {
        return Err(ValidationError::new("InvalidExtension").with_message(
            format!(
                "Invalid extension {:?}, only the part after the last dot can match, e.g. {:?}",
                ext,
                normalized.rsplit('.').next().unwrap_or_default()
            )
            .into(),
        ));
    }

    Ok(())
}

pub fn validate_extensions(exts: &[String]) -> Result<(), ValidationError> {
    exts.iter().try_for_each(validate_extension_name)
}

pub fn validate_backup_root<P: AsRef<Path>>(root: P) -> Result<(), ValidationError> {
    if root.as_ref().as_os_str().is_empty() {
        return Err(ValidationError::new("InvalidDirectory")
            .with_message("backup_root must not be empty".into()));
    }

    Ok(())
}

/// A mirrored folder lands in `<date folder>/<folder name>`, so it needs a name.
pub fn validate_folder_has_name<P: AsRef<Path>>(folder: P) -> Result<(), ValidationError> {
    let folder = folder.as_ref();
    if folder.file_name().is_none() {
        return Err(ValidationError::new("InvalidFolder")
            .with_message(format!("{:?} has no folder name to mirror into", folder).into()));
    }

    Ok(())
}

pub fn validate_folders(folders: &[PathBuf]) -> Result<(), ValidationError> {
    folders.iter().try_for_each(validate_folder_has_name)
}
