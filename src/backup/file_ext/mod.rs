//! Extension handling shared by discovery and the copy engines.

use itertools::Itertools;
use std::path::Path;
use std::sync::Arc;

/// Lowercase extension without leading dots, `None` when nothing is left.
pub fn normalize_extension<S: AsRef<str>>(ext: S) -> Option<Arc<str>> {
    let ext = ext.as_ref().trim().trim_start_matches('.').to_lowercase();
    if ext.is_empty() {
        None
    } else {
        Some(ext.into())
    }
}

/// Normalizes a configured extension list, dropping empty and duplicate entries
/// while keeping the configured order.
pub fn normalize_extensions<I, S>(exts: I) -> Vec<Arc<str>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    exts.into_iter()
        .filter_map(normalize_extension)
        .unique()
        .collect_vec()
}

/// Lowercased extension of `path`, if it has one.
pub fn path_extension<P: AsRef<Path>>(path: P) -> Option<String> {
    path.as_ref()
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
}

/// `report.pdf` with `n = 2` becomes `report_2.pdf`; names without an
/// extension get the suffix appended.
pub fn versioned_file_name<S: AsRef<str>>(name: S, n: usize) -> String {
    let name = name.as_ref();
    let path = Path::new(name);
    match (path.file_stem(), path.extension()) {
        (Some(stem), Some(ext)) => format!(
            "{}_{}.{}",
            stem.to_string_lossy(),
            n,
            ext.to_string_lossy()
        ),
        _ => format!("{name}_{n}"),
    }
}
