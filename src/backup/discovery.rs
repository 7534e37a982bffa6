//! Source enumeration.
//!
//! Every `(source root, extension)` pair becomes a [`WorkItem`]. Work items are
//! walked in parallel on the session pool and each one lazily yields
//! `Result<FileDescriptor>`; the errors of that sequence are the subtrees that
//! could not be listed, collected as [`DiscoveryDiagnostic`]s instead of
//! aborting the enumeration.

use crate::backup::file_ext::path_extension;
use crate::backup::function_path;
use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use crate::backup::result_error::WithFnName;

use bon::Builder;
use derive_more::Display;
use dyn_iter::{DynIter, IntoDynIterator};
use function_name::named;
use getset::{CopyGetters, Getters};
use itertools::{Either, Itertools};
use rayon::prelude::*;
use rayon::ThreadPool;
use walkdir::{DirEntry, WalkDir};

use std::path::Path;
use std::sync::Arc;
use std::time::SystemTime;

/// Snapshot of a matched source file taken at discovery time.
///
/// The copy decision only ever looks at this snapshot, the source is not
/// re-read before comparing against the destination.
#[derive(Clone, Debug, PartialEq, Eq, Builder, Getters, CopyGetters)]
pub struct FileDescriptor {
    #[builder(into)]
    #[getset(get = "pub")]
    path: Arc<Path>,
    #[builder(into)]
    #[getset(get = "pub")]
    name: Arc<str>,
    #[builder(into)]
    #[getset(get = "pub")]
    extension: Arc<str>,
    #[getset(get_copy = "pub")]
    size: u64,
    #[getset(get_copy = "pub")]
    modified: SystemTime,
}

impl FileDescriptor {
    fn from_dir_entry(de: &DirEntry, extension: Arc<str>) -> Result<Self> {
        let md = de.metadata()?;
        Ok(Self {
            path: de.path().into(),
            name: de.file_name().to_string_lossy().into(),
            extension,
            size: md.len(),
            modified: md.modified()?,
        })
    }
}

/// One discovery task: every file under `root` whose extension is `extension`.
#[derive(Clone, Debug, Display, PartialEq, Eq, Hash, Getters)]
#[display("{root:?} *.{extension}")]
#[getset(get = "pub")]
pub struct WorkItem {
    root: Arc<Path>,
    extension: Arc<str>,
}

impl WorkItem {
    pub fn new<P: Into<Arc<Path>>, S: Into<Arc<str>>>(root: P, extension: S) -> Self {
        Self {
            root: root.into(),
            extension: extension.into(),
        }
    }

    /// Lazily walks `root`, yielding matching files and listing failures.
    #[named]
    pub fn descriptors<'a>(&self) -> DynIter<'a, Result<FileDescriptor>> {
        let extension = self.extension.clone();
        WalkDir::new(self.root.as_ref())
            .follow_links(true)
            .into_iter()
            .filter_map(move |res| match res {
                Ok(de) => process_dir_entry(de, &extension),
                Err(e) => Some(Err(Error::from(e))),
            })
            .map(|res| res.with_fn_name(function_path!()))
            .into_dyn_iter()
    }
}

fn process_dir_entry(de: DirEntry, extension: &Arc<str>) -> Option<Result<FileDescriptor>> {
    if !de.file_type().is_file() {
        return None;
    }
    match path_extension(de.path()) {
        Some(ext) if ext == extension.as_ref() => {
            tracing::trace!("Matched {:?}", de.path());
            Some(FileDescriptor::from_dir_entry(&de, extension.clone()))
        }
        _ => None,
    }
}

/// A subtree that could not be listed while walking `item`.
#[derive(Clone, Debug, Display, Getters)]
#[display("{item}: {message}")]
#[getset(get = "pub")]
pub struct DiscoveryDiagnostic {
    item: WorkItem,
    message: String,
}

#[derive(Debug, Default, Getters)]
#[getset(get = "pub")]
pub struct Discovery {
    descriptors: Vec<FileDescriptor>,
    diagnostics: Vec<DiscoveryDiagnostic>,
}

impl Discovery {
    pub fn into_parts(self) -> (Vec<FileDescriptor>, Vec<DiscoveryDiagnostic>) {
        (self.descriptors, self.diagnostics)
    }
}

/// Cross product of roots and extensions.
pub fn work_items(roots: &[Arc<Path>], extensions: &[Arc<str>]) -> Vec<WorkItem> {
    roots
        .iter()
        .cartesian_product(extensions.iter())
        .map(|(root, ext)| WorkItem::new(root.clone(), ext.clone()))
        .collect_vec()
}

/// Runs every work item on `pool` and returns once all of them finished.
pub fn discover(items: &[WorkItem], pool: &ThreadPool) -> Discovery {
    tracing::info!("Discovering files for {} work items", items.len());

    let per_item: Vec<(Vec<FileDescriptor>, Vec<DiscoveryDiagnostic>)> = pool.install(|| {
        items
            .par_iter()
            .map(|item| {
                let (found, diagnostics): (Vec<_>, Vec<_>) =
                    item.descriptors().partition_map(|res| match res {
                        Ok(d) => Either::Left(d),
                        Err(e) => {
                            tracing::warn!("Skipping unreadable entry under {item}: {e}");
                            Either::Right(DiscoveryDiagnostic {
                                item: item.clone(),
                                message: e.root().to_string(),
                            })
                        }
                    });
                tracing::debug!("{item}: {} files", found.len());
                (found, diagnostics)
            })
            .collect()
    });

    let (descriptors, diagnostics): (Vec<_>, Vec<_>) = per_item.into_iter().unzip();
    let discovery = Discovery {
        descriptors: descriptors.into_iter().flatten().collect_vec(),
        diagnostics: diagnostics.into_iter().flatten().collect_vec(),
    };
    tracing::info!(
        "Discovered {} files ({} listing errors)",
        discovery.descriptors.len(),
        discovery.diagnostics.len()
    );
    discovery
}
