//! Where extension-based discovery looks for files.
//!
//! Host lookup of the well-known user folders stays behind
//! [`SourceRootProvider`]; the core only ever sees the verified, deduplicated
//! list produced by [`resolve_source_roots`].

use derive_more::From;
use directories::UserDirs;
use itertools::Itertools;

use std::path::{Path, PathBuf};
use std::sync::Arc;

pub trait SourceRootProvider {
    /// Candidate roots, not necessarily existing or distinct.
    fn candidate_roots(&self) -> Vec<PathBuf>;
}

/// Desktop, Documents, Downloads, Pictures, Music and Videos of the current user.
#[derive(Clone, Copy, Debug, Default)]
pub struct UserDirsProvider;

impl SourceRootProvider for UserDirsProvider {
    fn candidate_roots(&self) -> Vec<PathBuf> {
        let Some(dirs) = UserDirs::new() else {
            tracing::warn!("Cannot determine the home directory of the current user");
            return vec![];
        };

        [
            dirs.desktop_dir(),
            dirs.document_dir(),
            dirs.download_dir(),
            dirs.picture_dir(),
            dirs.audio_dir(),
            dirs.video_dir(),
        ]
        .into_iter()
        .flatten()
        .map(Path::to_path_buf)
        .collect_vec()
    }
}

/// Roots listed explicitly in the configuration.
#[derive(Clone, Debug, Default, From)]
pub struct FixedSourceRoots(Vec<PathBuf>);

impl SourceRootProvider for FixedSourceRoots {
    fn candidate_roots(&self) -> Vec<PathBuf> {
        self.0.clone()
    }
}

/// Keeps existing directories only, deduplicated by canonical path, in
/// provider order.
pub fn resolve_source_roots<S: SourceRootProvider + ?Sized>(provider: &S) -> Vec<Arc<Path>> {
    provider
        .candidate_roots()
        .into_iter()
        .filter(|p| {
            let is_dir = p.is_dir();
            if !is_dir {
                tracing::debug!("Ignoring source root {:?}, not a directory", p);
            }
            is_dir
        })
        .map(|p| std::fs::canonicalize(&p).unwrap_or(p))
        .unique()
        .map(Arc::<Path>::from)
        .collect_vec()
}
