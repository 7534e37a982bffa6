use crate::backup::result_error::{WithFnName, WithMsg};
use itertools::Itertools;
use std::fmt::Debug;
use std::path::PathBuf;
use thiserror::Error;
use thiserror_ext::Construct;

#[derive(Error, Debug, Construct)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    WalkDir(#[from] walkdir::Error),
    #[error(transparent)]
    StripPrefix(#[from] std::path::StripPrefixError),
    #[error(transparent)]
    ValidationError(#[from] validator::ValidationErrors),
    #[error(transparent)]
    ThreadPoolBuildError(#[from] rayon::ThreadPoolBuildError),
    #[error(transparent)]
    SerdeYml(#[from] serde_yml::Error),
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error("Backup destination {path:?} is unreachable")]
    DestinationUnreachable { path: PathBuf },
    #[error("Backup destination {path:?} is not accessible: {reason}")]
    DestinationInaccessible { path: PathBuf, reason: String },
    #[error("Cannot create backup destination {path:?}: {source}")]
    DestinationCreateFailed {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("No existing source root directory found")]
    NoSourceRoots,
    #[error("No file with extension {extensions:?} found under {roots:?}")]
    EmptyDiscovery {
        roots: Vec<PathBuf>,
        extensions: Vec<String>,
    },
    #[error("Source folder {path:?} does not exist")]
    SourceFolderMissing { path: PathBuf },
    #[error("{}:\n{}", msg, indent::indent_all_with("  ", error.to_string()))]
    WithMsg { msg: String, error: Box<Error> },
    #[error("{} failed:\n{}", fn_name, indent::indent_all_with("  ", error.to_string()))]
    WithFnName { fn_name: String, error: Box<Error> },
    #[error("{}", itertools::join(.0, "\n\n"))]
    LotsOfError(Vec<Error>),
}

impl<S: Into<String>> WithFnName<S> for Error {
    fn with_fn_name(self, fn_name: S) -> Self {
        Self::WithFnName {
            fn_name: fn_name.into(),
            error: Box::new(self),
        }
    }
}

impl<S: Into<String>> WithMsg<S> for Error {
    fn with_msg(self, msg: S) -> Self {
        Self::WithMsg {
            msg: msg.into(),
            error: Box::new(self),
        }
    }
}

impl From<Vec<Error>> for Error {
    fn from(errors: Vec<Error>) -> Self {
        if errors.is_empty() {
            panic!("Should not create lots of errors when error is empty")
        }
        Self::LotsOfError(errors.into_iter().flat_map(Error::into_iter).collect_vec())
    }
}

impl Error {
    pub fn into_iter(self) -> Box<dyn Iterator<Item = Error>> {
        match self {
            Error::LotsOfError(v) => Box::new(v.into_iter().flat_map(Error::into_iter)),
            e => Box::new(std::iter::once(e)),
        }
    }

    /// Strips `WithMsg`/`WithFnName` wrappers and returns the error they carry.
    pub fn root(&self) -> &Error {
        match self {
            Error::WithMsg { error, .. } | Error::WithFnName { error, .. } => error.root(),
            e => e,
        }
    }

    /// Whether this error aborts a whole session, as opposed to a single file or folder.
    pub fn is_fatal(&self) -> bool {
        match self.root() {
            Error::DestinationUnreachable { .. }
            | Error::DestinationInaccessible { .. }
            | Error::DestinationCreateFailed { .. }
            | Error::NoSourceRoots
            | Error::EmptyDiscovery { .. }
            | Error::ValidationError(_)
            | Error::SerdeYml(_)
            | Error::ThreadPoolBuildError(_) => true,
            Error::LotsOfError(v) => v.iter().any(Error::is_fatal),
            _ => false,
        }
    }
}
