//! Error types for rollout-core.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise from release history operations.
#[derive(Debug, Error)]
pub enum HistoryError {
    /// Underlying I/O failure, annotated with the path that was touched.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Receipt JSON could not be read or written.
    #[error("release receipt JSON error at {path}: {source}")]
    Receipt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// `register` refused to reuse an existing release directory.
    #[error("release directory already exists at {path}")]
    ReleaseExists { path: PathBuf },

    /// A lookup by revision found nothing under `releases/`.
    #[error("no release for revision '{revision}' under {releases_dir}")]
    RevisionNotFound {
        revision: String,
        releases_dir: PathBuf,
    },
}

/// Errors from loading a deploy manifest.
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("I/O error reading manifest {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML parse error on load — includes file path and line context from serde_yaml.
    #[error("failed to parse manifest at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// A semantically invalid manifest (e.g. an empty `repository`).
    #[error("invalid manifest {path}: {message}")]
    Invalid { path: PathBuf, message: String },
}

/// Convenience constructor for [`HistoryError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> HistoryError {
    HistoryError::Io {
        path: path.into(),
        source,
    }
}
