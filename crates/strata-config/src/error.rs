//! Error type for pipeline file operations.

use std::path::PathBuf;
use thiserror::Error;

/// Anything that can go wrong between a pipeline file on disk and a
/// [`Scheduler`](strata_core::Scheduler) ready to run.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The pipeline file could not be read.
    #[error("cannot read pipeline '{path}': {source}")]
    ReadFile {
        /// File that was requested.
        path: PathBuf,
        /// I/O cause.
        #[source]
        source: std::io::Error,
    },

    /// The pipeline file could not be written.
    #[error("cannot write pipeline '{path}': {source}")]
    WriteFile {
        /// Destination file.
        path: PathBuf,
        /// I/O cause.
        #[source]
        source: std::io::Error,
    },

    /// The parent directory of a saved pipeline could not be created.
    #[error("cannot create directory '{path}': {source}")]
    CreateDir {
        /// Directory that was being created.
        path: PathBuf,
        /// I/O cause.
        #[source]
        source: std::io::Error,
    },

    /// Malformed TOML, or a field of the wrong shape.
    #[error("invalid pipeline TOML: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// The pipeline could not be rendered as TOML.
    #[error("cannot render pipeline as TOML: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    /// Names, types or levels do not fit together.
    #[error("validation failed: {0}")]
    Validation(#[from] crate::validation::ValidationError),

    /// The engine rejected the pipeline while building or setting it up.
    #[error(transparent)]
    Engine(#[from] strata_core::Error),
}

impl ConfigError {
    /// Wraps a failed read of `path`.
    pub fn read_file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::ReadFile {
            path: path.into(),
            source,
        }
    }

    /// Wraps a failed write of `path`.
    pub fn write_file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::WriteFile {
            path: path.into(),
            source,
        }
    }

    /// Wraps a failed `create_dir_all(path)`.
    pub fn create_dir(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::CreateDir {
            path: path.into(),
            source,
        }
    }

    /// True for the variants caused by the file system.
    pub fn is_io(&self) -> bool {
        matches!(
            self,
            Self::ReadFile { .. } | Self::WriteFile { .. } | Self::CreateDir { .. }
        )
    }
}
