//! Task error types.

use std::{io, path::PathBuf};

use sitekiln_pug::PugError;
use thiserror::Error;

use crate::lint::Language;

/// Errors produced by pipeline tasks.
#[derive(Debug, Error)]
pub enum TaskError {
    /// Lint found problems in production mode.
    #[error("{language} lint failed with {violations} problem(s)")]
    Lint {
        language: Language,
        violations: usize,
    },

    /// Template compilation failed.
    #[error("template error: {0}")]
    Template(#[from] PugError),

    /// Stylesheet compilation or post-processing failed.
    #[error("stylesheet error in {path}: {message}")]
    Stylesheet { path: PathBuf, message: String },

    /// Image decoding or encoding failed.
    #[error("image error in {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// Filesystem error.
    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Invalid glob pattern.
    #[error("invalid glob `{pattern}`: {source}")]
    Glob {
        pattern: String,
        #[source]
        source: globset::Error,
    },

    /// Development server failure.
    #[error("server error on {addr}: {source}")]
    Server {
        addr: String,
        #[source]
        source: io::Error,
    },

    /// File watcher failure.
    #[error("watch error: {0}")]
    Watch(#[from] notify::Error),

    /// A spawned task panicked or was cancelled.
    #[error("task join error: {0}")]
    Join(#[from] tokio::task::JoinError),

    /// A branch of a parallel task failed.
    #[error("'{task}' failed: {source}")]
    Failed {
        task: String,
        #[source]
        source: Box<TaskError>,
    },
}

impl TaskError {
    /// Build an IO error for `path`.
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Strip `Failed` wrappers down to the error that caused them.
    #[must_use]
    pub fn root(&self) -> &TaskError {
        match self {
            Self::Failed { source, .. } => source.root(),
            other => other,
        }
    }
}

/// Result type for task operations.
pub type Result<T> = std::result::Result<T, TaskError>;
