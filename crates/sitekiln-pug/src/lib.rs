//! Sitekiln Pug Library
//!
//! Compiler and linter for the indentation-based Pug template language.
//!
//! Only the static part of the language is supported: tags, attributes with
//! literal values, text, comments, `include`, `extends`/`block` and
//! argument-less mixins. JavaScript expressions are rejected with
//! [`PugError::Unsupported`].
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//!
//! use sitekiln_pug::Compiler;
//!
//! let compiler = Compiler::new("src/views");
//! let html = compiler.compile_file(Path::new("src/views/index.pug")).unwrap();
//! ```

pub mod ast;
pub mod compiler;
pub mod lint;
pub mod parser;
pub mod render;

use std::path::{Path, PathBuf};

pub use compiler::Compiler;
pub use lint::{LintViolation, lint};
pub use parser::{ParseError, parse};
use thiserror::Error;

/// Template errors.
#[derive(Debug, Error)]
pub enum PugError {
    /// Malformed template.
    #[error("{}:{line}: {message}", path.display())]
    Syntax {
        path: PathBuf,
        line: usize,
        message: String,
    },

    /// Valid Pug that needs a JavaScript runtime.
    #[error("{}:{line}: unsupported construct: {message}", path.display())]
    Unsupported {
        path: PathBuf,
        line: usize,
        message: String,
    },

    /// `include`/`extends` target does not exist.
    #[error("{}:{line}: cannot find {}", path.display(), target.display())]
    IncludeNotFound {
        path: PathBuf,
        line: usize,
        target: PathBuf,
    },

    /// Templates include each other.
    #[error("include cycle: {0}")]
    IncludeCycle(String),

    /// Template could not be read.
    #[error("cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl PugError {
    pub(crate) fn from_parse(path: &Path, err: ParseError) -> Self {
        let path = path.to_path_buf();
        if err.unsupported {
            Self::Unsupported {
                path,
                line: err.line,
                message: err.message,
            }
        } else {
            Self::Syntax {
                path,
                line: err.line,
                message: err.message,
            }
        }
    }
}

/// Result type for template operations.
pub type Result<T> = std::result::Result<T, PugError>;
