//! Sitekiln Tasks
//!
//! The asset pipeline's building blocks: the [`Task`] abstraction with its
//! [`series`] and [`parallel`] combinators, the lint, compile, image and
//! clean tasks, and the [`WatchHub`] that maps file changes to tasks.
//!
//! # Example
//!
//! ```no_run
//! use std::{path::Path, sync::Arc};
//!
//! use sitekiln_core::{Config, Mode};
//! use sitekiln_tasks::Pipeline;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::load(Path::new("."), None, Mode::from_env())?;
//! Pipeline::new(Arc::new(config)).build().run().await?;
//! # Ok(())
//! # }
//! ```

pub mod clean;
pub mod error;
pub mod files;
pub mod images;
pub mod lint;
pub mod pipeline;
pub mod styles;
pub mod task;
pub mod views;
pub mod watch;

pub use error::{Result, TaskError};
pub use lint::{Language, LintReport, Violation};
pub use pipeline::Pipeline;
pub use task::{Task, TaskFuture, parallel, series};
pub use watch::WatchHub;
