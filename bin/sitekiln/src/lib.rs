//! Sitekiln CLI Library
//!
//! Wiring for the `sitekiln` binary: the named pipeline targets, the watch
//! command with its development server, and logging setup.
//!
//! # Modules
//!
//! - [`cmd`] - Target selection, task listing and the watch command
//! - [`server`] - Embedded development server with live reload
//!
//! # Example
//!
//! ```no_run
//! use std::{path::Path, sync::Arc};
//!
//! use sitekiln::cmd::{self, Target};
//! use sitekiln_core::{Config, Mode};
//!
//! # async fn build() -> color_eyre::eyre::Result<()> {
//! let config = Config::load(Path::new("."), None, Mode::Production)?;
//! cmd::run(Target::Build, Arc::new(config)).await?;
//! # Ok(())
//! # }
//! ```

pub mod cmd;
pub mod server;

pub use sitekiln_core::{Config, Mode};
pub use sitekiln_tasks::{Pipeline, Task};

/// Initialize tracing with the specified verbosity level.
///
/// # Arguments
///
/// * `verbose` - Verbosity level (0 = INFO, 1 = DEBUG, 2+ = TRACE)
///
/// `RUST_LOG` directives are layered on top.
pub fn init_tracing(verbose: u8) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let level = match verbose {
        0 => tracing::Level::INFO,
        1 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();
}
