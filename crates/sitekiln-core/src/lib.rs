//! Sitekiln Core Library
//!
//! Path resolution, build mode and configuration shared by every sitekiln task.

pub mod config;
pub mod error;
pub mod mode;
pub mod paths;

pub use config::{Config, ImagesConfig, PathsConfig, ServerConfig, Settings, StylesConfig, WatchConfig};
pub use error::{CoreError, Result};
pub use mode::Mode;
pub use paths::{PathSet, build_glob, to_slash};
