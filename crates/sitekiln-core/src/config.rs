//! Pipeline configuration.
//!
//! Settings come from an optional `sitekiln.toml` layered under
//! `SITEKILN__SECTION__KEY` environment overrides. The resolved [`Config`] is
//! built once at startup and shared read-only by every task.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{
    error::{CoreError, Result},
    mode::Mode,
    paths::PathSet,
};

/// Default configuration file name, looked up in the project root.
pub const CONFIG_FILE_NAME: &str = "sitekiln.toml";

/// Prefix for environment overrides (`SITEKILN__SERVER__PORT=8080`).
pub const ENV_PREFIX: &str = "SITEKILN";

/// User-facing settings, as written in `sitekiln.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Directory names.
    pub paths: PathsConfig,

    /// Development server settings.
    pub server: ServerConfig,

    /// Stylesheet pipeline settings.
    pub styles: StylesConfig,

    /// Image compression settings.
    pub images: ImagesConfig,

    /// File watcher settings.
    pub watch: WatchConfig,
}

/// Directory names, relative to the project root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Source root.
    pub source: String,

    /// Destination root, wiped by `clean`.
    pub destination: String,

    /// Lint report directory, wiped by `clean`.
    pub reports: String,
}

/// Development server configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Interface to bind.
    pub host: String,

    /// Port to listen on.
    pub port: u16,

    /// Open the site in the default browser once listening.
    pub open: bool,
}

/// Stylesheet configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StylesConfig {
    /// Browserslist queries used for vendor prefixing.
    pub browsers: Vec<String>,

    /// Fail the styles task on Sass errors instead of logging them.
    pub fail_on_compile_error: bool,
}

/// Image compression configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImagesConfig {
    /// JPEG re-encoding quality (1-100).
    pub jpeg_quality: u8,
}

/// Watcher configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Window over which change events are batched.
    pub delay_ms: u64,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            source: "src".to_string(),
            destination: "dist".to_string(),
            reports: "reports".to_string(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 9000,
            open: true,
        }
    }
}

impl Default for StylesConfig {
    fn default() -> Self {
        Self {
            browsers: vec!["defaults".to_string()],
            fail_on_compile_error: false,
        }
    }
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self { jpeg_quality: 80 }
    }
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self { delay_ms: 200 }
    }
}

impl Settings {
    /// Parse settings from TOML text, without environment overrides.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let settings: Settings = toml::from_str(content)
            .map_err(|e| CoreError::config_with_source("Failed to parse settings", e))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from `path` layered under environment overrides.
    ///
    /// A missing file is an error only when `required` is set; otherwise the
    /// defaults apply.
    pub fn load(path: &Path, required: bool) -> Result<Self> {
        if required && !path.exists() {
            return Err(CoreError::config(format!(
                "Configuration file not found: {}",
                path.display()
            )));
        }

        let settings = config::Config::builder()
            .add_source(config::File::from(path).required(required))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let settings: Settings = settings.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Validate the settings.
    fn validate(&self) -> Result<()> {
        for (key, dir) in [
            ("paths.source", &self.paths.source),
            ("paths.destination", &self.paths.destination),
            ("paths.reports", &self.paths.reports),
        ] {
            if dir.trim().is_empty() {
                return Err(CoreError::config(format!("{key} cannot be empty")));
            }
            if Path::new(dir).is_absolute() {
                return Err(CoreError::config(format!(
                    "{key} must be relative to the project root"
                )));
            }
        }

        if self.paths.destination == self.paths.source {
            return Err(CoreError::config(
                "paths.destination must differ from paths.source",
            ));
        }

        if self.server.port == 0 {
            return Err(CoreError::config("server.port cannot be 0"));
        }

        if self.styles.browsers.is_empty() {
            return Err(CoreError::config("styles.browsers cannot be empty"));
        }

        if !(1..=100).contains(&self.images.jpeg_quality) {
            return Err(CoreError::config("images.jpeg_quality must be within 1..=100"));
        }

        Ok(())
    }
}

/// Resolved, immutable pipeline configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Project root.
    pub root: PathBuf,

    /// Build mode.
    pub mode: Mode,

    /// Resolved paths and globs.
    pub paths: PathSet,

    /// User settings.
    pub settings: Settings,
}

impl Config {
    /// Assemble a configuration from already-loaded settings.
    pub fn new(root: impl Into<PathBuf>, mode: Mode, settings: Settings) -> Self {
        let root = root.into();
        let paths = PathSet::new(&root, &settings.paths);
        Self {
            root,
            mode,
            paths,
            settings,
        }
    }

    /// Load the configuration for the project at `root`.
    ///
    /// `config_file` overrides the default `<root>/sitekiln.toml` and must
    /// exist when given.
    pub fn load(root: &Path, config_file: Option<&Path>, mode: Mode) -> Result<Self> {
        let settings = match config_file {
            Some(path) => Settings::load(path, true)?,
            None => Settings::load(&root.join(CONFIG_FILE_NAME), false)?,
        };

        tracing::debug!(root = %root.display(), %mode, "configuration loaded");
        Ok(Self::new(root, mode, settings))
    }

    /// Whether the pipeline runs in production mode.
    pub fn is_production(&self) -> bool {
        self.mode.is_production()
    }

    /// Address the development server listens on.
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.settings.server.host, self.settings.server.port)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn create_test_config() -> String {
        r#"
[paths]
source = "assets"
destination = "public"

[server]
port = 8080
open = false

[styles]
browsers = ["last 2 versions", "not dead"]
fail_on_compile_error = true

[images]
jpeg_quality = 70

[watch]
delay_ms = 50
"#
        .to_string()
    }

    #[test]
    fn test_load_config() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let config_path = dir.path().join(CONFIG_FILE_NAME);
        let mut file = std::fs::File::create(&config_path).expect("create file");
        file.write_all(create_test_config().as_bytes())
            .expect("write");

        let config = Config::load(dir.path(), None, Mode::Development).expect("load config");
        let settings = &config.settings;

        assert_eq!(settings.paths.source, "assets");
        assert_eq!(settings.paths.destination, "public");
        assert_eq!(settings.paths.reports, "reports");
        assert_eq!(settings.server.host, "127.0.0.1");
        assert_eq!(settings.server.port, 8080);
        assert!(!settings.server.open);
        assert_eq!(settings.styles.browsers, vec!["last 2 versions", "not dead"]);
        assert!(settings.styles.fail_on_compile_error);
        assert_eq!(settings.images.jpeg_quality, 70);
        assert_eq!(settings.watch.delay_ms, 50);
        assert!(config.paths.destination.ends_with("/public"));
    }

    #[test]
    fn test_config_defaults_without_file() {
        let dir = tempfile::tempdir().expect("create temp dir");

        let config = Config::load(dir.path(), None, Mode::Production).expect("load config");

        assert_eq!(config.settings.paths, PathsConfig::default());
        assert_eq!(config.settings.server.port, 9000);
        assert!(config.settings.server.open);
        assert_eq!(config.settings.styles.browsers, vec!["defaults"]);
        assert!(!config.settings.styles.fail_on_compile_error);
        assert_eq!(config.settings.images.jpeg_quality, 80);
        assert_eq!(config.settings.watch.delay_ms, 200);
        assert!(config.is_production());
        assert_eq!(config.server_addr(), "127.0.0.1:9000");
    }

    #[test]
    fn test_explicit_config_must_exist() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let missing = dir.path().join("nope.toml");

        let result = Config::load(dir.path(), Some(&missing), Mode::Development);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("not found"));
    }

    #[test]
    fn test_from_toml_str_partial_sections() {
        let settings = Settings::from_toml_str("[server]\nport = 3000\n").expect("parse");
        assert_eq!(settings.server.port, 3000);
        assert_eq!(settings.server.host, "127.0.0.1");
        assert_eq!(settings.paths.destination, "dist");
    }

    #[test]
    fn test_validation_rejects_absolute_directory() {
        let result = Settings::from_toml_str("[paths]\ndestination = \"/var/www\"\n");
        assert!(result.is_err());
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("must be relative")
        );
    }

    #[test]
    fn test_validation_rejects_bad_quality() {
        let result = Settings::from_toml_str("[images]\njpeg_quality = 0\n");
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("jpeg_quality"));
    }

    #[test]
    fn test_validation_rejects_same_source_and_destination() {
        let result =
            Settings::from_toml_str("[paths]\nsource = \"site\"\ndestination = \"site\"\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_validation_rejects_empty_browsers() {
        let result = Settings::from_toml_str("[styles]\nbrowsers = []\n");
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("browsers"));
    }
}
