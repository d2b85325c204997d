//! Production / development build mode.

use std::fmt;

/// Environment variable selecting the build mode.
pub const MODE_ENV: &str = "SITEKILN_ENV";

/// Consulted when [`MODE_ENV`] is unset.
pub const FALLBACK_MODE_ENV: &str = "NODE_ENV";

/// Build mode, read once at startup.
///
/// Production makes lint violations fatal and skips source maps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Lint violations are fatal, no source maps.
    Production,
    /// Lint violations are reported only.
    #[default]
    Development,
}

impl Mode {
    /// Determine the mode from the process environment.
    pub fn from_env() -> Self {
        let primary = std::env::var(MODE_ENV).ok();
        let fallback = std::env::var(FALLBACK_MODE_ENV).ok();
        Self::from_values(primary.as_deref(), fallback.as_deref())
    }

    /// Determine the mode from the raw variable values.
    ///
    /// The primary value wins whenever it is set, even to something other
    /// than `production`.
    pub fn from_values(primary: Option<&str>, fallback: Option<&str>) -> Self {
        match primary.or(fallback) {
            Some(value) if value.trim() == "production" => Self::Production,
            _ => Self::Development,
        }
    }

    /// Whether this is production mode.
    pub fn is_production(self) -> bool {
        self == Self::Production
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Production => f.write_str("production"),
            Self::Development => f.write_str("development"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_means_development() {
        assert_eq!(Mode::from_values(None, None), Mode::Development);
    }

    #[test]
    fn test_production_value() {
        assert_eq!(Mode::from_values(Some("production"), None), Mode::Production);
        assert!(Mode::from_values(Some("production"), None).is_production());
    }

    #[test]
    fn test_fallback_variable() {
        assert_eq!(Mode::from_values(None, Some("production")), Mode::Production);
        assert_eq!(Mode::from_values(None, Some("test")), Mode::Development);
    }

    #[test]
    fn test_primary_wins_over_fallback() {
        assert_eq!(
            Mode::from_values(Some("development"), Some("production")),
            Mode::Development
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(Mode::Production.to_string(), "production");
        assert_eq!(Mode::Development.to_string(), "development");
    }
}
