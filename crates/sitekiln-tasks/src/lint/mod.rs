//! Lint tasks and their reports.

pub mod scss;

use std::{
    fmt::{self, Write as _},
    fs,
    path::{Path, PathBuf},
};

use sitekiln_core::Config;
use tracing::{debug, info, warn};

use crate::{
    error::{Result, TaskError},
    files::{display_path, expand},
};

/// File name of the stylesheet report inside the reports directory.
pub const STYLES_REPORT: &str = "report-styles.txt";

/// Language a lint run covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    Template,
    Stylesheet,
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Template => write!(f, "template"),
            Self::Stylesheet => write!(f, "stylesheet"),
        }
    }
}

/// One problem found in one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// Path relative to the project root.
    pub path: String,
    pub line: usize,
    pub column: usize,
    pub rule: String,
    pub message: String,
}

/// Outcome of linting a set of files.
#[derive(Debug, Clone)]
pub struct LintReport {
    pub language: Language,
    pub files_checked: usize,
    pub violations: Vec<Violation>,
}

impl LintReport {
    /// Whether no problems were found.
    pub fn is_clean(&self) -> bool {
        self.violations.is_empty()
    }

    /// Console report grouped by file:
    ///
    /// ```text
    /// src/views/index.pug
    ///   3:5  Duplicate attribute `href`  disallow-duplicate-attributes
    ///
    /// ✖ 1 problem
    /// ```
    pub fn stylish(&self) -> String {
        let mut out = String::new();
        let mut current: Option<&str> = None;

        for v in &self.violations {
            if current != Some(v.path.as_str()) {
                if current.is_some() {
                    out.push('\n');
                }
                let _ = writeln!(out, "{}", v.path);
                current = Some(&v.path);
            }
            let _ = writeln!(out, "  {}:{}  {}  {}", v.line, v.column, v.message, v.rule);
        }

        if !out.is_empty() {
            out.push('\n');
        }
        let _ = writeln!(out, "{}", self.summary());
        out
    }

    /// Plain report, one block per file with a marker per problem.
    pub fn string_format(&self) -> String {
        let mut out = String::new();
        let mut current: Option<&str> = None;

        for v in &self.violations {
            if current != Some(v.path.as_str()) {
                let _ = writeln!(out, "\n{}", v.path);
                current = Some(&v.path);
            }
            let _ = writeln!(out, " {}:{}  ✖  {}  {}", v.line, v.column, v.message, v.rule);
        }

        if !out.is_empty() {
            out.push('\n');
        }
        let _ = writeln!(out, "{}", self.summary());
        out
    }

    fn summary(&self) -> String {
        match self.violations.len() {
            0 => format!("{} file(s) checked, no problems found", self.files_checked),
            1 => "✖ 1 problem".to_string(),
            n => format!("✖ {n} problems"),
        }
    }

    /// Fail in production mode when problems were found.
    pub fn into_result(self, production: bool) -> Result<()> {
        if production && !self.is_clean() {
            return Err(TaskError::Lint {
                language: self.language,
                violations: self.violations.len(),
            });
        }
        Ok(())
    }

    fn log(&self) {
        for v in &self.violations {
            warn!(
                path = %v.path,
                line = v.line,
                column = v.column,
                rule = %v.rule,
                "{}",
                v.message
            );
        }
        info!(
            language = %self.language,
            files = self.files_checked,
            problems = self.violations.len(),
            "lint complete"
        );
    }
}

fn read(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|source| TaskError::io(path, source))
}

/// Lint every template matched by `views_all`.
pub fn lint_views(config: &Config) -> Result<LintReport> {
    let root = Path::new(&config.paths.root);
    let files = expand(&config.paths.views_all)?;
    let mut violations = Vec::new();

    for file in &files {
        debug!(path = %file.display(), "linting template");
        let source = read(file)?;
        let path = display_path(file, root);
        violations.extend(sitekiln_pug::lint(&source).into_iter().map(|v| Violation {
            path: path.clone(),
            line: v.line,
            column: v.column,
            rule: v.rule.to_string(),
            message: v.message,
        }));
    }

    Ok(LintReport {
        language: Language::Template,
        files_checked: files.len(),
        violations,
    })
}

/// Lint every stylesheet matched by `scss_all`.
pub fn lint_styles(config: &Config) -> Result<LintReport> {
    let root = Path::new(&config.paths.root);
    let files = expand(&config.paths.scss_all)?;
    let mut violations = Vec::new();

    for file in &files {
        debug!(path = %file.display(), "linting stylesheet");
        let source = read(file)?;
        let path = display_path(file, root);
        violations.extend(scss::lint_scss(&source).into_iter().map(|f| Violation {
            path: path.clone(),
            line: f.line,
            column: f.column,
            rule: f.rule.to_string(),
            message: f.message,
        }));
    }

    Ok(LintReport {
        language: Language::Stylesheet,
        files_checked: files.len(),
        violations,
    })
}

/// Lint templates, print the console report, fail in production on problems.
pub fn run_views(config: &Config) -> Result<()> {
    let report = lint_views(config)?;
    report.log();
    if !report.is_clean() {
        eprint!("{}", report.stylish());
    }
    report.into_result(config.is_production())
}

/// Lint stylesheets, write the report file, fail in production on problems.
///
/// The report is echoed to the console outside production mode.
pub fn run_styles(config: &Config) -> Result<()> {
    let report = lint_styles(config)?;
    report.log();

    let text = report.string_format();
    let path = write_report(Path::new(&config.paths.reports), STYLES_REPORT, &text)?;
    debug!(path = %path.display(), "stylesheet report written");

    if !config.is_production() {
        eprint!("{text}");
    }
    report.into_result(config.is_production())
}

fn write_report(dir: &Path, name: &str, text: &str) -> Result<PathBuf> {
    fs::create_dir_all(dir).map_err(|source| TaskError::io(dir, source))?;
    let path = dir.join(name);
    fs::write(&path, text).map_err(|source| TaskError::io(&path, source))?;
    Ok(path)
}
