//! Platform-independent path and glob resolution.
//!
//! Every path the pipeline hands to a task or a watcher is an absolute,
//! forward-slash string, so globs behave the same on every host.

use std::path::{Component, Path, PathBuf};

use crate::config::PathsConfig;

/// Build an absolute, forward-slash glob from a base directory and segments.
///
/// Relative bases are resolved against the current directory. `.` and `..`
/// are folded lexically; glob metacharacters in segments are kept verbatim.
pub fn build_glob(base: impl AsRef<Path>, segments: &[&str]) -> String {
    let mut path = absolute(base.as_ref());
    for segment in segments {
        path.push(segment);
    }
    to_slash(&normalize(&path))
}

/// Render a path with forward slashes only.
pub fn to_slash(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

fn absolute(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    match std::env::current_dir() {
        Ok(cwd) => cwd.join(path),
        Err(_) => Path::new("/").join(path),
    }
}

fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Resolved source and destination locations, computed once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathSet {
    /// Project root.
    pub root: String,
    /// Source root (`src`).
    pub source: String,
    /// Destination root (`dist`).
    pub destination: String,
    /// Lint report directory.
    pub reports: String,
    /// Compiled CSS destination.
    pub dest_css: String,
    /// Optimised image destination.
    pub dest_img: String,
    /// Template directory, base for `/`-rooted includes.
    pub views_dir: String,
    /// Top-level template entries.
    pub views_entries: String,
    /// Every template, partials included.
    pub views_all: String,
    /// Stylesheet entry.
    pub scss_entry: String,
    /// Every stylesheet, partials included.
    pub scss_all: String,
    /// Images to compress.
    pub images: String,
    /// Output globs that trigger a browser reload.
    pub reload: Vec<String>,
}

impl PathSet {
    /// Resolve the layout under `root` using the configured directory names.
    pub fn new(root: impl AsRef<Path>, dirs: &PathsConfig) -> Self {
        let root = build_glob(root, &[]);
        let source = build_glob(&root, &[&dirs.source]);
        let destination = build_glob(&root, &[&dirs.destination]);
        let reports = build_glob(&root, &[&dirs.reports]);

        let dest_css = build_glob(&destination, &["css"]);
        let dest_img = build_glob(&destination, &["img"]);

        let views_dir = build_glob(&source, &["views"]);
        let images_dir = build_glob(&source, &["assets", "img"]);

        let reload = vec![
            build_glob(&dest_css, &["*.css"]),
            build_glob(&destination, &["*.html"]),
            build_glob(&dest_img, &["*"]),
        ];

        Self {
            views_entries: build_glob(&views_dir, &["*.pug"]),
            views_all: build_glob(&views_dir, &["**", "*.pug"]),
            scss_entry: build_glob(&source, &["scss", "index.scss"]),
            scss_all: build_glob(&source, &["scss", "**", "*.scss"]),
            images: build_glob(&images_dir, &["*"]),
            root,
            source,
            destination,
            reports,
            dest_css,
            dest_img,
            views_dir,
            reload,
        }
    }
}
