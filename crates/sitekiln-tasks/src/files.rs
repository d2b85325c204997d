//! Glob matching and expansion over the filesystem.

use std::path::{Path, PathBuf};

use globset::{Glob, GlobBuilder, GlobMatcher, GlobSet, GlobSetBuilder};
use sitekiln_core::to_slash;
use walkdir::WalkDir;

use crate::error::{Result, TaskError};

const GLOB_META: &[char] = &['*', '?', '[', '{'];

fn glob(pattern: &str) -> Result<Glob> {
    GlobBuilder::new(pattern)
        .literal_separator(true)
        .build()
        .map_err(|source| TaskError::Glob {
            pattern: pattern.to_string(),
            source,
        })
}

/// Compile a forward-slash glob where `*` never crosses `/`.
pub fn matcher(pattern: &str) -> Result<GlobMatcher> {
    Ok(glob(pattern)?.compile_matcher())
}

/// Compile several globs into one set, matching like [`matcher`].
pub fn glob_set<S: AsRef<str>>(patterns: &[S]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(glob(pattern.as_ref())?);
    }
    builder.build().map_err(|source| TaskError::Glob {
        pattern: patterns.iter().map(AsRef::as_ref).collect::<Vec<_>>().join(", "),
        source,
    })
}

/// List the files matching `pattern`, sorted.
///
/// Hidden files and directories are skipped. A pattern without
/// wildcards matches the file it names, if present.
pub fn expand(pattern: &str) -> Result<Vec<PathBuf>> {
    let (base, wildcard) = split_base(pattern);
    if !wildcard {
        let path = PathBuf::from(pattern);
        return Ok(if path.is_file() { vec![path] } else { Vec::new() });
    }
    if !base.is_dir() {
        return Ok(Vec::new());
    }

    let matcher = matcher(pattern)?;
    let mut files = Vec::new();
    let walker = WalkDir::new(&base)
        .into_iter()
        .filter_entry(|entry| entry.depth() == 0 || !is_hidden(entry.file_name()));

    for entry in walker {
        let entry = entry.map_err(|err| {
            let path = err.path().unwrap_or(&base).to_path_buf();
            TaskError::io(path, err.into())
        })?;
        if entry.file_type().is_file() && matcher.is_match(to_slash(entry.path())) {
            files.push(entry.into_path());
        }
    }

    files.sort();
    Ok(files)
}

/// Longest wildcard-free prefix of `pattern`, and whether a wildcard follows.
pub(crate) fn split_base(pattern: &str) -> (PathBuf, bool) {
    let mut base = Vec::new();
    for segment in pattern.split('/') {
        if segment.contains(GLOB_META) {
            let base = match base.as_slice() {
                [] => PathBuf::from("."),
                [""] => PathBuf::from("/"),
                _ => PathBuf::from(base.join("/")),
            };
            return (base, true);
        }
        base.push(segment);
    }
    (PathBuf::from(pattern), false)
}

fn is_hidden(name: &std::ffi::OsStr) -> bool {
    name.to_str().is_some_and(|name| name.starts_with('.'))
}

/// Render `path` relative to `root` when it lies inside it.
pub fn display_path(path: &Path, root: &Path) -> String {
    to_slash(path.strip_prefix(root).unwrap_or(path))
}
