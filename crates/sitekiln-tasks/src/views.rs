//! Template compilation.

use std::{
    fs,
    path::{Path, PathBuf},
};

use rayon::prelude::*;
use sitekiln_core::Config;
use sitekiln_pug::Compiler;
use tracing::{debug, info};

use crate::{
    error::{Result, TaskError},
    files::expand,
};

/// Compile every top-level template entry to `<destination>/<stem>.html`.
///
/// Entries compile in parallel; every entry is attempted and the first
/// error in entry order is returned. Returns the written files.
pub fn compile_views(config: &Config) -> Result<Vec<PathBuf>> {
    let entries = expand(&config.paths.views_entries)?;
    let destination = Path::new(&config.paths.destination);
    let compiler = Compiler::new(&config.paths.views_dir);

    fs::create_dir_all(destination).map_err(|source| TaskError::io(destination, source))?;

    let results: Vec<Result<PathBuf>> = entries
        .par_iter()
        .map(|entry| compile_entry(&compiler, entry, destination))
        .collect();

    let written = results.into_iter().collect::<Result<Vec<_>>>()?;
    info!(count = written.len(), "templates compiled");
    Ok(written)
}

fn compile_entry(compiler: &Compiler, entry: &Path, destination: &Path) -> Result<PathBuf> {
    let html = compiler.compile_file(entry)?;

    let stem = entry
        .file_stem()
        .ok_or_else(|| TaskError::io(entry, std::io::Error::other("entry has no file name")))?;
    let output = destination.join(stem).with_extension("html");

    fs::write(&output, html).map_err(|source| TaskError::io(&output, source))?;
    debug!(entry = %entry.display(), output = %output.display(), "template compiled");
    Ok(output)
}
