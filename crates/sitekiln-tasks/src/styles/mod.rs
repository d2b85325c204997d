//! Stylesheet compilation: Sass, then prefixing and minification.

mod grid;

use std::{
    borrow::Cow,
    fs,
    path::{Path, PathBuf},
};

use lightningcss::{
    stylesheet::{MinifyOptions, ParserOptions, PrinterOptions, StyleSheet},
    targets::{Browsers, Targets},
};
use parcel_sourcemap::SourceMap;
use sitekiln_core::Config;
use tracing::{debug, error, info};

use crate::error::{Result, TaskError};

/// Name of the compiled stylesheet.
pub const OUTPUT_NAME: &str = "styles.min.css";

/// Compiled stylesheet ready to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledCss {
    pub code: String,
    pub map: Option<String>,
}

/// Compile the stylesheet entry to `<dest_css>/styles.min.css`.
///
/// Compile errors are logged and swallowed unless
/// `styles.fail_on_compile_error` is set. Returns the written file, or
/// `None` when the run produced no output.
pub fn compile_styles(config: &Config) -> Result<Option<PathBuf>> {
    let entry = Path::new(&config.paths.scss_entry);
    if !entry.is_file() {
        info!(entry = %entry.display(), "no stylesheet entry, skipping");
        return Ok(None);
    }

    let compiled = match compile_entry(entry, &config.settings.styles.browsers, !config.is_production()) {
        Ok(compiled) => compiled,
        Err(err) if !config.settings.styles.fail_on_compile_error => {
            error!(entry = %entry.display(), error = %err, "stylesheet compilation failed");
            return Ok(None);
        }
        Err(err) => return Err(err),
    };

    let dest = Path::new(&config.paths.dest_css);
    fs::create_dir_all(dest).map_err(|source| TaskError::io(dest, source))?;

    let output = dest.join(OUTPUT_NAME);
    let mut code = compiled.code;
    if let Some(map) = compiled.map {
        let map_name = format!("{OUTPUT_NAME}.map");
        let map_path = dest.join(&map_name);
        fs::write(&map_path, map).map_err(|source| TaskError::io(&map_path, source))?;
        code.push_str(&format!("\n/*# sourceMappingURL={map_name} */"));
    }

    fs::write(&output, code).map_err(|source| TaskError::io(&output, source))?;
    debug!(output = %output.display(), "stylesheet written");
    Ok(Some(output))
}

/// Compile an SCSS entry and post-process it for `browsers`.
pub fn compile_entry(entry: &Path, browsers: &[String], source_map: bool) -> Result<CompiledCss> {
    let load_path = entry.parent().unwrap_or(Path::new("."));
    let options = grass::Options::default()
        .load_path(load_path)
        .style(grass::OutputStyle::Expanded);

    let css = grass::from_path(entry, &options).map_err(|err| stylesheet_error(entry, err))?;
    debug!(entry = %entry.display(), bytes = css.len(), "sass compiled");

    post_process(entry, &css, browsers, source_map)
}

/// Prefix for `browsers` and minify.
///
/// Targets that include Internet Explorer also get `-ms-` grid fallbacks.
pub fn post_process(
    entry: &Path,
    css: &str,
    browsers: &[String],
    source_map: bool,
) -> Result<CompiledCss> {
    let filename = entry
        .file_name()
        .map_or_else(|| "index.scss".to_string(), |name| name.to_string_lossy().into_owned());

    let browsers = Browsers::from_browserslist(browsers).map_err(|err| stylesheet_error(entry, err))?;
    let css = if matches!(browsers, Some(Browsers { ie: Some(_), .. })) {
        Cow::Owned(grid::prefix_grid(css))
    } else {
        Cow::Borrowed(css)
    };
    let targets = Targets {
        browsers,
        ..Targets::default()
    };

    let mut sheet = StyleSheet::parse(
        &css,
        ParserOptions {
            filename: filename.clone(),
            ..ParserOptions::default()
        },
    )
    .map_err(|err| stylesheet_error(entry, err))?;

    sheet
        .minify(MinifyOptions {
            targets,
            ..MinifyOptions::default()
        })
        .map_err(|err| stylesheet_error(entry, err))?;

    let mut map = if source_map {
        let root = entry.parent().map(|p| p.to_string_lossy().into_owned()).unwrap_or_default();
        let mut map = SourceMap::new(&root);
        map.add_source(&filename);
        map.set_source_content(0, &css)
            .map_err(|err| stylesheet_error(entry, err))?;
        Some(map)
    } else {
        None
    };

    let printed = sheet
        .to_css(PrinterOptions {
            minify: true,
            source_map: map.as_mut(),
            targets,
            ..PrinterOptions::default()
        })
        .map_err(|err| stylesheet_error(entry, err))?;

    let map = match map.as_mut() {
        Some(map) => Some(map.to_json(None).map_err(|err| stylesheet_error(entry, err))?),
        None => None,
    };

    Ok(CompiledCss {
        code: printed.code,
        map,
    })
}

fn stylesheet_error(entry: &Path, err: impl std::fmt::Display) -> TaskError {
    TaskError::Stylesheet {
        path: entry.to_path_buf(),
        message: err.to_string(),
    }
}
