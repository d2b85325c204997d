//! Output removal.

use std::{fs, io, path::Path};

use sitekiln_core::Config;
use tracing::debug;

use crate::error::{Result, TaskError};

/// Remove the destination and report directories.
///
/// Missing directories are not an error.
pub fn clean(config: &Config) -> Result<()> {
    for dir in [&config.paths.destination, &config.paths.reports] {
        remove_dir(Path::new(dir))?;
    }
    Ok(())
}

fn remove_dir(dir: &Path) -> Result<()> {
    match fs::remove_dir_all(dir) {
        Ok(()) => {
            debug!(dir = %dir.display(), "removed");
            Ok(())
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(TaskError::io(dir, source)),
    }
}

#[cfg(test)]
mod tests {
    use sitekiln_core::{Mode, Settings};

    use super::*;

    #[test]
    fn test_clean_removes_outputs_and_is_idempotent() {
        let dir = tempfile::tempdir().expect("create temp dir");
        fs::create_dir_all(dir.path().join("dist/css")).expect("create dist");
        fs::write(dir.path().join("dist/index.html"), "<p>x</p>").expect("write html");
        fs::create_dir_all(dir.path().join("reports")).expect("create reports");
        fs::create_dir_all(dir.path().join("src")).expect("create src");

        let config = Config::new(dir.path(), Mode::Development, Settings::default());
        clean(&config).expect("first clean");
        clean(&config).expect("second clean");

        assert!(!dir.path().join("dist").exists());
        assert!(!dir.path().join("reports").exists());
        assert!(dir.path().join("src").exists());
    }
}
