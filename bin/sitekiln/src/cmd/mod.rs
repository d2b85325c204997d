//! Command implementations.

pub mod tasks;
pub mod watch;

use std::{fmt, sync::Arc};

use color_eyre::eyre::{Result, WrapErr};
use sitekiln_core::Config;
use sitekiln_tasks::{Pipeline, Task};

/// A runnable pipeline target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Views,
    Styles,
    Minimgs,
    Watch,
    Clean,
    Build,
    Default,
}

impl Target {
    /// Every target, in listing order.
    pub const ALL: [Target; 7] = [
        Target::Views,
        Target::Styles,
        Target::Minimgs,
        Target::Watch,
        Target::Clean,
        Target::Build,
        Target::Default,
    ];

    /// Build the task for this target.
    pub fn task(self, pipeline: &Pipeline) -> Task {
        match self {
            Self::Views => pipeline.views(),
            Self::Styles => pipeline.styles(),
            Self::Minimgs => pipeline.minimgs(),
            Self::Watch => watch::task(pipeline),
            Self::Clean => pipeline.clean(),
            Self::Build => pipeline.build(),
            Self::Default => pipeline.default_task(watch::task(pipeline)),
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Views => "views",
            Self::Styles => "styles",
            Self::Minimgs => "minimgs",
            Self::Watch => "watch",
            Self::Clean => "clean",
            Self::Build => "build",
            Self::Default => "default",
        };
        f.write_str(name)
    }
}

/// Run `target` to completion.
pub async fn run(target: Target, config: Arc<Config>) -> Result<()> {
    tracing::debug!(%target, mode = %config.mode, "running target");
    let pipeline = Pipeline::new(config);
    target
        .task(&pipeline)
        .run()
        .await
        .wrap_err_with(|| format!("Task '{target}' failed"))
}

#[cfg(test)]
mod tests {
    use sitekiln_core::{Mode, Settings};

    use super::*;

    #[test]
    fn test_task_names_match_targets() {
        let config = Config::new("/site", Mode::Development, Settings::default());
        let pipeline = Pipeline::new(Arc::new(config));

        for target in Target::ALL {
            assert_eq!(target.task(&pipeline).name(), target.to_string());
        }
    }
}
