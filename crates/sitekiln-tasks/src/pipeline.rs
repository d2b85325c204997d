//! The named tasks of the asset pipeline.

use std::sync::Arc;

use sitekiln_core::Config;

use crate::{
    clean, images, lint,
    styles,
    task::{Task, parallel, series},
    views,
};

/// Builds the pipeline's tasks over one shared configuration.
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: Arc<Config>,
}

impl Pipeline {
    /// Create a pipeline for `config`.
    pub fn new(config: Arc<Config>) -> Self {
        Self { config }
    }

    /// Shared configuration.
    pub fn config(&self) -> &Arc<Config> {
        &self.config
    }

    fn blocking<F>(&self, name: &'static str, body: F) -> Task
    where
        F: Fn(&Config) -> crate::Result<()> + Send + Sync + 'static,
    {
        let config = Arc::clone(&self.config);
        Task::blocking(name, move || body(&config))
    }

    /// `lint-views`
    pub fn lint_views(&self) -> Task {
        self.blocking("lint-views", lint::run_views)
    }

    /// `compile-views`
    pub fn compile_views(&self) -> Task {
        self.blocking("compile-views", |config| views::compile_views(config).map(drop))
    }

    /// `views`: lint, then compile, templates.
    pub fn views(&self) -> Task {
        series("views", vec![self.lint_views(), self.compile_views()])
    }

    /// `lint-styles`
    pub fn lint_styles(&self) -> Task {
        self.blocking("lint-styles", lint::run_styles)
    }

    /// `compile-styles`
    pub fn compile_styles(&self) -> Task {
        self.blocking("compile-styles", |config| styles::compile_styles(config).map(drop))
    }

    /// `styles`: lint, then compile, stylesheets.
    pub fn styles(&self) -> Task {
        series("styles", vec![self.lint_styles(), self.compile_styles()])
    }

    /// `minimgs`: compress images.
    pub fn minimgs(&self) -> Task {
        self.blocking("minimgs", |config| images::minimize_images(config).map(drop))
    }

    /// `clean`: remove generated output.
    pub fn clean(&self) -> Task {
        self.blocking("clean", clean::clean)
    }

    /// Views, styles and images side by side.
    pub fn assets(&self) -> Task {
        parallel("assets", vec![self.views(), self.styles(), self.minimgs()])
    }

    /// `build`: clean, then every asset task.
    pub fn build(&self) -> Task {
        series("build", vec![self.clean(), self.assets()])
    }

    /// `default`: clean, build every asset, then `watch`.
    pub fn default_task(&self, watch: Task) -> Task {
        series("default", vec![self.clean(), self.assets(), watch])
    }
}

#[cfg(test)]
mod tests {
    use sitekiln_core::{Mode, Settings};

    use super::*;

    #[test]
    fn test_default_task_tree() {
        let config = Config::new("/site", Mode::Development, Settings::default());
        let pipeline = Pipeline::new(Arc::new(config));
        let watch = Task::new("watch", || async { Ok(()) });

        assert_eq!(
            pipeline.default_task(watch).tree(),
            "default (series)\n\
             ├── clean\n\
             ├── assets (parallel)\n\
             │   ├── views (series)\n\
             │   │   ├── lint-views\n\
             │   │   └── compile-views\n\
             │   ├── styles (series)\n\
             │   │   ├── lint-styles\n\
             │   │   └── compile-styles\n\
             │   └── minimgs\n\
             └── watch\n"
        );
    }
}
