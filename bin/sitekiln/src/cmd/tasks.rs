//! Tasks command - print the task tree

use sitekiln_tasks::Pipeline;

use super::Target;

/// Render the tree of every runnable target.
pub fn render(pipeline: &Pipeline) -> String {
    Target::ALL
        .iter()
        .map(|target| target.task(pipeline).tree())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Print the task tree to stdout.
pub fn run(pipeline: &Pipeline) {
    print!("{}", render(pipeline));
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use sitekiln_core::{Config, Mode, Settings};

    use super::*;

    #[test]
    fn test_render_lists_every_target() {
        let config = Config::new("/site", Mode::Development, Settings::default());
        let listing = render(&Pipeline::new(Arc::new(config)));

        for line in ["views (series)", "minimgs", "watch", "clean", "build (series)", "default (series)"] {
            assert!(listing.lines().any(|l| l == line), "missing `{line}` in\n{listing}");
        }
        assert!(listing.contains("│   └── compile-views\n"));
    }
}
