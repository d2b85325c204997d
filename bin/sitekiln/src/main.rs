//! Sitekiln CLI
//!
//! Lints and compiles Pug views and SCSS styles, compresses images and
//! serves the result with live reload.
//!
//! This is the binary entry point. The library functionality is in `lib.rs`.

use std::{path::PathBuf, sync::Arc};

use clap::Parser;
use color_eyre::eyre::{Result, WrapErr};
use sitekiln::cmd::{self, Target};
use sitekiln_core::{Config, Mode};
use sitekiln_tasks::Pipeline;

/// Command-line interface for Sitekiln.
#[derive(Parser)]
#[command(
    name = "sitekiln",
    version,
    about = "Static-site asset pipeline with a live-reload dev server"
)]
struct Cli {
    /// Path to configuration file [default: <root>/sitekiln.toml]
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Project root
    #[arg(short = 'C', long, default_value = ".")]
    root: PathBuf,

    /// Force production mode (otherwise read from SITEKILN_ENV / NODE_ENV)
    #[arg(long)]
    production: bool,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available tasks. Without one, `default` runs.
#[derive(clap::Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
enum Commands {
    /// Lint and compile templates
    Views,
    /// Lint and compile stylesheets
    Styles,
    /// Compress images
    Minimgs,
    /// Serve the output with live reload and rebuild on change
    Watch,
    /// Remove generated output and reports
    Clean,
    /// Clean, then build views, styles and images
    Build,
    /// Clean, build, then watch
    Default,
    /// Print the task tree
    Tasks,
}

impl Commands {
    fn target(self) -> Option<Target> {
        match self {
            Self::Views => Some(Target::Views),
            Self::Styles => Some(Target::Styles),
            Self::Minimgs => Some(Target::Minimgs),
            Self::Watch => Some(Target::Watch),
            Self::Clean => Some(Target::Clean),
            Self::Build => Some(Target::Build),
            Self::Default => Some(Target::Default),
            Self::Tasks => None,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    sitekiln::init_tracing(cli.verbose);

    let mode = if cli.production {
        Mode::Production
    } else {
        Mode::from_env()
    };
    let config = Config::load(&cli.root, cli.config.as_deref(), mode)
        .wrap_err("Failed to load configuration")?;
    let config = Arc::new(config);

    match cli.command.unwrap_or(Commands::Default).target() {
        Some(target) => cmd::run(target, config).await?,
        None => cmd::tasks::run(&Pipeline::new(config)),
    }

    Ok(())
}
