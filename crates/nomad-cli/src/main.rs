use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgAction, Args, Parser, Subcommand};
use clap_complete::Shell;
use tracing::error;
use tracing_subscriber::EnvFilter;

mod completion;
mod dispatch;
mod exit;
mod http;
mod prompt;
mod render;
mod shortcut;

use dispatch::run_cli;

#[derive(Parser, Debug)]
#[command(name = "nomad", version)]
#[command(about = "Installs and updates portable applications", long_about = None)]
struct Cli {
    #[command(flatten)]
    run: RunArgs,
    /// Increase log verbosity (-v debug, -vv trace).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug, Clone)]
struct RunArgs {
    /// Install this exact version instead of the resolved one.
    #[arg(long, global = true, value_name = "VERSION")]
    version_override: Option<String>,
    #[arg(long, global = true, value_name = "DIR", default_value = nomad_config::DEFAULT_DEFINITIONS_DIR)]
    definitions: PathBuf,
    #[arg(long, global = true, value_name = "FILE", default_value = nomad_config::DEFAULT_SETTINGS_FILE)]
    settings: PathBuf,
    /// Installation root holding versioned directories and links.
    #[arg(long, global = true, value_name = "DIR", default_value = nomad_installer::DEFAULT_APPS_ROOT)]
    root: PathBuf,
    /// Download cache; relative paths are taken from the installation root.
    #[arg(long, global = true, value_name = "DIR")]
    archives: Option<PathBuf>,
    /// Point shortcuts at this location instead of the local link.
    #[arg(long, global = true, value_name = "DIR")]
    shortcut_location: Option<PathBuf>,
    /// Re-extract even when the version directory exists.
    #[arg(long, global = true)]
    force: bool,
    #[arg(long, global = true, overrides_with = "no_skip_download")]
    skip_download: bool,
    #[arg(long, global = true, overrides_with = "skip_download")]
    no_skip_download: bool,
    #[arg(long, global = true, overrides_with = "no_latest")]
    latest: bool,
    #[arg(long, global = true, overrides_with = "latest")]
    no_latest: bool,
    #[arg(long, global = true, overrides_with = "pessimist")]
    optimist: bool,
    /// Stop at the first failing application.
    #[arg(long, global = true, overrides_with = "optimist")]
    pessimist: bool,
    /// Ask before changing each application.
    #[arg(long, global = true, overrides_with = "yes")]
    confirm: bool,
    #[arg(long, short = 'y', global = true, overrides_with = "confirm")]
    yes: bool,
    /// Regenerate custom files and links for up to date applications.
    #[arg(long, global = true)]
    refresh: bool,
}

impl RunArgs {
    fn skip_download(&self) -> bool {
        flag_pair(self.skip_download, self.no_skip_download, true)
    }

    fn prefer_latest(&self) -> bool {
        flag_pair(self.latest, self.no_latest, true)
    }

    fn optimist(&self) -> bool {
        flag_pair(self.optimist, self.pessimist, true)
    }

    fn confirm(&self) -> bool {
        flag_pair(self.confirm, self.yes, false)
    }
}

/// `--x` / `--no-x` pairs; clap keeps only the last one given.
fn flag_pair(on: bool, off: bool, default: bool) -> bool {
    match (on, off) {
        (true, _) => true,
        (_, true) => false,
        _ => default,
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Install or update applications to their resolved version.
    #[command(visible_aliases = ["update", "upgrade"])]
    Install { apps: Vec<String> },
    /// Show what an install would do.
    Status { apps: Vec<String> },
    /// List known definitions and installed versions.
    List,
    Version,
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run_cli(cli) {
        Ok(code) => code,
        Err(err) => {
            error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests;
