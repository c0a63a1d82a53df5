use std::collections::{BTreeMap, BTreeSet};
use std::io::{self, IsTerminal};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use nomad_config::{load_configuration, Configuration};
use nomad_core::Version;
use nomad_installer::{
    scan_installed, ExitClass, InstallLayout, Lifecycle, LifecycleOptions, SelfBinary,
    DEFAULT_SHORTCUTS_DIR,
};
use nomad_resolver::{note_self_version, resolve_all, AppState, ResolveOptions};
use tracing::{error, info, warn};

use crate::completion::write_completions_script;
use crate::exit::{exit_with, BAD_VERSION_OVERRIDE};
use crate::http::HttpTransport;
use crate::prompt::StdinPrompter;
use crate::render::{
    current_output_style, render_list_line, render_report_line, render_status_line,
};
use crate::shortcut::PlatformShortcuts;
use crate::{Cli, Commands, RunArgs};

pub const SELF_APP: &str = "nomad";
const BUILTIN_DEFINITIONS: &str = include_str!("../definitions/builtin.toml");

pub fn run_cli(cli: Cli) -> Result<ExitCode> {
    match cli.command {
        Commands::Version => {
            println!("{SELF_APP} {}", env!("CARGO_PKG_VERSION"));
            Ok(ExitCode::SUCCESS)
        }
        Commands::Completions { shell } => {
            write_completions_script(shell, &mut io::stdout().lock())?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::List => run_list(&cli.run),
        Commands::Status { apps } => run_status(&cli.run, &apps),
        Commands::Install { apps } => run_install(&cli.run, &apps),
    }
}

struct Session {
    configuration: Configuration,
    layout: InstallLayout,
    installed: BTreeMap<String, AppState>,
}

fn open_session(args: &RunArgs) -> Result<Session> {
    let configuration = load_configuration(&args.settings, &args.definitions, BUILTIN_DEFINITIONS)?;

    let mut layout = InstallLayout::new(&args.root);
    if let Some(archives) = args
        .archives
        .as_ref()
        .or(configuration.settings.archives_directory.as_ref())
    {
        layout = layout.with_archives_dir(archives);
    }

    let definitions = &configuration.definitions;
    let installed = scan_installed(&layout, |app| definitions.contains_key(app))?;
    Ok(Session {
        configuration,
        layout,
        installed,
    })
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct Selection {
    pub apps: Vec<String>,
    pub unknown: Vec<String>,
}

/// Requested names first, then the settings' `myapps`, then whatever is
/// installed. Names without a definition are set aside.
pub fn select_apps<F>(
    requested: &[String],
    myapps: &[String],
    installed: &BTreeMap<String, AppState>,
    is_known: F,
) -> Selection
where
    F: Fn(&str) -> bool,
{
    let candidates: BTreeSet<&str> = if !requested.is_empty() {
        requested.iter().map(String::as_str).collect()
    } else if !myapps.is_empty() {
        myapps.iter().map(String::as_str).collect()
    } else {
        installed.keys().map(String::as_str).collect()
    };

    let (apps, unknown): (Vec<&str>, Vec<&str>) =
        candidates.into_iter().partition(|app| is_known(app));
    Selection {
        apps: apps.into_iter().map(str::to_string).collect(),
        unknown: unknown.into_iter().map(str::to_string).collect(),
    }
}

pub fn build_states(
    apps: &[String],
    installed: &BTreeMap<String, AppState>,
) -> BTreeMap<String, AppState> {
    let mut states: BTreeMap<String, AppState> = apps
        .iter()
        .map(|app| {
            let state = installed
                .get(app)
                .cloned()
                .unwrap_or_else(|| AppState::new(app.clone()));
            (app.clone(), state)
        })
        .collect();

    if states.contains_key(SELF_APP) {
        match Version::parse(env!("CARGO_PKG_VERSION")) {
            Ok(version) => note_self_version(&mut states, SELF_APP, version),
            Err(err) => warn!("cannot read own version: {err}"),
        }
    }
    states
}

pub fn parse_version_override(input: Option<&str>) -> Result<Option<Version>, ExitCode> {
    match input.map(str::trim).filter(|value| !value.is_empty()) {
        None => Ok(None),
        Some(value) => Version::parse(value).map(Some).map_err(|err| {
            error!("bad version override '{value}': {err}");
            ExitCode::from(BAD_VERSION_OVERRIDE)
        }),
    }
}

/// Selects, scans and resolves. `Err` carries the exit code of a run that
/// ends before any application is processed.
fn prepare_states(
    args: &RunArgs,
    session: &Session,
    requested: &[String],
    transport: &HttpTransport,
) -> Result<BTreeMap<String, AppState>, ExitCode> {
    let override_version = parse_version_override(args.version_override.as_deref())?;

    let definitions = &session.configuration.definitions;
    let selection = select_apps(
        requested,
        &session.configuration.settings.myapps,
        &session.installed,
        |app| definitions.contains_key(app),
    );
    for app in &selection.unknown {
        warn!(app = %app, "unknown application, no definition found");
    }
    if selection.apps.is_empty() {
        if selection.unknown.is_empty() {
            info!("no application selected");
            return Err(ExitCode::SUCCESS);
        }
        return Err(exit_with(ExitClass::UnknownApplication));
    }
    if override_version.is_some() && selection.apps.len() > 1 {
        warn!("version override applies to every selected application");
    }

    let mut states = build_states(&selection.apps, &session.installed);
    let options = ResolveOptions {
        override_version,
        prefer_latest: args.prefer_latest(),
        api_key: session.configuration.settings.api_key(),
    };
    for warning in resolve_all(&mut states, definitions, &options, transport) {
        warn!(app = %warning.app, "{}", warning.message);
    }
    Ok(states)
}

fn run_status(args: &RunArgs, requested: &[String]) -> Result<ExitCode> {
    let session = open_session(args)?;
    let transport = HttpTransport::new(false)?;
    let states = match prepare_states(args, &session, requested, &transport) {
        Ok(states) => states,
        Err(code) => return Ok(code),
    };

    let style = current_output_style();
    for state in states.values() {
        println!("{}", render_status_line(style, state));
    }
    Ok(ExitCode::SUCCESS)
}

fn run_install(args: &RunArgs, requested: &[String]) -> Result<ExitCode> {
    let session = open_session(args)?;
    let transport = HttpTransport::new(io::stderr().is_terminal())?;
    let states = match prepare_states(args, &session, requested, &transport) {
        Ok(states) => states,
        Err(code) => return Ok(code),
    };

    let options = LifecycleOptions {
        force: args.force,
        skip_download: args.skip_download(),
        confirm: args.confirm(),
        refresh: args.refresh,
        optimist: args.optimist(),
        shortcuts_dir: PathBuf::from(DEFAULT_SHORTCUTS_DIR),
        custom_shortcut_location: args.shortcut_location.clone(),
        self_binary: std::env::current_exe().ok().map(|executable| SelfBinary {
            app: SELF_APP.to_string(),
            executable,
        }),
    };
    let lifecycle = Lifecycle::new(
        &session.layout,
        &transport,
        &StdinPrompter,
        &PlatformShortcuts,
        &options,
    );
    let report = lifecycle.run(&states, &session.configuration.definitions);

    let style = current_output_style();
    for app_report in &report.apps {
        println!("{}", render_report_line(style, app_report));
    }
    if report.stopped_early {
        warn!(
            skipped = states.len() - report.apps.len(),
            "run stopped before every application was processed"
        );
    }
    Ok(exit_with(report.exit_class()))
}

fn run_list(args: &RunArgs) -> Result<ExitCode> {
    let session = open_session(args)?;
    for name in session.configuration.definitions.keys() {
        println!("{}", render_list_line(name, session.installed.get(name)));
    }
    Ok(ExitCode::SUCCESS)
}
