use super::*;
use std::collections::BTreeMap;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use clap::error::ErrorKind;
use nomad_core::Version;
use nomad_installer::{AppOutcome, AppReport, ExitClass, LifecycleError, ShortcutRequest};
use nomad_resolver::{AppState, Status};
use reqwest::StatusCode;

use crate::completion::write_completions_script;
use crate::dispatch::{build_states, parse_version_override, select_apps, SELF_APP};
use crate::exit::exit_code;
use crate::http::{check_status, part_path, redact};
use crate::prompt::read_answer;
use crate::render::{
    render_list_line, render_report_line, render_status_line, resolve_output_style, OutputStyle,
};
use crate::shortcut::{shortcut_file_name, shortcut_script};

fn version(input: &str) -> Version {
    Version::parse(input).expect("version must parse")
}

fn parse(args: &[&str]) -> Cli {
    Cli::try_parse_from(args).expect("arguments must parse")
}

#[test]
fn install_aliases_parse_to_install() {
    for command in ["install", "update", "upgrade"] {
        let cli = parse(&["nomad", command, "editor", "viewer"]);
        let Commands::Install { apps } = cli.command else {
            panic!("{command} must map to install");
        };
        assert_eq!(apps, vec!["editor", "viewer"]);
    }
}

#[test]
fn run_flags_default_values() {
    let cli = parse(&["nomad", "install"]);
    assert!(cli.run.skip_download());
    assert!(cli.run.prefer_latest());
    assert!(cli.run.optimist());
    assert!(!cli.run.confirm());
    assert_eq!(cli.run.root, PathBuf::from("apps"));
    assert_eq!(cli.run.settings, PathBuf::from("nomad.toml"));
    assert_eq!(cli.run.definitions, PathBuf::from("app-definitions"));
    assert_eq!(cli.verbose, 0);
}

#[test]
fn run_flags_last_one_wins() {
    let cli = parse(&[
        "nomad",
        "--no-skip-download",
        "--no-latest",
        "--pessimist",
        "--confirm",
        "install",
        "-vv",
    ]);
    assert!(!cli.run.skip_download());
    assert!(!cli.run.prefer_latest());
    assert!(!cli.run.optimist());
    assert!(cli.run.confirm());
    assert_eq!(cli.verbose, 2);

    let cli = parse(&["nomad", "status", "--confirm", "--yes", "--pessimist", "--optimist"]);
    assert!(!cli.run.confirm());
    assert!(cli.run.optimist());
}

#[test]
fn unknown_flag_is_rejected() {
    let err = Cli::try_parse_from(["nomad", "install", "--frobnicate"]).expect_err("must fail");
    assert_eq!(err.kind(), ErrorKind::UnknownArgument);
}

#[test]
fn missing_subcommand_is_rejected() {
    let err = Cli::try_parse_from(["nomad"]).expect_err("must fail");
    assert_eq!(err.kind(), ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand);

    let err = Cli::try_parse_from(["nomad", "--force"]).expect_err("must fail");
    assert_eq!(err.kind(), ErrorKind::MissingSubcommand);
}

#[test]
fn exit_codes_by_class() {
    assert_eq!(exit_code(ExitClass::Success), 0);
    assert_eq!(exit_code(ExitClass::InvalidDefinition), 51);
    assert_eq!(exit_code(ExitClass::AbortedByUser), 52);
    assert_eq!(exit_code(ExitClass::DownloadOrExtract), 53);
    assert_eq!(exit_code(ExitClass::Relink), 58);
    assert_eq!(exit_code(ExitClass::Shortcut), 59);
    assert_eq!(exit_code(ExitClass::UnknownApplication), 68);
}

#[test]
fn version_override_parsing() {
    assert!(parse_version_override(None).expect("no override").is_none());
    assert!(parse_version_override(Some("  ")).expect("blank override").is_none());
    assert_eq!(
        parse_version_override(Some("2.4.1")).expect("valid override"),
        Some(version("2.4.1"))
    );
    assert!(parse_version_override(Some("latest")).is_err());
}

#[test]
fn select_apps_prefers_requested_then_myapps_then_installed() {
    let installed = BTreeMap::from([(
        "viewer".to_string(),
        AppState::installed("viewer", version("1.0"), "viewer-1.0"),
    )]);
    let known = |app: &str| app != "ghost";

    let requested = vec!["ghost".to_string(), "editor".to_string(), "editor".to_string()];
    let selection = select_apps(&requested, &["viewer".to_string()], &installed, known);
    assert_eq!(selection.apps, vec!["editor"]);
    assert_eq!(selection.unknown, vec!["ghost"]);

    let selection = select_apps(&[], &["player".to_string()], &installed, known);
    assert_eq!(selection.apps, vec!["player"]);

    let selection = select_apps(&[], &[], &installed, known);
    assert_eq!(selection.apps, vec!["viewer"]);
    assert!(selection.unknown.is_empty());
}

#[test]
fn build_states_uses_scan_and_own_version() {
    let installed = BTreeMap::from([
        (
            "viewer".to_string(),
            AppState::installed("viewer", version("1.0"), "viewer-1.0"),
        ),
        (
            SELF_APP.to_string(),
            AppState::installed(SELF_APP, version("0.0.1"), "nomad-0.0.1"),
        ),
    ]);
    let states = build_states(
        &["editor".to_string(), "viewer".to_string(), SELF_APP.to_string()],
        &installed,
    );

    assert_eq!(states.len(), 3);
    assert_eq!(states["editor"].current_version, None);
    assert_eq!(states["viewer"].current_version, Some(version("1.0")));
    assert_eq!(
        states[SELF_APP].current_version,
        Some(version(env!("CARGO_PKG_VERSION")))
    );

    let without_self = build_states(&["viewer".to_string()], &installed);
    assert!(!without_self.contains_key(SELF_APP));
}

#[test]
fn output_style_needs_terminal_and_color() {
    assert_eq!(resolve_output_style(true, false), OutputStyle::Rich);
    assert_eq!(resolve_output_style(true, true), OutputStyle::Plain);
    assert_eq!(resolve_output_style(false, false), OutputStyle::Plain);
}

#[test]
fn plain_status_line_has_name_status_and_message() {
    let mut state = AppState::installed("editor", version("1.0"), "editor-1.0");
    state.target_version = Some(version("1.2"));
    state.status = Status::Upgrade;

    let line = render_status_line(OutputStyle::Plain, &state);

    assert!(line.starts_with("editor "));
    assert!(line.contains("upgrade"));
    assert!(line.ends_with("upgrading version from 1.0 >> 1.2"));
    assert!(!line.contains('\u{1b}'));
}

#[test]
fn rich_status_line_is_colored() {
    let state = AppState::new("editor");
    let line = render_status_line(OutputStyle::Rich, &state);
    assert!(line.contains('\u{1b}'));
}

#[test]
fn report_lines_describe_outcome() {
    let done = AppReport {
        app: "editor".to_string(),
        result: Ok(AppOutcome::UpToDate),
    };
    assert!(render_report_line(OutputStyle::Plain, &done).contains("up to date"));

    let blocked = AppReport {
        app: "viewer".to_string(),
        result: Ok(AppOutcome::Blocked {
            path: PathBuf::from("apps/viewer-2.0"),
        }),
    };
    let line = render_report_line(OutputStyle::Plain, &blocked);
    assert!(line.contains("skipped"));
    assert!(line.ends_with("viewer-2.0 is not a directory"));

    let failed = AppReport {
        app: "ghost".to_string(),
        result: Err(LifecycleError::UnknownApplication {
            app: "ghost".to_string(),
        }),
    };
    let line = render_report_line(OutputStyle::Plain, &failed);
    assert!(line.contains("failed"));
    assert!(line.contains("unknown application 'ghost'"));
}

#[test]
fn list_line_shows_version_and_link_state() {
    let linked = AppState {
        symlink_found: true,
        ..AppState::installed("editor", version("1.2"), "editor-1.2")
    };
    assert!(render_list_line("editor", Some(&linked)).ends_with(" 1.2"));

    let unlinked = AppState::installed("viewer", version("0.9"), "viewer-0.9");
    assert!(render_list_line("viewer", Some(&unlinked)).ends_with("0.9 (not linked)"));
    assert!(render_list_line("player", None).ends_with(" -"));
}

#[test]
fn http_status_mapping() {
    assert!(check_status(StatusCode::OK, "https://example.test/a").is_ok());
    let not_found = check_status(StatusCode::NOT_FOUND, "https://example.test/a")
        .expect_err("404 must fail");
    assert_eq!(not_found.to_string(), "URL not found: https://example.test/a");
    let server = check_status(StatusCode::BAD_GATEWAY, "https://example.test/a")
        .expect_err("502 must fail");
    assert!(server.to_string().contains("502"));
}

#[test]
fn credentials_are_redacted() {
    assert_eq!(
        redact("bearer ghp_secret rejected", Some("ghp_secret")),
        "bearer <redacted> rejected"
    );
    assert_eq!(redact("nothing to hide", None), "nothing to hide");
    assert_eq!(redact("empty key", Some("")), "empty key");
}

#[test]
fn downloads_go_through_part_file() {
    assert_eq!(
        part_path(Path::new("apps/archives/editor-1.0.zip")),
        PathBuf::from("apps/archives/editor-1.0.zip.part")
    );
}

#[test]
fn read_answer_strips_line_ending_and_detects_closed_input() {
    let mut input = Cursor::new("y\r\nsecond\n");
    assert_eq!(read_answer(&mut input).expect("first line"), "y");
    assert_eq!(read_answer(&mut input).expect("second line"), "second");
    assert!(read_answer(&mut input).is_err());
}

fn shortcut_request() -> ShortcutRequest {
    ShortcutRequest {
        name: "bin/editor.exe".to_string(),
        target: PathBuf::from("C:/apps/editor/bin/editor.exe"),
        working_dir: PathBuf::from("C:/apps/editor/bin"),
        description: "portable-bin/editor.exe".to_string(),
        icon: Some(PathBuf::from("C:/apps/editor/bin/editor.ico")),
        destination_dir: PathBuf::from("C:/shortcuts"),
    }
}

#[test]
fn shortcut_script_sets_every_field() {
    let request = shortcut_request();
    assert_eq!(shortcut_file_name(&request).expect("file name"), "editor");

    let script = shortcut_script(&request).expect("script");

    assert!(script.contains("CreateShortcut(\""));
    assert!(script.contains("editor.lnk\")"));
    assert!(script.contains("link.TargetPath = \"C:/apps/editor/bin/editor.exe\""));
    assert!(script.contains("link.WorkingDirectory = \"C:/apps/editor/bin\""));
    assert!(script.contains("link.Description = \"portable-bin/editor.exe\""));
    assert!(script.contains("link.IconLocation = \"C:/apps/editor/bin/editor.ico\""));
    assert!(script.ends_with("link.Save\n"));
}

#[test]
fn completions_are_generated_for_nomad() {
    let mut output = Vec::new();
    write_completions_script(clap_complete::Shell::Bash, &mut output)
        .expect("completion must render");
    let script = String::from_utf8(output).expect("script must be utf-8");
    assert!(script.contains("nomad"));
    assert!(script.contains("--version-override"));
}

#[test]
fn builtin_definitions_are_valid() {
    let mut definitions = nomad_config::DefinitionSet::new();
    let added = definitions
        .load_toml_str(
            include_str!("../definitions/builtin.toml"),
            "built-in definitions",
        )
        .expect("built-in definitions must parse");
    assert!(added > 0);
    let definitions = definitions.into_map();
    assert!(definitions.contains_key(SELF_APP));
    for (name, definition) in definitions {
        let validated = definition
            .validate()
            .unwrap_or_else(|err| panic!("{name} must validate: {err}"));
        assert!(validated.remote_check.is_some());
        assert!(validated.download_url.starts_with("https://github.com/"));
    }
}
