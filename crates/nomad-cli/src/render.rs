use std::io::IsTerminal;

use anstyle::{AnsiColor, Effects, Style};
use nomad_installer::{AppOutcome, AppReport, RelinkOutcome};
use nomad_resolver::{AppState, Status};

const NAME_WIDTH: usize = 16;
const STATUS_WIDTH: usize = 9;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum OutputStyle {
    Plain,
    Rich,
}

pub fn current_output_style() -> OutputStyle {
    resolve_output_style(
        std::io::stdout().is_terminal(),
        std::env::var_os("NO_COLOR").is_some(),
    )
}

pub fn resolve_output_style(stdout_is_terminal: bool, no_color: bool) -> OutputStyle {
    if stdout_is_terminal && !no_color {
        OutputStyle::Rich
    } else {
        OutputStyle::Plain
    }
}

fn status_style(status: Status) -> Style {
    let color = match status {
        Status::Keep => AnsiColor::Green,
        Status::Install => AnsiColor::BrightCyan,
        Status::Upgrade => AnsiColor::BrightBlue,
        Status::Downgrade => AnsiColor::Yellow,
        Status::NotSet => AnsiColor::Red,
    };
    Style::new()
        .fg_color(Some(color.into()))
        .effects(Effects::BOLD)
}

fn failure_style() -> Style {
    Style::new()
        .fg_color(Some(AnsiColor::Red.into()))
        .effects(Effects::BOLD)
}

fn warning_style() -> Style {
    Style::new().fg_color(Some(AnsiColor::Yellow.into()))
}

fn success_style() -> Style {
    Style::new().fg_color(Some(AnsiColor::Green.into()))
}

fn colorize(style: OutputStyle, color: Style, text: &str) -> String {
    match style {
        OutputStyle::Plain => text.to_string(),
        OutputStyle::Rich => format!("{}{}{}", color.render(), text, color.render_reset()),
    }
}

fn label(style: OutputStyle, color: Style, text: &str) -> String {
    colorize(style, color, &format!("{text:<STATUS_WIDTH$}"))
}

pub fn render_status_line(style: OutputStyle, state: &AppState) -> String {
    format!(
        "{:<NAME_WIDTH$} {} {}",
        state.name,
        label(style, status_style(state.status), state.status.as_str()),
        state.status_message()
    )
}

pub fn render_report_line(style: OutputStyle, report: &AppReport) -> String {
    let (tag, color, message) = match &report.result {
        Ok(AppOutcome::UpToDate) => ("ok", success_style(), "up to date".to_string()),
        Ok(AppOutcome::Applied {
            version_dir,
            relink,
        }) => {
            let link_note = match relink {
                RelinkOutcome::Conflict => " (link not updated)",
                RelinkOutcome::AlreadyCurrent | RelinkOutcome::Linked { .. } => "",
            };
            (
                "done",
                success_style(),
                format!("{}{link_note}", version_dir.display()),
            )
        }
        Ok(AppOutcome::Blocked { path }) => (
            "skipped",
            warning_style(),
            format!("{} is not a directory", path.display()),
        ),
        Err(err) => ("failed", failure_style(), format!("{err}")),
    };
    format!(
        "{:<NAME_WIDTH$} {} {message}",
        report.app,
        label(style, color, tag)
    )
}

pub fn render_list_line(name: &str, installed: Option<&AppState>) -> String {
    match installed.and_then(|state| state.current_version.as_ref().map(|version| (state, version))) {
        Some((state, version)) => {
            let link = if state.symlink_found { "" } else { " (not linked)" };
            format!("{name:<NAME_WIDTH$} {version}{link}")
        }
        None => format!("{name:<NAME_WIDTH$} -"),
    }
}
