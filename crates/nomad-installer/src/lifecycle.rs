use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use nomad_core::{
    infer_download_extension, is_manual_url, url_file_name, AppDefinition, ArchiveType,
    DefinitionError, Transport, ValidatedDefinition, Version, DEFAULT_DOWNLOAD_EXTENSION,
};
use nomad_resolver::{AppState, Status};
use thiserror::Error;
use tracing::{debug, error, info, info_span, warn};

use crate::custom_files::{create_folders, move_objects, restore_files, write_files, TemplateContext};
use crate::extract::{extract_payload, ExtractError};
use crate::fs_utils::move_aside;
use crate::layout::{current_unix_timestamp, InstallLayout, DEFAULT_SHORTCUTS_DIR};
use crate::relink::{relink, replace_self_binary, RelinkOutcome, SelfReplaceOutcome};

/// Interactive questions asked during a run.
pub trait Prompter {
    fn confirm(&self, question: &str) -> Result<bool>;
    fn ask_line(&self, question: &str) -> Result<String>;
}

/// Answers every confirmation with yes and never supplies a line.
#[derive(Debug, Clone, Copy, Default)]
pub struct AssumeYes;

impl Prompter for AssumeYes {
    fn confirm(&self, _question: &str) -> Result<bool> {
        Ok(true)
    }

    fn ask_line(&self, question: &str) -> Result<String> {
        Err(anyhow!("cannot answer '{question}' without a terminal"))
    }
}

/// Empty input or "y" means yes.
pub fn is_affirmative(answer: &str) -> bool {
    let answer = answer.trim();
    answer.is_empty() || answer.eq_ignore_ascii_case("y")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShortcutRequest {
    pub name: String,
    pub target: PathBuf,
    pub working_dir: PathBuf,
    pub description: String,
    pub icon: Option<PathBuf>,
    pub destination_dir: PathBuf,
}

pub trait ShortcutCreator {
    fn create(&self, request: &ShortcutRequest) -> Result<()>;
}

/// The tool's own executable, replaced in place when the application named
/// `app` is relinked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelfBinary {
    pub app: String,
    pub executable: PathBuf,
}

#[derive(Debug, Clone)]
pub struct LifecycleOptions {
    pub force: bool,
    pub skip_download: bool,
    pub confirm: bool,
    pub refresh: bool,
    pub optimist: bool,
    pub shortcuts_dir: PathBuf,
    pub custom_shortcut_location: Option<PathBuf>,
    pub self_binary: Option<SelfBinary>,
}

impl Default for LifecycleOptions {
    fn default() -> Self {
        Self {
            force: false,
            skip_download: true,
            confirm: false,
            refresh: false,
            optimist: true,
            shortcuts_dir: PathBuf::from(DEFAULT_SHORTCUTS_DIR),
            custom_shortcut_location: None,
            self_binary: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitClass {
    Success,
    AbortedByUser,
    InvalidDefinition,
    DownloadOrExtract,
    Relink,
    Shortcut,
    UnknownApplication,
}

impl ExitClass {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::AbortedByUser => "aborted-by-user",
            Self::InvalidDefinition => "invalid-definition",
            Self::DownloadOrExtract => "download-or-extract",
            Self::Relink => "relink",
            Self::Shortcut => "shortcut",
            Self::UnknownApplication => "unknown-application",
        }
    }
}

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("unknown application '{app}'")]
    UnknownApplication { app: String },
    #[error(transparent)]
    InvalidDefinition(#[from] DefinitionError),
    #[error("no target version resolved for '{app}'")]
    MissingTarget { app: String },
    #[error("action aborted by user")]
    AbortedByUser,
    #[error("cannot prepare installation: {source:#}")]
    Prepare {
        #[source]
        source: anyhow::Error,
    },
    #[error("cannot download {url}: {source:#}")]
    Download {
        url: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("cannot extract {archive}{}: {source}", quarantine_note(.quarantined.as_deref()))]
    Extract {
        archive: PathBuf,
        quarantined: Option<PathBuf>,
        #[source]
        source: ExtractError,
    },
    #[error("cannot link {link}: {source:#}")]
    Relink {
        link: PathBuf,
        #[source]
        source: anyhow::Error,
    },
    #[error("cannot replace running binary: {source:#}")]
    SelfReplace {
        #[source]
        source: anyhow::Error,
    },
    #[error("cannot create shortcut '{name}': {source:#}")]
    Shortcut {
        name: String,
        #[source]
        source: anyhow::Error,
    },
}

fn quarantine_note(quarantined: Option<&Path>) -> String {
    quarantined
        .map(|path| format!(" (archive moved to {})", path.display()))
        .unwrap_or_default()
}

impl LifecycleError {
    pub fn classification(&self) -> ExitClass {
        match self {
            Self::UnknownApplication { .. } => ExitClass::UnknownApplication,
            Self::InvalidDefinition(_) | Self::MissingTarget { .. } => ExitClass::InvalidDefinition,
            Self::Extract {
                source: ExtractError::UnsupportedFormat { .. },
                ..
            } => ExitClass::InvalidDefinition,
            Self::AbortedByUser => ExitClass::AbortedByUser,
            Self::Prepare { .. } | Self::Download { .. } | Self::Extract { .. } => {
                ExitClass::DownloadOrExtract
            }
            Self::Relink { .. } | Self::SelfReplace { .. } => ExitClass::Relink,
            Self::Shortcut { .. } => ExitClass::Shortcut,
        }
    }

    /// Failures that end the run even when remaining applications would
    /// otherwise be processed.
    pub fn is_fatal_for_run(&self) -> bool {
        matches!(self, Self::SelfReplace { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppOutcome {
    UpToDate,
    Applied {
        version_dir: PathBuf,
        relink: RelinkOutcome,
    },
    /// Something other than a directory sits at the version path. Nothing
    /// after the check ran for this application.
    Blocked { path: PathBuf },
}

enum VersionDir {
    Extract,
    Existing,
    Blocked,
}

#[derive(Debug)]
pub struct AppReport {
    pub app: String,
    pub result: Result<AppOutcome, LifecycleError>,
}

#[derive(Debug, Default)]
pub struct RunReport {
    pub apps: Vec<AppReport>,
    /// Set when a failure stopped the run before every application was
    /// processed.
    pub stopped_early: bool,
}

impl RunReport {
    /// Classification of the first failure, or success.
    pub fn exit_class(&self) -> ExitClass {
        self.failures()
            .next()
            .map_or(ExitClass::Success, |(_, err)| err.classification())
    }

    pub fn failures(&self) -> impl Iterator<Item = (&str, &LifecycleError)> {
        self.apps.iter().filter_map(|report| match &report.result {
            Ok(_) => None,
            Err(err) => Some((report.app.as_str(), err)),
        })
    }
}

/// Drives one application at a time from a resolved state to an installed,
/// linked version.
pub struct Lifecycle<'a> {
    layout: &'a InstallLayout,
    transport: &'a dyn Transport,
    prompter: &'a dyn Prompter,
    shortcuts: &'a dyn ShortcutCreator,
    options: &'a LifecycleOptions,
}

impl<'a> Lifecycle<'a> {
    pub fn new(
        layout: &'a InstallLayout,
        transport: &'a dyn Transport,
        prompter: &'a dyn Prompter,
        shortcuts: &'a dyn ShortcutCreator,
        options: &'a LifecycleOptions,
    ) -> Self {
        Self {
            layout,
            transport,
            prompter,
            shortcuts,
            options,
        }
    }

    /// Processes every state in name order. Without the optimist option the
    /// first failure stops the run; a failed self-replace always does.
    pub fn run(
        &self,
        states: &BTreeMap<String, AppState>,
        definitions: &BTreeMap<String, AppDefinition>,
    ) -> RunReport {
        let mut report = RunReport::default();
        for (app, state) in states {
            let result = match definitions.get(app) {
                Some(definition) => self.apply(state, definition),
                None => Err(LifecycleError::UnknownApplication { app: app.clone() }),
            };

            let stop = match &result {
                Ok(_) => false,
                Err(err) => {
                    error!(app = %app, class = err.classification().as_str(), "{err}");
                    !self.options.optimist || err.is_fatal_for_run()
                }
            };
            report.apps.push(AppReport {
                app: app.clone(),
                result,
            });
            if stop {
                report.stopped_early = report.apps.len() < states.len();
                break;
            }
        }
        report
    }

    pub fn apply(
        &self,
        state: &AppState,
        definition: &AppDefinition,
    ) -> Result<AppOutcome, LifecycleError> {
        let span = info_span!("app", name = %state.name);
        let _guard = span.enter();

        let definition = definition.validate()?;
        let target = state
            .target_version
            .as_ref()
            .ok_or_else(|| LifecycleError::MissingTarget {
                app: definition.name.clone(),
            })?;
        if let Some(extension) = &definition.download_extension {
            check_supported(extension)?;
        }

        info!("{}", state.status_message());
        if state.status == Status::Keep && !self.options.refresh {
            info!("nothing to do (use --refresh or --force to regenerate files for the current version)");
            return Ok(AppOutcome::UpToDate);
        }

        if self.options.confirm && !self.confirmed()? {
            return Err(LifecycleError::AbortedByUser);
        }

        self.layout
            .ensure_base_dirs()
            .map_err(|source| LifecycleError::Prepare { source })?;

        let dir_name = InstallLayout::version_dir_name(&definition.name, target);
        let version_dir = self.layout.root().join(&dir_name);
        match self.inspect_version_dir(&version_dir)? {
            VersionDir::Extract => self.fetch_and_extract(definition, target, &version_dir)?,
            VersionDir::Existing => {}
            VersionDir::Blocked => return Ok(AppOutcome::Blocked { path: version_dir }),
        }

        self.apply_custom_files(state, definition, target, &version_dir);

        let link = self.layout.link_path(&definition.symlink);
        let relink_outcome = relink(self.layout, &definition.symlink, &dir_name)
            .map_err(|source| LifecycleError::Relink {
                link: link.clone(),
                source,
            })?;
        self.replace_self_if_needed(state, definition, &version_dir)?;

        self.create_shortcut(definition, &link)?;

        info!("{}", state.success_message());
        Ok(AppOutcome::Applied {
            version_dir,
            relink: relink_outcome,
        })
    }

    fn confirmed(&self) -> Result<bool, LifecycleError> {
        match self.prompter.confirm("Proceed [Y,n] (Enter=Yes) ?") {
            Ok(answer) => Ok(answer),
            Err(err) => {
                warn!("cannot read confirmation: {err:#}");
                Err(LifecycleError::AbortedByUser)
            }
        }
    }

    fn inspect_version_dir(&self, version_dir: &Path) -> Result<VersionDir, LifecycleError> {
        match version_dir.symlink_metadata() {
            Err(_) => Ok(VersionDir::Extract),
            Ok(metadata) if metadata.is_dir() => {
                if !self.options.force {
                    info!(
                        dir = %version_dir.display(),
                        "directory already exists (use --force to regenerate from archive)"
                    );
                    return Ok(VersionDir::Existing);
                }
                info!(dir = %version_dir.display(), "removing existing version directory (force)");
                fs::remove_dir_all(version_dir)
                    .with_context(|| format!("failed to remove {}", version_dir.display()))
                    .map_err(|source| LifecycleError::Prepare { source })?;
                Ok(VersionDir::Extract)
            }
            Ok(_) => {
                warn!(
                    path = %version_dir.display(),
                    "something other than a directory already exists at the version path, please remove it manually"
                );
                Ok(VersionDir::Blocked)
            }
        }
    }

    fn fetch_and_extract(
        &self,
        definition: &ValidatedDefinition,
        target: &Version,
        version_dir: &Path,
    ) -> Result<(), LifecycleError> {
        let mut url = target.fill_placeholders(&definition.download_url);
        let mut extension = definition.download_extension.clone();
        if is_manual_url(&url) {
            let answer = self
                .prompter
                .ask_line(&format!("Please paste custom URL for download ({url}):"))
                .map_err(|source| LifecycleError::Download {
                    url: url.clone(),
                    source,
                })?;
            let provided = target.fill_placeholders(answer.trim());
            if provided.is_empty() || is_manual_url(&provided) {
                return Err(LifecycleError::Download {
                    url,
                    source: anyhow!("no download URL provided"),
                });
            }
            debug!(url = %provided, "custom download URL");
            url = provided;
            extension = infer_download_extension(&url);
        }
        let extension = extension.unwrap_or_else(|| DEFAULT_DOWNLOAD_EXTENSION.to_string());
        check_supported(&extension)?;

        let archive = self
            .layout
            .archive_path(&definition.name, target, &extension);
        if self.options.skip_download && archive.is_file() {
            info!(archive = %archive.display(), "using already downloaded archive (use --no-skip-download to fetch again)");
        } else {
            info!("downloading {url} to {}", archive.display());
            let size = self
                .transport
                .download(&url, &archive)
                .map_err(|source| LifecycleError::Download {
                    url: url.clone(),
                    source,
                })?;
            debug!(bytes = size, "download complete");
        }

        debug!(archive = %archive.display(), "extracting");
        match extract_payload(
            &archive,
            &extension,
            version_dir,
            &definition.extract_filter,
            url_file_name(&url),
        ) {
            Ok(files) => {
                debug!(files, "payload in place");
                Ok(())
            }
            Err(source) => {
                discard_partial_dir(version_dir);
                let quarantined = if source.is_corrupt() {
                    quarantine(&archive)
                } else {
                    None
                };
                Err(LifecycleError::Extract {
                    archive,
                    quarantined,
                    source,
                })
            }
        }
    }

    fn apply_custom_files(
        &self,
        state: &AppState,
        definition: &ValidatedDefinition,
        target: &Version,
        version_dir: &Path,
    ) {
        let mut failures = Vec::new();

        match (&state.current_version_folder, state.status) {
            (Some(previous), status) if status != Status::Keep => {
                failures.extend(restore_files(
                    &definition.restore_files,
                    &self.layout.root().join(previous),
                    version_dir,
                ));
            }
            _ => debug!("no previous version to restore from"),
        }

        failures.extend(create_folders(&definition.create_folders, version_dir));

        let app_path = absolute(version_dir);
        let app_path_generic = absolute(&self.layout.link_path(&definition.symlink));
        let context = TemplateContext {
            version: target,
            app_path: &app_path,
            app_path_generic: &app_path_generic,
        };
        failures.extend(write_files(&definition.create_files, version_dir, &context));
        failures.extend(move_objects(&definition.move_objects, version_dir));

        for failure in failures {
            warn!("{failure:#}");
        }
    }

    fn replace_self_if_needed(
        &self,
        state: &AppState,
        definition: &ValidatedDefinition,
        version_dir: &Path,
    ) -> Result<(), LifecycleError> {
        let Some(self_binary) = &self.options.self_binary else {
            return Ok(());
        };
        if self_binary.app != definition.name {
            return Ok(());
        }

        let old_version = state
            .current_version
            .as_ref()
            .map_or("old", Version::as_str);
        match replace_self_binary(&self_binary.executable, version_dir, old_version) {
            Ok(SelfReplaceOutcome::Unchanged) => Ok(()),
            Ok(SelfReplaceOutcome::Replaced { backup }) => {
                info!(backup = %backup.display(), "binary updated, restart to use the new version");
                Ok(())
            }
            Err(source) => Err(LifecycleError::SelfReplace { source }),
        }
    }

    fn create_shortcut(&self, definition: &ValidatedDefinition, link: &Path) -> Result<(), LifecycleError> {
        let Some(shortcut) = &definition.shortcut else {
            return Ok(());
        };
        let shortcut_error = |source| LifecycleError::Shortcut {
            name: shortcut.clone(),
            source,
        };

        let shortcuts_dir = &self.options.shortcuts_dir;
        fs::create_dir_all(shortcuts_dir)
            .with_context(|| format!("failed to create shortcuts directory {}", shortcuts_dir.display()))
            .map_err(shortcut_error)?;

        let target = match &self.options.custom_shortcut_location {
            Some(location) => {
                let cwd = std::env::current_dir()
                    .context("failed to read current directory")
                    .map_err(shortcut_error)?;
                let cwd_name = cwd.file_name().map(PathBuf::from).unwrap_or_default();
                location
                    .join(cwd_name)
                    .join(&definition.symlink)
                    .join(shortcut)
            }
            None => absolute(link).join(shortcut),
        };
        let working_dir = target
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        let request = ShortcutRequest {
            name: shortcut.clone(),
            icon: definition
                .shortcut_icon
                .as_ref()
                .map(|icon| working_dir.join(icon)),
            target,
            working_dir,
            description: format!("portable-{shortcut}"),
            destination_dir: absolute(shortcuts_dir),
        };
        debug!(shortcut = %request.name, target = %request.target.display(), "creating shortcut");
        self.shortcuts.create(&request).map_err(shortcut_error)
    }
}

fn check_supported(extension: &str) -> Result<ArchiveType, LifecycleError> {
    ArchiveType::from_extension(extension).ok_or_else(|| LifecycleError::Extract {
        archive: PathBuf::new(),
        quarantined: None,
        source: ExtractError::UnsupportedFormat {
            extension: extension.to_string(),
        },
    })
}

fn discard_partial_dir(version_dir: &Path) {
    if version_dir.is_dir() {
        if let Err(err) = fs::remove_dir_all(version_dir) {
            warn!(dir = %version_dir.display(), "cannot remove partially extracted directory: {err}");
        }
    }
}

/// Renames a corrupt archive aside so the next run downloads it again.
fn quarantine(archive: &Path) -> Option<PathBuf> {
    let moved = current_unix_timestamp()
        .and_then(|timestamp| move_aside(archive, &format!("-{timestamp}.bad")));
    match moved {
        Ok(path) => {
            warn!(archive = %path.display(), "corrupt archive moved aside");
            Some(path)
        }
        Err(err) => {
            warn!(archive = %archive.display(), "cannot move corrupt archive aside: {err:#}");
            None
        }
    }
}

fn absolute(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}
