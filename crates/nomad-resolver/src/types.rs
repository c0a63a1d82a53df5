use std::fmt;
use std::path::PathBuf;

use nomad_core::Version;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Status {
    #[default]
    NotSet,
    Keep,
    Install,
    Upgrade,
    Downgrade,
}

impl Status {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotSet => "not-set",
            Self::Keep => "keep",
            Self::Install => "install",
            Self::Upgrade => "upgrade",
            Self::Downgrade => "downgrade",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What is known about one application: what the scan found on disk, and
/// what resolution decided to move it to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppState {
    pub name: String,
    pub symlink_found: bool,
    pub current_version: Option<Version>,
    /// Version directory name relative to the installation root.
    pub current_version_folder: Option<PathBuf>,
    pub target_version: Option<Version>,
    pub status: Status,
}

impl AppState {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn installed(name: impl Into<String>, version: Version, folder: impl Into<PathBuf>) -> Self {
        Self {
            current_version: Some(version),
            current_version_folder: Some(folder.into()),
            ..Self::new(name)
        }
    }

    pub fn status_message(&self) -> String {
        let current = display_version(self.current_version.as_ref());
        let target = display_version(self.target_version.as_ref());
        match self.status {
            Status::NotSet => "no target version resolved".to_string(),
            Status::Keep => format!("installed version {current} is already up to date"),
            Status::Install => format!("not installed >> will install version {target}"),
            Status::Upgrade => format!("upgrading version from {current} >> {target}"),
            Status::Downgrade => format!("downgrading version from {current} >> {target}"),
        }
    }

    pub fn success_message(&self) -> String {
        let current = display_version(self.current_version.as_ref());
        let target = display_version(self.target_version.as_ref());
        match self.status {
            Status::NotSet => String::new(),
            Status::Keep => format!("successfully kept at version {current}"),
            Status::Install => format!("version {target} successfully installed"),
            Status::Upgrade => format!("successfully upgraded from {current} to {target}"),
            Status::Downgrade => format!("successfully downgraded from {current} to {target}"),
        }
    }
}

fn display_version(version: Option<&Version>) -> &str {
    version.map_or("<none>", Version::as_str)
}

#[derive(Debug, Clone, Default)]
pub struct ResolveOptions {
    pub override_version: Option<Version>,
    pub prefer_latest: bool,
    pub api_key: Option<String>,
}

/// A non-fatal problem met while resolving one application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolveWarning {
    pub app: String,
    pub message: String,
}

impl fmt::Display for ResolveWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.app, self.message)
    }
}
