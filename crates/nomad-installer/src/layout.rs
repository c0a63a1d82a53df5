use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use nomad_core::Version;

pub const DEFAULT_APPS_ROOT: &str = "apps";
pub const DEFAULT_ARCHIVES_SUBDIR: &str = "archives";
pub const DEFAULT_SHORTCUTS_DIR: &str = "shortcuts";

/// On-disk layout of an installation root: one `{app}-{version}` directory
/// per installed version, one link per application, and a download cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallLayout {
    root: PathBuf,
    archives: PathBuf,
}

impl InstallLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let archives = root.join(DEFAULT_ARCHIVES_SUBDIR);
        Self { root, archives }
    }

    /// Relative archive directories are taken from the installation root.
    pub fn with_archives_dir(mut self, archives: impl AsRef<Path>) -> Self {
        let archives = archives.as_ref();
        self.archives = if archives.is_absolute() {
            archives.to_path_buf()
        } else {
            self.root.join(archives)
        };
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn archives_dir(&self) -> &Path {
        &self.archives
    }

    pub fn version_dir_name(app: &str, version: &Version) -> String {
        format!("{app}-{version}")
    }

    pub fn version_dir(&self, app: &str, version: &Version) -> PathBuf {
        self.root.join(Self::version_dir_name(app, version))
    }

    pub fn link_path(&self, link_name: &str) -> PathBuf {
        self.root.join(link_name)
    }

    pub fn archive_path(&self, app: &str, version: &Version, extension: &str) -> PathBuf {
        self.archives
            .join(format!("{}{extension}", Self::version_dir_name(app, version)))
    }

    pub fn ensure_base_dirs(&self) -> Result<()> {
        for dir in [&self.root, &self.archives] {
            fs::create_dir_all(dir)
                .with_context(|| format!("failed to create directory: {}", dir.display()))?;
        }
        Ok(())
    }
}

pub fn current_unix_timestamp() -> Result<u64> {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .context("system time is before unix epoch")?;
    Ok(now.as_secs())
}
