use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

pub fn remove_file_if_exists(path: &Path) -> io::Result<()> {
    if path.symlink_metadata().is_ok() {
        fs::remove_file(path)?;
    }
    Ok(())
}

pub fn is_symlink(path: &Path) -> bool {
    path.symlink_metadata()
        .map(|metadata| metadata.file_type().is_symlink())
        .unwrap_or(false)
}

/// Renames `path` to `{path}{suffix}` and returns the new location.
pub fn move_aside(path: &Path, suffix: &str) -> Result<PathBuf> {
    let mut aside = path.as_os_str().to_os_string();
    aside.push(suffix);
    let aside = PathBuf::from(aside);
    fs::rename(path, &aside).with_context(|| {
        format!(
            "failed to move {} aside to {}",
            path.display(),
            aside.display()
        )
    })?;
    Ok(aside)
}

/// Joins `relative` below `base`, refusing absolute paths and parent
/// components so definition-provided names cannot escape the directory.
pub fn join_within(base: &Path, relative: &str) -> Result<PathBuf> {
    let candidate = Path::new(relative);
    let escapes = candidate.components().any(|component| {
        !matches!(
            component,
            std::path::Component::Normal(_) | std::path::Component::CurDir
        )
    });
    if relative.trim().is_empty() || escapes {
        anyhow::bail!(
            "path '{relative}' must stay inside {}",
            base.display()
        );
    }
    Ok(base.join(candidate))
}
