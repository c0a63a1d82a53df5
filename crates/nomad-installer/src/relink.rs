use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use tracing::{debug, error, info, warn};

use crate::fs_utils::{is_symlink, move_aside};
use crate::layout::InstallLayout;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelinkOutcome {
    AlreadyCurrent,
    Linked { replaced_stale: bool },
    /// Something that is not a link occupies the link name, or the target is
    /// not a directory. Nothing was changed.
    Conflict,
}

/// Points the application's link at `version_dir_name`, a directory directly
/// under the installation root. The link target is written relative to the
/// root so the whole root can be moved.
pub fn relink(layout: &InstallLayout, link_name: &str, version_dir_name: &str) -> Result<RelinkOutcome> {
    let link = layout.link_path(link_name);
    let target = layout.root().join(version_dir_name);
    let canonical_target = fs::canonicalize(&target)
        .with_context(|| format!("failed to resolve link target {}", target.display()))?;
    if !canonical_target.is_dir() {
        warn!(
            target = %target.display(),
            "link target is not a directory, keeping the existing link"
        );
        return Ok(RelinkOutcome::Conflict);
    }

    let mut replaced_stale = false;
    match link.symlink_metadata() {
        Ok(_) if is_symlink(&link) => {
            if fs::canonicalize(&link).ok().as_deref() == Some(canonical_target.as_path()) {
                debug!(link = %link.display(), "link already points to {}", target.display());
                return Ok(RelinkOutcome::AlreadyCurrent);
            }
            remove_link(&link)?;
            debug!(link = %link.display(), "removed stale link");
            replaced_stale = true;
        }
        Ok(_) => {
            warn!(
                link = %link.display(),
                "a file or directory already uses the link name, please remove it manually"
            );
            return Ok(RelinkOutcome::Conflict);
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            debug!(link = %link.display(), "no link yet");
        }
        Err(err) => {
            return Err(err).with_context(|| format!("failed to inspect {}", link.display()));
        }
    }

    let absolute_target = std::path::absolute(&target).unwrap_or(canonical_target);
    create_dir_link(Path::new(version_dir_name), &absolute_target, &link)?;
    info!(link = %link.display(), "linked to {version_dir_name}");
    Ok(RelinkOutcome::Linked { replaced_stale })
}

fn remove_link(link: &Path) -> Result<()> {
    let removed = fs::remove_file(link);
    #[cfg(windows)]
    let removed = removed.or_else(|_| fs::remove_dir(link));
    removed.with_context(|| format!("failed to remove link {}", link.display()))
}

#[cfg(unix)]
fn create_dir_link(target: &Path, _absolute_target: &Path, link: &Path) -> Result<()> {
    std::os::unix::fs::symlink(target, link).with_context(|| {
        format!(
            "failed to link {} -> {}",
            link.display(),
            target.display()
        )
    })
}

/// Junctions need no privilege but only take absolute targets. A directory
/// symlink is the fallback, e.g. for targets on a network share.
#[cfg(windows)]
fn create_dir_link(target: &Path, absolute_target: &Path, link: &Path) -> Result<()> {
    match junction::create(absolute_target, link) {
        Ok(()) => Ok(()),
        Err(err) => {
            debug!(link = %link.display(), "junction failed, trying a directory symlink: {err}");
            std::os::windows::fs::symlink_dir(target, link).with_context(|| {
                format!(
                    "failed to link {} -> {} (junction: {err})",
                    link.display(),
                    target.display()
                )
            })
        }
    }
}

#[cfg(not(any(unix, windows)))]
fn create_dir_link(target: &Path, _absolute_target: &Path, link: &Path) -> Result<()> {
    Err(anyhow!(
        "directory links are not supported on this platform ({} -> {})",
        link.display(),
        target.display()
    ))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelfReplaceOutcome {
    Unchanged,
    Replaced { backup: PathBuf },
}

/// Replaces the running executable with its copy from `version_dir` when
/// the two differ. The old binary is kept as `{exe}.{old_version}`. A failed
/// copy tries to move the old binary back; this is best effort only.
pub fn replace_self_binary(
    executable: &Path,
    version_dir: &Path,
    old_version: &str,
) -> Result<SelfReplaceOutcome> {
    let file_name = executable
        .file_name()
        .ok_or_else(|| anyhow!("executable path has no file name: {}", executable.display()))?;
    let replacement = version_dir.join(file_name);

    if files_equal(executable, &replacement)? {
        debug!(binary = %executable.display(), "running binary already matches installed version");
        return Ok(SelfReplaceOutcome::Unchanged);
    }

    let backup = move_aside(executable, &format!(".{old_version}"))?;
    if let Err(err) = fs::copy(&replacement, executable) {
        if let Err(rollback) = fs::rename(&backup, executable) {
            error!(
                backup = %backup.display(),
                "cannot roll back to previous binary: {rollback}"
            );
        }
        return Err(err).with_context(|| {
            format!(
                "failed to copy {} over {}",
                replacement.display(),
                executable.display()
            )
        });
    }

    info!(backup = %backup.display(), "replaced running binary");
    Ok(SelfReplaceOutcome::Replaced { backup })
}

fn files_equal(left: &Path, right: &Path) -> Result<bool> {
    let open = |path: &Path| {
        File::open(path).with_context(|| format!("failed to open {}", path.display()))
    };
    let mut left_file = open(left)?;
    let mut right_file = open(right)?;
    let left_len = left_file
        .metadata()
        .with_context(|| format!("failed to stat {}", left.display()))?
        .len();
    let right_len = right_file
        .metadata()
        .with_context(|| format!("failed to stat {}", right.display()))?
        .len();
    if left_len != right_len {
        return Ok(false);
    }

    let mut left_buf = vec![0u8; 64 * 1024];
    let mut right_buf = vec![0u8; 64 * 1024];
    loop {
        let read = left_file
            .read(&mut left_buf)
            .with_context(|| format!("failed to read {}", left.display()))?;
        if read == 0 {
            return Ok(true);
        }
        right_file
            .read_exact(&mut right_buf[..read])
            .with_context(|| format!("failed to read {}", right.display()))?;
        if left_buf[..read] != right_buf[..read] {
            return Ok(false);
        }
    }
}
