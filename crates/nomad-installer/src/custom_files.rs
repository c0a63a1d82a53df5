use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use nomad_core::Version;
use tracing::{debug, trace};
use walkdir::WalkDir;

use crate::fs_utils::{join_within, move_aside};
use crate::layout::current_unix_timestamp;

/// Values substituted into declared file names and contents.
#[derive(Debug, Clone, Copy)]
pub struct TemplateContext<'a> {
    pub version: &'a Version,
    /// Absolute path of the version directory.
    pub app_path: &'a Path,
    /// Absolute path of the stable link.
    pub app_path_generic: &'a Path,
}

impl TemplateContext<'_> {
    pub fn render(&self, template: &str) -> String {
        self.version
            .fill_placeholders(template)
            .replace("{{APP_PATH_GENERIC}}", &self.app_path_generic.to_string_lossy())
            .replace("{{APP_PATH}}", &self.app_path.to_string_lossy())
    }
}

/// Copies the listed files and folders from the previous version directory
/// into the new one. Anything already at a destination is first renamed
/// aside with a timestamp suffix.
pub fn restore_files(entries: &[String], previous_dir: &Path, new_dir: &Path) -> Vec<anyhow::Error> {
    let mut failures = Vec::new();
    if entries.is_empty() {
        return failures;
    }
    if !previous_dir.is_dir() {
        debug!(source = %previous_dir.display(), "missing restore source, nothing to restore");
        return failures;
    }
    if !new_dir.is_dir() {
        debug!(destination = %new_dir.display(), "missing restore destination, nothing to restore");
        return failures;
    }

    for entry in entries {
        let source = match join_within(previous_dir, entry) {
            Ok(source) => source,
            Err(err) => {
                failures.push(err);
                continue;
            }
        };
        if !source.exists() {
            failures.push(anyhow!(
                "{} does not exist, skipping restore",
                source.display()
            ));
            continue;
        }

        if source.is_dir() {
            for walked in WalkDir::new(&source) {
                let walked = match walked {
                    Ok(walked) => walked,
                    Err(err) => {
                        failures.push(anyhow::Error::new(err).context(format!(
                            "failed to walk restore source {}",
                            source.display()
                        )));
                        continue;
                    }
                };
                if walked.file_type().is_dir() {
                    continue;
                }
                let Ok(relative) = walked.path().strip_prefix(previous_dir) else {
                    continue;
                };
                if let Err(err) = restore_file(walked.path(), &new_dir.join(relative)) {
                    failures.push(err);
                }
            }
        } else if let Err(err) = restore_file(&source, &new_dir.join(entry)) {
            failures.push(err);
        }
    }
    failures
}

fn restore_file(source: &Path, destination: &Path) -> Result<()> {
    trace!(source = %source.display(), destination = %destination.display(), "restoring");
    if destination.symlink_metadata().is_ok() {
        let backup = move_aside(destination, &format!("-{}", current_unix_timestamp()?))?;
        debug!(backup = %backup.display(), "backed up existing file");
    }
    if let Some(parent) = destination.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory: {}", parent.display()))?;
    }
    fs::copy(source, destination).with_context(|| {
        format!(
            "failed to restore {} into {}",
            source.display(),
            destination.display()
        )
    })?;
    debug!(source = %source.display(), "restored");
    Ok(())
}

pub fn create_folders(folders: &[String], dir: &Path) -> Vec<anyhow::Error> {
    folders
        .iter()
        .filter_map(|folder| {
            let path = match join_within(dir, folder) {
                Ok(path) => path,
                Err(err) => return Some(err),
            };
            fs::create_dir_all(&path)
                .with_context(|| format!("failed to create directory: {}", path.display()))
                .err()
        })
        .collect()
}

/// Writes declared files. Files that already exist are left alone so user
/// edits survive a refresh.
pub fn write_files(
    files: &BTreeMap<String, String>,
    dir: &Path,
    context: &TemplateContext<'_>,
) -> Vec<anyhow::Error> {
    files
        .iter()
        .filter_map(|(name, body)| write_file(dir, &context.render(name), &context.render(body)).err())
        .collect()
}

fn write_file(dir: &Path, name: &str, content: &str) -> Result<()> {
    let path = join_within(dir, name)?;
    if path.exists() {
        debug!(file = %path.display(), "already in destination, skipping");
        return Ok(());
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory: {}", parent.display()))?;
    }
    fs::write(&path, content).with_context(|| format!("failed to write {}", path.display()))?;
    trace!(file = %path.display(), "file written");
    Ok(())
}

/// Renames `source -> destination` pairs inside the version directory.
pub fn move_objects(moves: &BTreeMap<String, String>, dir: &Path) -> Vec<anyhow::Error> {
    moves
        .iter()
        .filter_map(|(source, destination)| move_object(dir, source, destination).err())
        .collect()
}

fn move_object(dir: &Path, source: &str, destination: &str) -> Result<PathBuf> {
    let from = join_within(dir, source)?;
    let to = join_within(dir, destination)?;
    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory: {}", parent.display()))?;
    }
    fs::rename(&from, &to)
        .with_context(|| format!("failed to move {} to {}", from.display(), to.display()))?;
    Ok(to)
}
