use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{self, Read, Seek};
use std::path::{Component, Path, PathBuf};

use nomad_core::ArchiveType;
use regex::Regex;
use thiserror::Error;
use tracing::{debug, trace};
use zip::result::ZipError;
use zip::ZipArchive;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("unsupported archive format '{extension}'")]
    UnsupportedFormat { extension: String },
    #[error("corrupt archive {path}: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: ZipError,
    },
    #[error("failed to extract into {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl ExtractError {
    pub fn is_corrupt(&self) -> bool {
        matches!(self, Self::Corrupt { .. })
    }

    fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Puts a downloaded payload into `target_dir`. Archives are unpacked below
/// their deepest common folder, filtered by `filter`; plain executables are
/// copied as `payload_name`. Returns the number of files written.
pub fn extract_payload(
    payload: &Path,
    extension: &str,
    target_dir: &Path,
    filter: &Regex,
    payload_name: &str,
) -> Result<usize, ExtractError> {
    let archive_type =
        ArchiveType::from_extension(extension).ok_or_else(|| ExtractError::UnsupportedFormat {
            extension: extension.to_string(),
        })?;

    if !archive_type.is_archive() {
        fs::create_dir_all(target_dir).map_err(|err| ExtractError::io(target_dir, err))?;
        let destination = target_dir.join(payload_name);
        fs::copy(payload, &destination).map_err(|err| ExtractError::io(&destination, err))?;
        debug!(file = %destination.display(), "copied {} payload", archive_type.as_str());
        return Ok(1);
    }

    let file = File::open(payload).map_err(|err| ExtractError::io(payload, err))?;
    let mut archive = ZipArchive::new(file).map_err(|source| ExtractError::Corrupt {
        path: payload.to_path_buf(),
        source,
    })?;

    let root = guess_deepest_root_folder(&archive);
    debug!(root = %root.display(), "archive root folder");

    fs::create_dir_all(target_dir).map_err(|err| ExtractError::io(target_dir, err))?;
    copy_filtered(&mut archive, &root, target_dir, filter).map_err(|err| match err {
        ExtractError::Corrupt { source, .. } => ExtractError::Corrupt {
            path: payload.to_path_buf(),
            source,
        },
        other => other,
    })
}

/// Deepest folder that contains every file of the archive, or `.` when the
/// files do not share one.
pub fn guess_deepest_root_folder<R: Read + Seek>(archive: &ZipArchive<R>) -> PathBuf {
    deepest_common_folder(archive.file_names())
}

fn deepest_common_folder<'a>(names: impl Iterator<Item = &'a str>) -> PathBuf {
    let mut file_count = 0usize;
    let mut folder_counts: HashMap<PathBuf, usize> = HashMap::new();

    for name in names.filter(|name| !name.ends_with('/')) {
        let Some(path) = sanitized(name) else {
            continue;
        };
        file_count += 1;
        for ancestor in path.ancestors().skip(1) {
            if ancestor.as_os_str().is_empty() {
                continue;
            }
            *folder_counts.entry(ancestor.to_path_buf()).or_default() += 1;
        }
    }

    folder_counts
        .into_iter()
        .filter(|(_, count)| file_count > 0 && *count == file_count)
        .max_by_key(|(folder, _)| folder.components().count())
        .map(|(folder, _)| folder)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Copies the entries below `root` into `target_dir`. A path is kept only if
/// it and every folder above it (relative to `root`) match `filter`, so a
/// rejected folder drops its whole subtree. Existing files are overwritten.
pub fn copy_filtered<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    root: &Path,
    target_dir: &Path,
    filter: &Regex,
) -> Result<usize, ExtractError> {
    let corrupt = |source| ExtractError::Corrupt {
        path: target_dir.to_path_buf(),
        source,
    };
    let mut copied = 0usize;

    for index in 0..archive.len() {
        let mut entry = archive.by_index(index).map_err(corrupt)?;
        let Some(path) = entry.enclosed_name() else {
            trace!(entry = entry.name(), "skipping entry with unsafe path");
            continue;
        };
        let relative = if root == Path::new(".") {
            path.as_path()
        } else {
            match path.strip_prefix(root) {
                Ok(relative) => relative,
                Err(_) => continue,
            }
        };
        if relative.as_os_str().is_empty() {
            continue;
        }
        if !is_allowed(relative, filter) {
            trace!(entry = %relative.display(), "filtered out");
            continue;
        }

        let destination = target_dir.join(relative);
        if entry.is_dir() {
            fs::create_dir_all(&destination)
                .map_err(|err| ExtractError::io(&destination, err))?;
            continue;
        }

        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent).map_err(|err| ExtractError::io(parent, err))?;
        }
        let mut output =
            File::create(&destination).map_err(|err| ExtractError::io(&destination, err))?;
        io::copy(&mut entry, &mut output).map_err(|err| ExtractError::io(&destination, err))?;
        if let Some(mode) = entry.unix_mode() {
            apply_mode(&destination, mode).map_err(|err| ExtractError::io(&destination, err))?;
        }
        copied += 1;
    }

    debug!(files = copied, target = %target_dir.display(), "archive extracted");
    Ok(copied)
}

#[cfg(unix)]
fn apply_mode(path: &Path, mode: u32) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let permissions = mode & 0o777;
    if permissions == 0 {
        return Ok(());
    }
    fs::set_permissions(path, fs::Permissions::from_mode(permissions))
}

#[cfg(not(unix))]
fn apply_mode(_path: &Path, _mode: u32) -> io::Result<()> {
    Ok(())
}

fn is_allowed(relative: &Path, filter: &Regex) -> bool {
    relative
        .ancestors()
        .filter(|ancestor| !ancestor.as_os_str().is_empty())
        .all(|ancestor| filter.is_match(&slash_path(ancestor)))
}

fn slash_path(path: &Path) -> String {
    path.components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

fn sanitized(name: &str) -> Option<PathBuf> {
    let path = Path::new(name);
    path.components()
        .all(|component| matches!(component, Component::Normal(_) | Component::CurDir))
        .then(|| {
            path.components()
                .filter(|component| matches!(component, Component::Normal(_)))
                .collect()
        })
}
