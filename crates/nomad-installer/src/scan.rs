use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use nomad_core::Version;
use nomad_resolver::AppState;
use tracing::{debug, trace, warn};

use crate::fs_utils::is_symlink;
use crate::layout::InstallLayout;

const VERSION_SEPARATOR: char = '-';

/// Finds installed applications under the installation root.
///
/// Links are looked at first and always decide the current version of the
/// application they point to. Plain `{app}-{version}` directories only fill
/// in applications without a link, keeping the newest one seen. Only names
/// accepted by `is_known` are reported.
pub fn scan_installed<F>(layout: &InstallLayout, is_known: F) -> Result<BTreeMap<String, AppState>>
where
    F: Fn(&str) -> bool,
{
    let root = layout.root();
    let mut states = BTreeMap::new();
    if !root.exists() {
        debug!(root = %root.display(), "installation root does not exist yet");
        return Ok(states);
    }

    let mut entries = Vec::new();
    for entry in fs::read_dir(root)
        .with_context(|| format!("failed to read installation root: {}", root.display()))?
    {
        let entry = entry
            .with_context(|| format!("failed to read entry in: {}", root.display()))?;
        entries.push(entry.path());
    }
    entries.sort();

    let canonical_root = fs::canonicalize(root)
        .with_context(|| format!("failed to resolve installation root: {}", root.display()))?;

    let mut claimed: BTreeSet<PathBuf> = BTreeSet::new();
    for link in entries.iter().filter(|path| is_symlink(path)) {
        trace!(link = %link.display(), "found link");
        let Some(folder) = link_target_folder(&canonical_root, link) else {
            continue;
        };
        claimed.insert(folder.clone());
        analyze_entry(&folder, true, &is_known, &mut states);
    }

    for dir in entries
        .iter()
        .filter(|path| !is_symlink(path) && path.is_dir())
    {
        let Some(name) = dir.file_name() else {
            continue;
        };
        let folder = PathBuf::from(name);
        if claimed.contains(&folder) {
            trace!(dir = %dir.display(), "already scanned through a link");
            continue;
        }
        analyze_entry(&folder, false, &is_known, &mut states);
    }

    Ok(states)
}

/// Resolves a link to its directory, relative to the installation root.
fn link_target_folder(canonical_root: &Path, link: &Path) -> Option<PathBuf> {
    let target = match fs::canonicalize(link) {
        Ok(target) => target,
        Err(err) => {
            warn!(link = %link.display(), "cannot resolve link: {err}");
            return None;
        }
    };
    if !target.is_dir() {
        warn!(link = %link.display(), target = %target.display(), "link does not point to a directory");
        return None;
    }
    match target.strip_prefix(canonical_root) {
        Ok(relative) if !relative.as_os_str().is_empty() => Some(relative.to_path_buf()),
        _ => {
            warn!(
                link = %link.display(),
                target = %target.display(),
                "link points outside the installation root"
            );
            None
        }
    }
}

fn analyze_entry<F>(
    folder: &Path,
    from_link: bool,
    is_known: &F,
    states: &mut BTreeMap<String, AppState>,
) where
    F: Fn(&str) -> bool,
{
    let Some(dir_name) = folder.file_name().and_then(|name| name.to_str()) else {
        trace!(folder = %folder.display(), "skipping non utf-8 entry");
        return;
    };
    let Some((app, version)) = split_version_dir_name(dir_name, is_known) else {
        trace!(folder = dir_name, "no known application with a version, skipping");
        return;
    };

    let keep_existing = !from_link
        && states.get(app).is_some_and(|existing| {
            existing.symlink_found
                || existing
                    .current_version
                    .as_ref()
                    .is_some_and(|current| current.is_newer_than(&version))
        });
    if keep_existing {
        trace!(app, folder = dir_name, "keeping previously found version");
        return;
    }

    trace!(app, folder = dir_name, from_link, "current version candidate");
    states.insert(
        app.to_string(),
        AppState {
            symlink_found: from_link,
            ..AppState::installed(app, version, folder)
        },
    );
}

/// Splits `{app}-{version}`. Application names and prereleases may both
/// contain the separator, so every separator is tried from the right. The
/// first split with a known application whose suffix is exactly a version
/// wins; otherwise the rightmost known split whose suffix holds a version.
pub(crate) fn split_version_dir_name<'a, F>(dir_name: &'a str, is_known: &F) -> Option<(&'a str, Version)>
where
    F: Fn(&str) -> bool,
{
    let mut loose = None;
    for (index, _) in dir_name.rmatch_indices(VERSION_SEPARATOR) {
        let (app, version_text) = (&dir_name[..index], &dir_name[index + 1..]);
        if app.is_empty() || !is_known(app) {
            continue;
        }
        let version = match Version::parse(version_text) {
            Ok(version) => version,
            Err(err) => {
                trace!(app, version_text, "not a version: {err}");
                continue;
            }
        };
        if version.as_str() == version_text {
            return Some((app, version));
        }
        loose.get_or_insert((app, version));
    }
    loose
}
