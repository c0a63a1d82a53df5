use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use nomad_installer::{ShortcutCreator, ShortcutRequest};
use tracing::debug;

/// Creates desktop shortcuts the way the host platform expects: a symlink on
/// Unix, a `.lnk` written by a generated `wscript` script on Windows.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlatformShortcuts;

impl ShortcutCreator for PlatformShortcuts {
    fn create(&self, request: &ShortcutRequest) -> Result<()> {
        create_platform_shortcut(request)
    }
}

pub fn shortcut_file_name(request: &ShortcutRequest) -> Result<String> {
    Path::new(&request.name)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .map(str::to_string)
        .ok_or_else(|| anyhow!("shortcut name '{}' has no file name", request.name))
}

#[cfg(unix)]
fn create_platform_shortcut(request: &ShortcutRequest) -> Result<()> {
    use nomad_installer::remove_file_if_exists;

    let link = request.destination_dir.join(shortcut_file_name(request)?);
    remove_file_if_exists(&link)
        .with_context(|| format!("failed to replace shortcut {}", link.display()))?;
    std::os::unix::fs::symlink(&request.target, &link).with_context(|| {
        format!(
            "failed to link {} -> {}",
            link.display(),
            request.target.display()
        )
    })?;
    debug!(shortcut = %link.display(), "shortcut created");
    Ok(())
}

#[cfg(windows)]
fn create_platform_shortcut(request: &ShortcutRequest) -> Result<()> {
    use std::fs;
    use std::process::Command;

    let script_path = std::env::temp_dir().join(format!(
        "nomad-shortcut-{}-{}.vbs",
        std::process::id(),
        shortcut_file_name(request)?
    ));
    fs::write(&script_path, shortcut_script(request)?)
        .with_context(|| format!("failed to write {}", script_path.display()))?;
    let status = Command::new("wscript")
        .arg("//nologo")
        .arg(&script_path)
        .status()
        .context("failed to start wscript");
    let _ = fs::remove_file(&script_path);
    let status = status?;
    if !status.success() {
        return Err(anyhow!("wscript exited with {status}"));
    }
    debug!(shortcut = %request.name, "shortcut created");
    Ok(())
}

#[cfg(not(any(unix, windows)))]
fn create_platform_shortcut(request: &ShortcutRequest) -> Result<()> {
    Err(anyhow!(
        "shortcuts are not supported on this platform ({})",
        request.name
    ))
}

#[cfg_attr(not(windows), allow(dead_code))]
pub fn shortcut_link_path(request: &ShortcutRequest) -> Result<PathBuf> {
    Ok(request
        .destination_dir
        .join(format!("{}.lnk", shortcut_file_name(request)?)))
}

/// VBScript that writes the `.lnk` file for `request`.
#[cfg_attr(not(windows), allow(dead_code))]
pub fn shortcut_script(request: &ShortcutRequest) -> Result<String> {
    let link = shortcut_link_path(request)?;
    let mut script = String::from("Set shell = WScript.CreateObject(\"WScript.Shell\")\n");
    script.push_str(&format!(
        "Set link = shell.CreateShortcut(\"{}\")\n",
        escape_vbs(&link)
    ));
    script.push_str(&format!(
        "link.TargetPath = \"{}\"\n",
        escape_vbs(&request.target)
    ));
    script.push_str(&format!(
        "link.WorkingDirectory = \"{}\"\n",
        escape_vbs(&request.working_dir)
    ));
    script.push_str(&format!(
        "link.Description = \"{}\"\n",
        request.description.replace('"', "\"\"")
    ));
    if let Some(icon) = &request.icon {
        script.push_str(&format!("link.IconLocation = \"{}\"\n", escape_vbs(icon)));
    }
    script.push_str("link.Save\n");
    Ok(script)
}

#[cfg_attr(not(windows), allow(dead_code))]
fn escape_vbs(path: &Path) -> String {
    path.display().to_string().replace('"', "\"\"")
}
