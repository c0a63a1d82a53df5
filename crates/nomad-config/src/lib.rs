mod definitions;
mod settings;

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use nomad_core::AppDefinition;
use tracing::debug;

pub use definitions::{DefinitionSet, DEFAULT_DEFINITIONS_DIR};
pub use settings::{Settings, DEFAULT_SETTINGS_FILE, GITHUB_TOKEN_ENV};

/// Settings plus every definition available to a run.
#[derive(Debug, Clone, Default)]
pub struct Configuration {
    pub settings: Settings,
    pub definitions: BTreeMap<String, AppDefinition>,
}

/// Reads the settings file, then merges definitions from the settings file,
/// the definitions directory and `builtin` (TOML), in that order of
/// precedence.
pub fn load_configuration(
    settings_path: &Path,
    definitions_dir: &Path,
    builtin: &str,
) -> Result<Configuration> {
    let settings = Settings::load(settings_path)?;

    let mut definitions = DefinitionSet::new();
    let from_settings =
        definitions.extend_tables(settings.apps.clone(), &settings_path.display().to_string());
    let from_dir = definitions.load_dir(definitions_dir)?;
    let from_builtin = definitions
        .load_toml_str(builtin, "built-in definitions")
        .context("built-in definitions are malformed")?;
    debug!(
        from_settings,
        from_dir,
        from_builtin,
        total = definitions.len(),
        "definitions loaded"
    );

    Ok(Configuration {
        settings,
        definitions: definitions.into_map(),
    })
}
