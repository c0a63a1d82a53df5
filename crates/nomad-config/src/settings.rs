use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use nomad_core::AppDefinition;
use serde::Deserialize;
use tracing::debug;

pub const DEFAULT_SETTINGS_FILE: &str = "nomad.toml";
pub const GITHUB_TOKEN_ENV: &str = "GITHUB_PAT";

/// Operator settings, read from an optional TOML file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Applications processed when none is requested explicitly.
    pub myapps: Vec<String>,
    pub github_api_key: Option<String>,
    pub archives_directory: Option<PathBuf>,
    pub apps: BTreeMap<String, AppDefinition>,
}

impl Settings {
    /// A missing file yields default settings.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(settings = %path.display(), "no settings file, using defaults");
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("failed reading settings: {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("failed parsing settings: {}", path.display()))
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// The settings key wins over the environment value.
    pub fn resolve_api_key(&self, env_value: Option<String>) -> Option<String> {
        non_blank(self.github_api_key.clone()).or_else(|| non_blank(env_value))
    }

    pub fn api_key(&self) -> Option<String> {
        self.resolve_api_key(std::env::var(GITHUB_TOKEN_ENV).ok())
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
