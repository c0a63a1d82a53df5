use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use nomad_core::AppDefinition;
use serde::Deserialize;
use tracing::{debug, trace, warn};

pub const DEFAULT_DEFINITIONS_DIR: &str = "app-definitions";

#[derive(Debug, Default, Deserialize)]
struct DefinitionTable {
    #[serde(default)]
    apps: BTreeMap<String, AppDefinition>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DefinitionFormat {
    Toml,
    Json,
}

impl DefinitionFormat {
    fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()? {
            "toml" => Some(Self::Toml),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// Definitions merged from several sources. The first definition seen for a
/// name is kept; later ones are ignored.
#[derive(Debug, Clone, Default)]
pub struct DefinitionSet {
    definitions: BTreeMap<String, AppDefinition>,
}

impl DefinitionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false when a definition with the same name was already there.
    pub fn insert(&mut self, definition: AppDefinition, origin: &str) -> bool {
        let name = definition.application_name.trim().to_string();
        if name.is_empty() {
            warn!(origin, "definition without application name, skipping");
            return false;
        }
        match self.definitions.entry(name) {
            Entry::Occupied(existing) => {
                debug!(app = %existing.key(), origin, "already defined, keeping first definition");
                false
            }
            Entry::Vacant(slot) => {
                trace!(app = %slot.key(), origin, "definition added");
                slot.insert(definition);
                true
            }
        }
    }

    /// Adds `[apps.<name>]` tables. The table key names definitions that do
    /// not carry their own application name.
    pub fn extend_tables(&mut self, apps: BTreeMap<String, AppDefinition>, origin: &str) -> usize {
        let mut added = 0;
        for (key, mut definition) in apps {
            if definition.application_name.trim().is_empty() {
                definition.application_name = key;
            }
            if self.insert(definition, origin) {
                added += 1;
            }
        }
        added
    }

    pub fn load_toml_str(&mut self, content: &str, origin: &str) -> Result<usize> {
        let table: DefinitionTable = toml::from_str(content)
            .with_context(|| format!("failed parsing definitions: {origin}"))?;
        Ok(self.extend_tables(table.apps, origin))
    }

    pub fn load_json_str(&mut self, content: &str, origin: &str) -> Result<usize> {
        let definition = AppDefinition::from_json_str(content)
            .with_context(|| format!("failed parsing definition: {origin}"))?;
        Ok(usize::from(self.insert(definition, origin)))
    }

    /// Loads every `*.toml` and `*.json` file of `dir` in file name order.
    /// Files that cannot be read or parsed are logged and skipped. A missing
    /// directory contributes nothing.
    pub fn load_dir(&mut self, dir: &Path) -> Result<usize> {
        if !dir.is_dir() {
            debug!(dir = %dir.display(), "no definitions directory");
            return Ok(0);
        }

        let mut files: Vec<PathBuf> = fs::read_dir(dir)
            .with_context(|| format!("failed reading definitions directory: {}", dir.display()))?
            .filter_map(|entry| entry.ok().map(|entry| entry.path()))
            .filter(|path| path.is_file())
            .collect();
        files.sort();

        let mut added = 0;
        for path in files {
            let Some(format) = DefinitionFormat::from_path(&path) else {
                trace!(file = %path.display(), "not a definition file");
                continue;
            };
            match self.load_file(&path, format) {
                Ok(count) => added += count,
                Err(err) => warn!(file = %path.display(), "skipping definitions: {err:#}"),
            }
        }
        Ok(added)
    }

    fn load_file(&mut self, path: &Path, format: DefinitionFormat) -> Result<usize> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed reading definitions: {}", path.display()))?;
        let origin = path.display().to_string();
        match format {
            DefinitionFormat::Toml => self.load_toml_str(&content, &origin),
            DefinitionFormat::Json => self.load_json_str(&content, &origin),
        }
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    pub fn into_map(self) -> BTreeMap<String, AppDefinition> {
        self.definitions
    }
}
