use std::collections::BTreeMap;
use std::sync::OnceLock;

use anyhow::Context;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::archive::{infer_download_extension, is_manual_url};
use crate::transport::FetchRequest;
use crate::version::{Version, VersionPattern};

pub const GITHUB_PREFIX: &str = "github";
pub const GITHUB_GRAPHQL_URL: &str = "https://api.github.com/graphql";
pub const GITHUB_BASE_URL: &str = "https://github.com/";
pub const GITHUB_TAG_PATTERN: &str = r#""tagName":"[^\d]*{{VERSION}}""#;
pub const VERSION_MARKER_FILE: &str = "VERSION-{{VERSION}}.nomad";
const MATCH_EVERYTHING: &str = "(.*)";

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid definition for '{name}': {}", .problems.join(", "))]
pub struct DefinitionError {
    pub name: String,
    pub problems: Vec<String>,
}

/// Declarative description of one portable application, as written by the
/// user. Field names follow the persisted definition format.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct AppDefinition {
    pub application_name: String,
    pub version: String,
    pub download_url: String,
    pub repository_url: String,
    pub download_extension: String,
    pub version_check: VersionCheck,
    pub symlink: String,
    pub shortcut: String,
    pub shortcut_icon: String,
    #[serde(rename = "ExtractRegExList")]
    pub extract_regex_list: Vec<String>,
    pub create_folders: Vec<String>,
    pub create_files: BTreeMap<String, String>,
    pub no_add_version_file: bool,
    pub move_objects: BTreeMap<String, String>,
    pub restore_files: Vec<String>,
    #[serde(skip)]
    validated: OnceLock<Result<ValidatedDefinition, DefinitionError>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct VersionCheck {
    pub url: String,
    #[serde(rename = "RegEx")]
    pub regex: String,
    pub use_latest_version: Option<bool>,
}

/// A definition with defaults filled in and every pattern compiled.
#[derive(Debug, Clone)]
pub struct ValidatedDefinition {
    pub name: String,
    pub symlink: String,
    pub download_url: String,
    /// `None` while the download URL is a manual placeholder.
    pub download_extension: Option<String>,
    pub config_version: Option<Version>,
    pub remote_check: Option<RemoteCheck>,
    pub extract_filter: Regex,
    pub create_folders: Vec<String>,
    pub create_files: BTreeMap<String, String>,
    pub move_objects: BTreeMap<String, String>,
    pub restore_files: Vec<String>,
    pub shortcut: Option<String>,
    pub shortcut_icon: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RemoteCheck {
    pub url: String,
    pub pattern: VersionPattern,
    pub enabled: bool,
}

impl RemoteCheck {
    pub fn build_request(&self, api_key: Option<&str>) -> FetchRequest {
        let mut request = match self
            .url
            .strip_prefix(GITHUB_PREFIX)
            .and_then(|rest| rest.strip_prefix(':'))
            .and_then(|repo| repo.split_once('/'))
        {
            Some((owner, repo)) => FetchRequest {
                url: GITHUB_GRAPHQL_URL.to_string(),
                body: Some(github_latest_release_query(owner, repo)),
                bearer: None,
            },
            None => FetchRequest::get(self.url.clone()),
        };

        if request.url.contains(GITHUB_PREFIX) {
            request.bearer = api_key
                .map(str::trim)
                .filter(|key| !key.is_empty())
                .map(str::to_string);
        }
        request
    }
}

fn github_latest_release_query(owner: &str, repo: &str) -> String {
    serde_json::json!({
        "query": format!(
            "query{{repository(owner:\"{owner}\", name:\"{repo}\") {{latestRelease{{tagName}}}}}}"
        )
    })
    .to_string()
}

impl AppDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            application_name: name.into(),
            ..Self::default()
        }
    }

    pub fn from_toml_str(input: &str) -> anyhow::Result<Self> {
        toml::from_str(input).context("failed to parse application definition")
    }

    pub fn from_json_str(input: &str) -> anyhow::Result<Self> {
        serde_json::from_str(input).context("failed to parse application definition")
    }

    /// Fills in defaults and compiles patterns. The outcome is computed once
    /// and reused on every later call.
    pub fn validate(&self) -> Result<&ValidatedDefinition, DefinitionError> {
        self.validated
            .get_or_init(|| self.build_validated())
            .as_ref()
            .map_err(Clone::clone)
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }

    fn build_validated(&self) -> Result<ValidatedDefinition, DefinitionError> {
        let mut problems = Vec::new();
        let name = self.application_name.trim().to_string();
        if name.is_empty() {
            problems.push("missing application name".to_string());
        }

        let mut check_url = self.version_check.url.trim().to_string();
        let mut check_regex = self.version_check.regex.clone();
        let mut download_url = self.download_url.trim().to_string();
        if !self.repository_url.trim().is_empty() {
            if let Err(problem) = apply_repository_defaults(
                self.repository_url.trim(),
                &mut check_url,
                &mut check_regex,
                &mut download_url,
            ) {
                problems.push(problem);
            }
        }

        if self.version.trim().is_empty() && check_url.is_empty() {
            problems.push("missing version info (either fixed or by url)".to_string());
        }
        if download_url.is_empty() {
            problems.push("missing download url".to_string());
        }

        let config_version = if self.version.trim().is_empty() {
            None
        } else {
            match Version::parse(self.version.trim()) {
                Ok(version) => Some(version),
                Err(err) => {
                    problems.push(format!("bad version '{}': {err}", self.version));
                    None
                }
            }
        };

        let remote_check = if check_url.is_empty() {
            None
        } else if check_regex.trim().is_empty() {
            problems.push(format!("missing version check pattern for '{check_url}'"));
            None
        } else {
            match VersionPattern::new(&check_regex) {
                Ok(pattern) => Some(RemoteCheck {
                    url: check_url,
                    pattern,
                    enabled: self.version_check.use_latest_version.unwrap_or(true),
                }),
                Err(err) => {
                    problems.push(format!("bad version check pattern: {err}"));
                    None
                }
            }
        };

        let filters: Vec<&str> = if self.extract_regex_list.is_empty() {
            vec![MATCH_EVERYTHING]
        } else {
            self.extract_regex_list.iter().map(String::as_str).collect()
        };
        let extract_filter = match Regex::new(&filters.join("|")) {
            Ok(regex) => Some(regex),
            Err(err) => {
                problems.push(format!(
                    "invalid regex for archive files {filters:?} | {err}"
                ));
                None
            }
        };

        let download_extension = if self.download_extension.trim().is_empty() {
            infer_download_extension(&download_url)
        } else {
            Some(normalize_extension(&self.download_extension))
        };

        let mut create_files = self.create_files.clone();
        if !self.no_add_version_file {
            create_files
                .entry(VERSION_MARKER_FILE.to_string())
                .or_insert_with(|| "{{VERSION}}".to_string());
        }

        let symlink = if self.symlink.trim().is_empty() {
            name.clone()
        } else {
            self.symlink.trim().to_string()
        };

        match extract_filter {
            Some(extract_filter) if problems.is_empty() => Ok(ValidatedDefinition {
                name,
                symlink,
                download_url,
                download_extension,
                config_version,
                remote_check,
                extract_filter,
                create_folders: self.create_folders.clone(),
                create_files,
                move_objects: self.move_objects.clone(),
                restore_files: self.restore_files.clone(),
                shortcut: non_empty(&self.shortcut),
                shortcut_icon: non_empty(&self.shortcut_icon),
            }),
            _ => Err(DefinitionError {
                name: self.application_name.clone(),
                problems,
            }),
        }
    }
}

fn apply_repository_defaults(
    repository_url: &str,
    check_url: &mut String,
    check_regex: &mut String,
    download_url: &mut String,
) -> Result<(), String> {
    let Some((provider, repo_infos)) = repository_url.split_once(':') else {
        return Err(format!(
            "missing repository provider in RepositoryUrl {repository_url}"
        ));
    };
    if provider != GITHUB_PREFIX {
        return Err(format!("unsupported repository provider {provider}"));
    }
    if repo_infos.split_once('/').is_none() {
        return Err(format!(
            "bad github repository info {repo_infos} (missing owner or repo, syntax is github:owner/repo)"
        ));
    }

    if check_url.is_empty() {
        *check_url = format!("{GITHUB_PREFIX}:{repo_infos}");
    }
    if check_regex.trim().is_empty() {
        *check_regex = GITHUB_TAG_PATTERN.to_string();
    }
    if !download_url.starts_with("http") && !is_manual_url(download_url) {
        *download_url = format!("{GITHUB_BASE_URL}{repo_infos}/releases/download/{download_url}");
    }
    Ok(())
}

fn normalize_extension(extension: &str) -> String {
    let trimmed = extension.trim();
    if trimmed.starts_with('.') {
        trimmed.to_string()
    } else {
        format!(".{trimmed}")
    }
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
