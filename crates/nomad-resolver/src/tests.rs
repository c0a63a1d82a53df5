use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Mutex;

use anyhow::{anyhow, Result};
use nomad_core::{AppDefinition, FetchRequest, Transport, Version};

use super::*;

#[derive(Default)]
struct FakeTransport {
    pages: BTreeMap<String, String>,
    requests: Mutex<Vec<FetchRequest>>,
}

impl FakeTransport {
    fn with_page(url: &str, body: &str) -> Self {
        let mut pages = BTreeMap::new();
        pages.insert(url.to_string(), body.to_string());
        Self {
            pages,
            requests: Mutex::new(Vec::new()),
        }
    }

    fn request_count(&self) -> usize {
        self.requests.lock().expect("lock must not be poisoned").len()
    }
}

impl Transport for FakeTransport {
    fn fetch_text(&self, request: &FetchRequest) -> Result<String> {
        self.requests
            .lock()
            .expect("lock must not be poisoned")
            .push(request.clone());
        self.pages
            .get(&request.url)
            .cloned()
            .ok_or_else(|| anyhow!("URL not found: {}", request.url))
    }

    fn download(&self, url: &str, _destination: &Path) -> Result<u64> {
        Err(anyhow!("downloads are not expected here: {url}"))
    }
}

fn version(input: &str) -> Version {
    Version::parse(input).expect("version must parse")
}

fn definition(name: &str, config_version: &str, check_url: Option<&str>) -> AppDefinition {
    let mut definition = AppDefinition::new(name);
    definition.version = config_version.to_string();
    definition.download_url = format!("https://example.test/{name}-{{{{VERSION}}}}.zip");
    if let Some(url) = check_url {
        definition.version_check.url = url.to_string();
        definition.version_check.regex = "release {{VERSION}}".to_string();
    }
    definition
}

fn latest() -> ResolveOptions {
    ResolveOptions {
        prefer_latest: true,
        ..ResolveOptions::default()
    }
}

#[test]
fn target_prefers_override() {
    let forced = version("0.5");
    let target = resolve_target(
        Some(&forced),
        Some(&version("1.0")),
        Some(&version("2.0")),
        Some(&version("1.5")),
    );
    assert_eq!(target, Some(forced));
}

#[test]
fn target_for_fresh_install() {
    let config = version("1.0");
    assert_eq!(
        resolve_target(None, Some(&config), Some(&version("1.2")), None),
        Some(version("1.2"))
    );
    assert_eq!(
        resolve_target(None, Some(&config), Some(&version("0.9")), None),
        Some(config.clone())
    );
    assert_eq!(resolve_target(None, Some(&config), None, None), Some(config));
    assert_eq!(
        resolve_target(None, None, Some(&version("3.1")), None),
        Some(version("3.1"))
    );
}

#[test]
fn target_never_downgrades_from_stale_config() {
    let current = version("2.0");
    assert_eq!(
        resolve_target(None, Some(&version("1.0")), None, Some(&current)),
        Some(current.clone())
    );
    assert_eq!(
        resolve_target(
            None,
            Some(&version("1.0")),
            Some(&version("1.5")),
            Some(&current)
        ),
        Some(current)
    );
}

#[test]
fn target_remote_must_beat_config_and_current() {
    let current = version("1.0");
    assert_eq!(
        resolve_target(
            None,
            Some(&version("1.4")),
            Some(&version("1.2")),
            Some(&current)
        ),
        Some(version("1.4"))
    );
    assert_eq!(
        resolve_target(
            None,
            Some(&version("1.0")),
            Some(&version("1.2")),
            Some(&current)
        ),
        Some(version("1.2"))
    );
}

#[test]
fn status_depends_only_on_versions() {
    let one = version("1.0");
    let two = version("2.0");
    assert_eq!(compute_status(None, Some(&one)), Status::Install);
    assert_eq!(compute_status(Some(&one), Some(&two)), Status::Upgrade);
    assert_eq!(compute_status(Some(&two), Some(&one)), Status::Downgrade);
    assert_eq!(compute_status(Some(&one), Some(&one)), Status::Keep);
    assert_eq!(compute_status(Some(&one), None), Status::NotSet);
}

#[test]
fn fresh_install_without_remote_check() {
    let definitions = BTreeMap::from([("app".to_string(), definition("app", "1.0", None))]);
    let mut states = BTreeMap::from([("app".to_string(), AppState::new("app"))]);
    let transport = FakeTransport::default();

    let warnings = resolve_all(&mut states, &definitions, &latest(), &transport);

    assert!(warnings.is_empty(), "warnings: {warnings:?}");
    let state = &states["app"];
    assert_eq!(state.status, Status::Install);
    assert_eq!(state.target_version, Some(version("1.0")));
    assert_eq!(transport.request_count(), 0);
}

#[test]
fn installed_app_upgrades_to_remote_version() {
    let definitions = BTreeMap::from([(
        "app".to_string(),
        definition("app", "1.0", Some("https://example.test/releases")),
    )]);
    let mut states = BTreeMap::from([(
        "app".to_string(),
        AppState::installed("app", version("1.0"), "app-1.0"),
    )]);
    let transport =
        FakeTransport::with_page("https://example.test/releases", "<li>release 1.2</li>");

    let warnings = resolve_all(&mut states, &definitions, &latest(), &transport);

    assert!(warnings.is_empty(), "warnings: {warnings:?}");
    let state = &states["app"];
    assert_eq!(state.status, Status::Upgrade);
    assert_eq!(state.target_version, Some(version("1.2")));
    assert_eq!(
        state.status_message(),
        "upgrading version from 1.0 >> 1.2"
    );
}

#[test]
fn installed_newer_than_config_is_kept() {
    let definitions = BTreeMap::from([("app".to_string(), definition("app", "1.0", None))]);
    let mut states = BTreeMap::from([(
        "app".to_string(),
        AppState::installed("app", version("2.0"), "app-2.0"),
    )]);

    let warnings = resolve_all(
        &mut states,
        &definitions,
        &latest(),
        &FakeTransport::default(),
    );

    assert!(warnings.is_empty());
    let state = &states["app"];
    assert_eq!(state.status, Status::Keep);
    assert_eq!(state.target_version, Some(version("2.0")));
    assert_eq!(state.success_message(), "successfully kept at version 2.0");
}

#[test]
fn remote_failure_degrades_to_warning() {
    let definitions = BTreeMap::from([
        (
            "broken".to_string(),
            definition("broken", "1.0", Some("https://example.test/missing")),
        ),
        ("fine".to_string(), definition("fine", "3.0", None)),
    ]);
    let mut states = BTreeMap::from([
        ("broken".to_string(), AppState::new("broken")),
        ("fine".to_string(), AppState::new("fine")),
    ]);

    let warnings = resolve_all(
        &mut states,
        &definitions,
        &latest(),
        &FakeTransport::default(),
    );

    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].app, "broken");
    assert!(warnings[0].message.contains("URL not found"));
    assert_eq!(states["broken"].status, Status::Install);
    assert_eq!(states["broken"].target_version, Some(version("1.0")));
    assert_eq!(states["fine"].target_version, Some(version("3.0")));
}

#[test]
fn remote_check_skipped_without_prefer_latest() {
    let definitions = BTreeMap::from([(
        "app".to_string(),
        definition("app", "1.0", Some("https://example.test/releases")),
    )]);
    let mut states = BTreeMap::from([("app".to_string(), AppState::new("app"))]);
    let transport = FakeTransport::with_page("https://example.test/releases", "release 9.0");

    resolve_all(
        &mut states,
        &definitions,
        &ResolveOptions::default(),
        &transport,
    );

    assert_eq!(transport.request_count(), 0);
    assert_eq!(states["app"].target_version, Some(version("1.0")));
}

#[test]
fn remote_check_disabled_per_application() {
    let mut app = definition("app", "1.0", Some("https://example.test/releases"));
    app.version_check.use_latest_version = Some(false);
    let definitions = BTreeMap::from([("app".to_string(), app)]);
    let mut states = BTreeMap::from([("app".to_string(), AppState::new("app"))]);
    let transport = FakeTransport::with_page("https://example.test/releases", "release 9.0");

    resolve_all(&mut states, &definitions, &latest(), &transport);

    assert_eq!(transport.request_count(), 0);
    assert_eq!(states["app"].target_version, Some(version("1.0")));
}

#[test]
fn missing_or_invalid_definitions_are_warnings() {
    let definitions = BTreeMap::from([("bad".to_string(), AppDefinition::new("bad"))]);
    let mut states = BTreeMap::from([
        ("bad".to_string(), AppState::new("bad")),
        ("ghost".to_string(), AppState::new("ghost")),
    ]);

    let warnings = resolve_all(
        &mut states,
        &definitions,
        &latest(),
        &FakeTransport::default(),
    );

    let apps: Vec<_> = warnings.iter().map(|warning| warning.app.as_str()).collect();
    assert_eq!(apps, vec!["bad", "ghost"]);
    assert_eq!(states["bad"].status, Status::NotSet);
}

#[test]
fn self_version_replaces_scanned_version() {
    let mut states = BTreeMap::from([(
        "nomad".to_string(),
        AppState::installed("nomad", version("0.1.0"), "nomad-0.1.0"),
    )]);
    note_self_version(&mut states, "nomad", version("0.3.0"));
    note_self_version(&mut states, "other", version("1.0"));

    assert_eq!(states["nomad"].current_version, Some(version("0.3.0")));
    assert_eq!(states["other"].current_version, Some(version("1.0")));
}
