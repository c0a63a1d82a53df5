use std::collections::BTreeMap;
use std::thread;

use nomad_core::{AppDefinition, Transport, ValidatedDefinition, Version};
use tracing::{debug, info_span, warn};

use crate::remote::discover_remote_version;
use crate::types::{AppState, ResolveOptions, ResolveWarning, Status};

/// Combines the available version signals into the version to end up with.
///
/// An override always wins. Otherwise a remote version is taken only when it
/// is newer than the configured one and, once installed, newer than the
/// current one too. An installed application is never moved back because of
/// a stale configured version.
pub fn resolve_target(
    override_version: Option<&Version>,
    config: Option<&Version>,
    remote: Option<&Version>,
    current: Option<&Version>,
) -> Option<Version> {
    if let Some(forced) = override_version {
        return Some(forced.clone());
    }

    let remote_beats_config =
        |remote: &Version| config.map_or(true, |config| remote.is_newer_than(config));

    let target = match current {
        None => match remote {
            Some(remote) if remote_beats_config(remote) => Some(remote),
            _ => config,
        },
        Some(current) => match (remote, config) {
            (Some(remote), _) if remote_beats_config(remote) && remote.is_newer_than(current) => {
                Some(remote)
            }
            (_, Some(config)) if config.is_newer_than(current) => Some(config),
            _ => Some(current),
        },
    };
    target.cloned()
}

pub fn compute_status(current: Option<&Version>, target: Option<&Version>) -> Status {
    match (current, target) {
        (_, None) => Status::NotSet,
        (None, Some(_)) => Status::Install,
        (Some(current), Some(target)) if target.is_newer_than(current) => Status::Upgrade,
        (Some(current), Some(target)) if current.is_newer_than(target) => Status::Downgrade,
        _ => Status::Keep,
    }
}

/// Resolves one application in place. A failed remote check only drops the
/// remote signal and comes back as a warning.
pub fn resolve_app(
    state: &mut AppState,
    definition: &ValidatedDefinition,
    options: &ResolveOptions,
    transport: &dyn Transport,
) -> Option<ResolveWarning> {
    let mut warning = None;

    let remote = match &definition.remote_check {
        Some(check) if options.prefer_latest && options.override_version.is_none() => {
            if check.enabled {
                match discover_remote_version(check, transport, options.api_key.as_deref()) {
                    Ok(version) => Some(version),
                    Err(err) => {
                        warn!("remote version check failed: {err:#}");
                        warning = Some(ResolveWarning {
                            app: state.name.clone(),
                            message: format!("{err:#}"),
                        });
                        None
                    }
                }
            } else {
                debug!("remote version check disabled for this application");
                None
            }
        }
        _ => None,
    };

    state.target_version = resolve_target(
        options.override_version.as_ref(),
        definition.config_version.as_ref(),
        remote.as_ref(),
        state.current_version.as_ref(),
    );
    state.status = compute_status(state.current_version.as_ref(), state.target_version.as_ref());
    debug!(
        target = state.target_version.as_ref().map_or("<none>", Version::as_str),
        status = %state.status,
        "target version resolved"
    );
    warning
}

/// Resolves every state that has a definition, one thread per application.
/// Each thread only touches its own state.
pub fn resolve_all(
    states: &mut BTreeMap<String, AppState>,
    definitions: &BTreeMap<String, AppDefinition>,
    options: &ResolveOptions,
    transport: &dyn Transport,
) -> Vec<ResolveWarning> {
    thread::scope(|scope| {
        let handles: Vec<_> = states
            .values_mut()
            .map(|state| {
                let definition = definitions.get(&state.name);
                let app = state.name.clone();
                let handle = scope.spawn(move || {
                    let span = info_span!("app", name = %state.name);
                    let _guard = span.enter();

                    let Some(definition) = definition else {
                        return Some(ResolveWarning {
                            app: state.name.clone(),
                            message: "no definition for this application".to_string(),
                        });
                    };
                    match definition.validate() {
                        Ok(validated) => resolve_app(state, validated, options, transport),
                        Err(err) => Some(ResolveWarning {
                            app: state.name.clone(),
                            message: err.to_string(),
                        }),
                    }
                });
                (app, handle)
            })
            .collect();

        handles
            .into_iter()
            .filter_map(|(app, handle)| match handle.join() {
                Ok(warning) => warning,
                Err(_) => Some(ResolveWarning {
                    app,
                    message: "version resolution panicked".to_string(),
                }),
            })
            .collect()
    })
}

/// Records the running binary's version as the installed version of the
/// tool itself, whatever the scan found.
pub fn note_self_version(states: &mut BTreeMap<String, AppState>, name: &str, version: Version) {
    let state = states
        .entry(name.to_string())
        .or_insert_with(|| AppState::new(name));
    state.current_version = Some(version);
}
