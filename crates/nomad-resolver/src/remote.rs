use anyhow::{Context, Result};
use nomad_core::{RemoteCheck, Transport, Version};
use tracing::debug;

pub fn discover_remote_version(
    check: &RemoteCheck,
    transport: &dyn Transport,
    api_key: Option<&str>,
) -> Result<Version> {
    let request = check.build_request(api_key);
    debug!(url = %request.url, post = request.body.is_some(), "checking remote version");

    let page = transport
        .fetch_text(&request)
        .with_context(|| format!("failed to fetch version page {}", check.url))?;
    let version = check
        .pattern
        .parse(&page)
        .with_context(|| format!("failed to find a version in {}", check.url))?;

    debug!(version = %version, "remote version found");
    Ok(version)
}
