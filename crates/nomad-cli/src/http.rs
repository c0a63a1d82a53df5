use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use nomad_core::{url_file_name, FetchRequest, Transport};
use nomad_installer::remove_file_if_exists;
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE};
use reqwest::StatusCode;
use tracing::{debug, trace};

const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";
const BROWSER_ACCEPT: &str =
    "text/html,application/xhtml+xml,application/xml;q=0.9,application/json;q=0.9,*/*;q=0.8";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const CHUNK_SIZE: usize = 64 * 1024;
const REDACTED: &str = "<redacted>";

/// Blocking HTTP access for version pages and downloads.
pub struct HttpTransport {
    client: Client,
    show_progress: bool,
}

impl HttpTransport {
    pub fn new(show_progress: bool) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(BROWSER_ACCEPT));
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.5"));
        let client = Client::builder()
            .user_agent(BROWSER_USER_AGENT)
            .default_headers(headers)
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(Option::<Duration>::None)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            client,
            show_progress,
        })
    }

    fn send(&self, builder: RequestBuilder, url: &str, secret: Option<&str>) -> Result<Response> {
        let response = builder
            .send()
            .map_err(|err| anyhow!(redact(&format!("request to {url} failed: {err}"), secret)))?;
        check_status(response.status(), url)?;
        Ok(response)
    }

    fn progress_bar(&self, total: Option<u64>, label: &str) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }
        let progress_bar = match total {
            Some(total) => {
                let progress_bar = ProgressBar::new(total);
                if let Ok(style) = ProgressStyle::with_template(
                    "{msg:<24} [{bar:30.cyan/blue}] {bytes:>10}/{total_bytes:10} {bytes_per_sec}",
                ) {
                    progress_bar.set_style(style.progress_chars("=>-"));
                }
                progress_bar
            }
            None => {
                let progress_bar = ProgressBar::new_spinner();
                if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg:<24} {bytes}") {
                    progress_bar.set_style(style);
                }
                progress_bar
            }
        };
        progress_bar.set_message(label.to_string());
        progress_bar
    }

    fn download_to(&self, url: &str, part_path: &Path) -> Result<u64> {
        let mut response = self.send(self.client.get(url), url, None)?;
        let total = response.content_length();
        debug!(url, bytes = ?total, "download started");

        let mut file = File::create(part_path)
            .with_context(|| format!("failed to create {}", part_path.display()))?;
        let progress_bar = self.progress_bar(total, url_file_name(url));
        let mut buffer = vec![0u8; CHUNK_SIZE];
        let mut written = 0u64;
        loop {
            let read = match response.read(&mut buffer) {
                Ok(read) => read,
                Err(err) => {
                    progress_bar.abandon();
                    return Err(err).with_context(|| format!("download of {url} interrupted"));
                }
            };
            if read == 0 {
                break;
            }
            file.write_all(&buffer[..read])
                .with_context(|| format!("failed to write {}", part_path.display()))?;
            written += read as u64;
            progress_bar.set_position(written);
        }
        file.flush()
            .with_context(|| format!("failed to flush {}", part_path.display()))?;
        progress_bar.finish_and_clear();
        Ok(written)
    }
}

impl Transport for HttpTransport {
    fn fetch_text(&self, request: &FetchRequest) -> Result<String> {
        let builder = match &request.body {
            Some(body) => self.client.post(&request.url).body(body.clone()),
            None => self.client.get(&request.url),
        };
        let builder = match &request.bearer {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        };
        let secret = request.bearer.as_deref();

        trace!(url = %request.url, post = request.body.is_some(), "fetching version page");
        let response = self.send(builder, &request.url, secret)?;
        response.text().map_err(|err| {
            anyhow!(redact(
                &format!("failed to read response from {}: {err}", request.url),
                secret
            ))
        })
    }

    fn download(&self, url: &str, destination: &Path) -> Result<u64> {
        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create download dir: {}", parent.display()))?;
        }
        let part_path = part_path(destination);

        let result = self.download_to(url, &part_path);
        let written = match result {
            Ok(written) => written,
            Err(err) => {
                let _ = remove_file_if_exists(&part_path);
                return Err(err);
            }
        };

        remove_file_if_exists(destination)
            .with_context(|| format!("failed to replace {}", destination.display()))?;
        fs::rename(&part_path, destination).with_context(|| {
            format!(
                "failed to move download into place: {}",
                destination.display()
            )
        })?;
        Ok(written)
    }
}

pub fn check_status(status: StatusCode, url: &str) -> Result<()> {
    if status == StatusCode::NOT_FOUND {
        return Err(anyhow!("URL not found: {url}"));
    }
    if !status.is_success() {
        return Err(anyhow!("request to {url} failed with status {status}"));
    }
    Ok(())
}

/// Removes the credential from text that may end up in logs.
pub fn redact(message: &str, secret: Option<&str>) -> String {
    match secret {
        Some(secret) if !secret.is_empty() => message.replace(secret, REDACTED),
        _ => message.to_string(),
    }
}

pub fn part_path(destination: &Path) -> PathBuf {
    let mut part = destination.as_os_str().to_os_string();
    part.push(".part");
    PathBuf::from(part)
}
