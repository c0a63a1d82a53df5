use std::path::Path;

use anyhow::Result;

/// A text request against a remote version source. A body turns it into a
/// POST.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub url: String,
    pub body: Option<String>,
    pub bearer: Option<String>,
}

impl FetchRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            body: None,
            bearer: None,
        }
    }
}

/// Network access used by version discovery and by the download step.
pub trait Transport: Send + Sync {
    fn fetch_text(&self, request: &FetchRequest) -> Result<String>;

    /// Downloads `url` into `destination`, returning the number of bytes
    /// written.
    fn download(&self, url: &str, destination: &Path) -> Result<u64>;
}
