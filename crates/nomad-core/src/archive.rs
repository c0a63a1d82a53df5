pub const DEFAULT_DOWNLOAD_EXTENSION: &str = ".zip";
pub const MANUAL_URL_MARKER: &str = "manual";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveType {
    Zip,
    Exe,
}

impl ArchiveType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Zip => "zip",
            Self::Exe => "exe",
        }
    }

    /// Whether the download has to be unpacked, as opposed to being copied
    /// into the version directory as is.
    pub fn is_archive(self) -> bool {
        matches!(self, Self::Zip)
    }

    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension
            .trim()
            .trim_start_matches('.')
            .to_ascii_lowercase()
            .as_str()
        {
            "zip" => Some(Self::Zip),
            "exe" => Some(Self::Exe),
            _ => None,
        }
    }
}

pub fn is_manual_url(url: &str) -> bool {
    url.starts_with(MANUAL_URL_MARKER)
}

/// Extension of the file a download URL points to, leading dot included.
///
/// Returns `None` for manual URLs, whose extension is only known once the
/// operator has supplied the real address.
pub fn infer_download_extension(url: &str) -> Option<String> {
    if url.is_empty() {
        return Some(DEFAULT_DOWNLOAD_EXTENSION.to_string());
    }
    if is_manual_url(url) {
        return None;
    }

    match url.rfind('.') {
        Some(index) => {
            let tail = &url[index..];
            let extension = tail.split('?').next().unwrap_or(tail);
            Some(extension.to_string())
        }
        None => Some(DEFAULT_DOWNLOAD_EXTENSION.to_string()),
    }
}

/// File name a download URL points to, without query string or fragment.
pub fn url_file_name(url: &str) -> &str {
    let without_fragment = url.split('#').next().unwrap_or(url);
    let without_query = without_fragment
        .split('?')
        .next()
        .unwrap_or(without_fragment);
    without_query.rsplit('/').next().unwrap_or(without_query)
}
