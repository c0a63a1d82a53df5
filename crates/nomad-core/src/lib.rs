mod archive;
mod definition;
mod transport;
mod version;

pub use archive::{
    infer_download_extension, is_manual_url, url_file_name, ArchiveType,
    DEFAULT_DOWNLOAD_EXTENSION, MANUAL_URL_MARKER,
};
pub use definition::{
    AppDefinition, DefinitionError, RemoteCheck, ValidatedDefinition, VersionCheck,
    GITHUB_BASE_URL, GITHUB_GRAPHQL_URL, GITHUB_TAG_PATTERN, VERSION_MARKER_FILE,
};
pub use transport::{FetchRequest, Transport};
pub use version::{Version, VersionError, VersionPattern, VERSION_PLACEHOLDER};

#[cfg(test)]
mod tests;
