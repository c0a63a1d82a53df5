mod remote;
mod resolve;
mod types;

pub use remote::discover_remote_version;
pub use resolve::{compute_status, note_self_version, resolve_all, resolve_app, resolve_target};
pub use types::{AppState, ResolveOptions, ResolveWarning, Status};

#[cfg(test)]
mod tests;
