mod custom_files;
mod extract;
mod fs_utils;
mod layout;
mod lifecycle;
mod relink;
mod scan;

pub use custom_files::{create_folders, move_objects, restore_files, write_files, TemplateContext};
pub use extract::{copy_filtered, extract_payload, guess_deepest_root_folder, ExtractError};
pub use fs_utils::remove_file_if_exists;
pub use layout::{
    current_unix_timestamp, InstallLayout, DEFAULT_APPS_ROOT, DEFAULT_ARCHIVES_SUBDIR,
    DEFAULT_SHORTCUTS_DIR,
};
pub use lifecycle::{
    is_affirmative, AppOutcome, AppReport, AssumeYes, ExitClass, Lifecycle, LifecycleError,
    LifecycleOptions, Prompter, RunReport, SelfBinary, ShortcutCreator, ShortcutRequest,
};
pub use relink::{relink, replace_self_binary, RelinkOutcome, SelfReplaceOutcome};
pub use scan::scan_installed;
