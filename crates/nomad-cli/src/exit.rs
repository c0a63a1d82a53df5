use std::process::ExitCode;

use nomad_installer::ExitClass;

pub const BAD_VERSION_OVERRIDE: u8 = 41;

pub fn exit_code(class: ExitClass) -> u8 {
    match class {
        ExitClass::Success => 0,
        ExitClass::InvalidDefinition => 51,
        ExitClass::AbortedByUser => 52,
        ExitClass::DownloadOrExtract => 53,
        ExitClass::Relink => 58,
        ExitClass::Shortcut => 59,
        ExitClass::UnknownApplication => 68,
    }
}

pub fn exit_with(class: ExitClass) -> ExitCode {
    ExitCode::from(exit_code(class))
}
