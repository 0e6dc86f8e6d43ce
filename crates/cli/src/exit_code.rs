//! Process exit codes
//!
//! Scripts can rely on these values; do not renumber existing variants.

/// Exit status of a `jam` invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    Success = 0,
    GeneralError = 1,
    /// Bad arguments, unreadable local paths, invalid configuration
    UsageError = 2,
    NetworkError = 3,
    AuthError = 4,
    NotFound = 5,
    /// The command finished but some operations failed
    PartialFailure = 6,
}

impl ExitCode {
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    pub fn from_i32(code: i32) -> Option<Self> {
        match code {
            0 => Some(ExitCode::Success),
            1 => Some(ExitCode::GeneralError),
            2 => Some(ExitCode::UsageError),
            3 => Some(ExitCode::NetworkError),
            4 => Some(ExitCode::AuthError),
            5 => Some(ExitCode::NotFound),
            6 => Some(ExitCode::PartialFailure),
            _ => None,
        }
    }

    /// Exit code for a library error
    pub fn from_error(error: &jam_core::Error) -> Self {
        ExitCode::from_i32(error.exit_code()).unwrap_or(ExitCode::GeneralError)
    }

    /// Exit code for CLI plumbing errors, looking for a library error in the chain
    pub fn from_anyhow(error: &anyhow::Error) -> Self {
        error
            .chain()
            .find_map(|cause| cause.downcast_ref::<jam_core::Error>())
            .map(Self::from_error)
            .unwrap_or(ExitCode::GeneralError)
    }
}

impl From<ExitCode> for std::process::ExitCode {
    fn from(code: ExitCode) -> Self {
        std::process::ExitCode::from(code.as_i32() as u8)
    }
}
