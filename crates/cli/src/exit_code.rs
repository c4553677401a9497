//! Process exit codes
//!
//! Scripts depend on these values; changing one is a breaking change.

use bz_core::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    Success = 0,

    /// Anything without a more specific code, including malformed service replies
    GeneralError = 1,

    /// Bad arguments, malformed path, out-of-range part size
    UsageError = 2,

    /// Transport failure or a 429/5xx that survived retries
    NetworkError = 3,

    /// Rejected key or missing capability
    AuthError = 4,

    /// Alias, bucket or file does not exist
    NotFound = 5,

    /// Alias already exists, or a 409 from the service
    Conflict = 6,

    /// Ctrl+C during a transfer
    Interrupted = 130,
}

impl ExitCode {
    #[inline]
    pub const fn as_i32(self) -> i32 {
        self as i32
    }

    pub const fn from_i32(code: i32) -> Option<Self> {
        match code {
            0 => Some(Self::Success),
            1 => Some(Self::GeneralError),
            2 => Some(Self::UsageError),
            3 => Some(Self::NetworkError),
            4 => Some(Self::AuthError),
            5 => Some(Self::NotFound),
            6 => Some(Self::Conflict),
            130 => Some(Self::Interrupted),
            _ => None,
        }
    }
}

impl From<&Error> for ExitCode {
    fn from(error: &Error) -> Self {
        Self::from_i32(error.exit_code()).unwrap_or(Self::GeneralError)
    }
}
