//! Error taxonomy for psmem.
//!
//! Two classes of failure exist: fatal pre-flight errors that abort the run
//! before any scanning happens, and recoverable per-process errors that only
//! remove a single PID from the report.

use std::io;

/// Fatal errors detected before a scan pass begins.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("no process information filesystem found (checked /proc and /compat/linux/proc)")]
    UnsupportedSystem,

    #[error("root permission required for accurate results")]
    InsufficientPermissions,

    #[error("cannot determine kernel version: {0}")]
    UnknownKernel(String),
}

impl StartupError {
    /// Exit status reported to the shell. Privilege failures and a missing
    /// procfs must be distinguishable to callers.
    pub fn exit_code(&self) -> i32 {
        match self {
            StartupError::InsufficientPermissions => 1,
            StartupError::UnsupportedSystem => 2,
            StartupError::UnknownKernel(_) => 2,
        }
    }
}

/// Recoverable per-process errors. All variants cause the PID to be skipped;
/// none of them may abort the scan pass.
#[derive(Debug, thiserror::Error)]
pub enum ProcError {
    /// The process exited between enumeration and read, or is a kernel
    /// thread without an exe link. Expected, not exceptional.
    #[error("process is gone")]
    Gone,

    #[error("permission denied")]
    PermissionDenied,

    /// The kernel exposed a field layout the parser does not recognize.
    #[error("malformed process data: {0}")]
    Malformed(String),
}

impl From<io::Error> for ProcError {
    fn from(e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::NotFound => ProcError::Gone,
            io::ErrorKind::PermissionDenied => ProcError::PermissionDenied,
            _ => ProcError::Malformed(e.to_string()),
        }
    }
}
