//! Error codes and error types for store client operations.

use std::ffi::CStr;
use std::fmt;
use std::io;
use thiserror::Error;

/// Result type for store client operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Numeric error code reported by a store client.
///
/// The numbering is shared by the local and remote variants so that a
/// caller can look up a name for any code returned by `last_error`.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ErrorCode {
    /// The last operation succeeded.
    #[default]
    Success = 0,
    /// The operation is not implemented by this client.
    NotImplemented = 1,
    /// Invalid operation or argument (including use after close).
    Invalid = 2,
    /// The backing file or repository does not exist.
    NoRepository = 3,
    /// The store was opened without write permission.
    NoPermission = 4,
    /// The backing file is broken.
    Broken = 5,
    /// The record already exists.
    Duplicate = 6,
    /// The record does not exist.
    NoRecord = 7,
    /// Logical inconsistency, e.g. incrementing a non-numeric record.
    Logic = 8,
    /// Operating system error.
    System = 9,
    /// The remote endpoint could not be reached.
    Network = 10,
    /// The remote endpoint did not answer in time.
    Timeout = 11,
    /// Internal error in the store.
    Internal = 12,
    /// A result did not fit in the capacity offered by the caller.
    Overflow = 13,
    /// Miscellaneous error.
    Misc = 15,
}

impl ErrorCode {
    /// Returns the stable, human readable name of the code.
    pub fn name(self) -> &'static str {
        self.c_name().to_str().unwrap_or("unknown error")
    }

    /// Returns the name as a static NUL-terminated string.
    pub const fn c_name(self) -> &'static CStr {
        match self {
            ErrorCode::Success => c"success",
            ErrorCode::NotImplemented => c"not implemented",
            ErrorCode::Invalid => c"invalid operation",
            ErrorCode::NoRepository => c"file not found",
            ErrorCode::NoPermission => c"no permission",
            ErrorCode::Broken => c"broken file",
            ErrorCode::Duplicate => c"record duplication",
            ErrorCode::NoRecord => c"no record",
            ErrorCode::Logic => c"logical inconsistency",
            ErrorCode::System => c"system error",
            ErrorCode::Network => c"network error",
            ErrorCode::Timeout => c"timeout",
            ErrorCode::Internal => c"internal error",
            ErrorCode::Overflow => c"result overflow",
            ErrorCode::Misc => c"miscellaneous error",
        }
    }

    /// Converts a raw code back into an `ErrorCode`.
    ///
    /// Unknown values map to [`ErrorCode::Misc`].
    pub const fn from_raw(code: i32) -> Self {
        match code {
            0 => ErrorCode::Success,
            1 => ErrorCode::NotImplemented,
            2 => ErrorCode::Invalid,
            3 => ErrorCode::NoRepository,
            4 => ErrorCode::NoPermission,
            5 => ErrorCode::Broken,
            6 => ErrorCode::Duplicate,
            7 => ErrorCode::NoRecord,
            8 => ErrorCode::Logic,
            9 => ErrorCode::System,
            10 => ErrorCode::Network,
            11 => ErrorCode::Timeout,
            12 => ErrorCode::Internal,
            13 => ErrorCode::Overflow,
            _ => ErrorCode::Misc,
        }
    }

    /// Returns the raw numeric value.
    pub const fn as_raw(self) -> i32 {
        self as i32
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Errors reported by a store client.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An I/O error while reading or writing the snapshot.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The snapshot could not be encoded or decoded.
    #[error("snapshot codec error: {0}")]
    Codec(String),

    /// The store was closed; recorded as `Invalid`.
    #[error("store is closed")]
    Closed,

    /// A store-level failure with its error code.
    #[error("{code}: {message}")]
    Store {
        /// Error code recorded as the store's last error.
        code: ErrorCode,
        /// Description of the failure.
        message: String,
    },
}

impl StoreError {
    /// Creates a store error with the given code.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        StoreError::Store {
            code,
            message: message.into(),
        }
    }

    /// Returns the error code this error records.
    pub fn code(&self) -> ErrorCode {
        match self {
            StoreError::Io(_) => ErrorCode::System,
            StoreError::Codec(_) => ErrorCode::Broken,
            StoreError::Closed => ErrorCode::Invalid,
            StoreError::Store { code, .. } => *code,
        }
    }

    /// Returns true if the store had already been closed.
    pub fn is_closed(&self) -> bool {
        matches!(self, StoreError::Closed)
    }

    pub(crate) fn closed() -> Self {
        StoreError::Closed
    }

    pub(crate) fn read_only() -> Self {
        Self::new(
            ErrorCode::NoPermission,
            "store was opened in read-only mode",
        )
    }
}
