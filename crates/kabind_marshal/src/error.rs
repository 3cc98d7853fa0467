//! Error types for marshaling operations.

use kabind_client::{ErrorCode, StoreError};
use thiserror::Error;

/// Result type for marshaling operations.
pub type MarshalResult<T> = Result<T, MarshalError>;

/// Errors that can occur while marshaling a bulk result.
#[derive(Debug, Error)]
pub enum MarshalError {
    /// The native store call failed. The container, if any, holds no data.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// The native layer reported more results than the capacity it was
    /// handed. The reported count is never clamped.
    #[error("{operation} reported {reported} results with capacity {capacity}")]
    ProtocolViolation {
        /// The adapter that detected the violation.
        operation: &'static str,
        /// Count reported by the native layer.
        reported: usize,
        /// Capacity handed to the native layer.
        capacity: usize,
    },

    /// A key/value result came back with an odd number of slots.
    #[error("{operation} reported {reported} slots, expected key/value pairs")]
    UnpairedResult {
        /// The adapter that detected the violation.
        operation: &'static str,
        /// Count reported by the native layer.
        reported: usize,
    },

    /// A bulk-get slot was reported longer than the bytes written to it.
    /// The reported length is never clamped.
    #[error("{operation} reported {reported} bytes for slot {index}, {written} were written")]
    SlotOverrun {
        /// The adapter that detected the violation.
        operation: &'static str,
        /// Index of the offending slot.
        index: usize,
        /// Length reported by the native layer.
        reported: usize,
        /// Bytes actually present in the slot.
        written: usize,
    },
}

impl MarshalError {
    /// Returns true when the native layer broke the capacity contract.
    ///
    /// Such errors are fatal at the C boundary.
    pub fn is_protocol_violation(&self) -> bool {
        matches!(
            self,
            MarshalError::ProtocolViolation { .. }
                | MarshalError::UnpairedResult { .. }
                | MarshalError::SlotOverrun { .. }
        )
    }

    /// Returns the error code a caller sees for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            MarshalError::Store(err) => err.code(),
            MarshalError::ProtocolViolation { .. }
            | MarshalError::UnpairedResult { .. }
            | MarshalError::SlotOverrun { .. } => ErrorCode::Internal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protocol_violation_classification() {
        let err = MarshalError::ProtocolViolation {
            operation: "match_prefix",
            reported: 11,
            capacity: 10,
        };
        assert!(err.is_protocol_violation());
        assert_eq!(err.code(), ErrorCode::Internal);
        assert_eq!(err.to_string(), "match_prefix reported 11 results with capacity 10");

        let overrun = MarshalError::SlotOverrun {
            operation: "get_bulk",
            index: 0,
            reported: 5,
            written: 1,
        };
        assert!(overrun.is_protocol_violation());
        assert_eq!(overrun.code(), ErrorCode::Internal);

        let store = MarshalError::from(StoreError::new(ErrorCode::Network, "refused"));
        assert!(!store.is_protocol_violation());
        assert_eq!(store.code(), ErrorCode::Network);
    }
}
