//! Store client capability traits.

use crate::error::{ErrorCode, StoreResult};
use std::collections::BTreeMap;

/// Presence marker written next to each bulk-get slot.
///
/// `Present(0)` is a stored empty value; `Absent` is a missing key. The two
/// are never conflated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SlotState {
    /// The key exists and its value has this exact byte length.
    Present(usize),
    /// The key does not exist; the slot buffer holds no meaningful data.
    #[default]
    Absent,
}

impl SlotState {
    /// Returns true for `Present`.
    pub const fn is_present(self) -> bool {
        matches!(self, SlotState::Present(_))
    }

    /// Returns the value length, or `None` when absent.
    pub const fn len(self) -> Option<usize> {
        match self {
            SlotState::Present(len) => Some(len),
            SlotState::Absent => None,
        }
    }
}

/// Procedure parameters and results: an ordered name to value mapping.
pub type ParamMap = BTreeMap<Vec<u8>, Vec<u8>>;

/// The capability set shared by every store client variant.
///
/// Single-record operations are plain pass-throughs. The `*_into` operations
/// are the native multi-value fills: they write into a slot array preallocated
/// by the caller, whose length is the capacity, and return how many slots they
/// populated.
///
/// # Invariants
///
/// - A `*_into` call never returns a count larger than the slot array it was
///   handed. Callers still validate the count.
/// - A failed call records its error code, readable through `last_error`;
///   a successful call resets it to [`ErrorCode::Success`].
/// - Clients must be `Send + Sync`; a handle may be moved across threads
///   but callers serialize concurrent use where the variant requires it.
pub trait StoreClient: Send + Sync {
    /// Retrieves the value of a record, `None` when the key does not exist.
    fn get(&self, key: &[u8]) -> StoreResult<Option<Vec<u8>>>;

    /// Sets the value of a record, creating or overwriting it.
    fn set(&self, key: &[u8], value: &[u8]) -> StoreResult<()>;

    /// Adds a record, failing with `Duplicate` when the key exists.
    fn add(&self, key: &[u8], value: &[u8]) -> StoreResult<()>;

    /// Replaces a record, failing with `NoRecord` when the key is missing.
    fn replace(&self, key: &[u8], value: &[u8]) -> StoreResult<()>;

    /// Appends to the value of a record, creating it when missing.
    fn append(&self, key: &[u8], value: &[u8]) -> StoreResult<()>;

    /// Removes a record, failing with `NoRecord` when the key is missing.
    fn remove(&self, key: &[u8]) -> StoreResult<()>;

    /// Adds `delta` to a numeric record and returns the new value.
    ///
    /// A missing record starts at `initial`.
    fn increment(&self, key: &[u8], delta: i64, initial: i64) -> StoreResult<i64>;

    /// Returns the number of records.
    fn count(&self) -> StoreResult<i64>;

    /// Removes every record.
    fn clear(&self) -> StoreResult<()>;

    /// Closes the client. Every later operation fails with `Invalid`.
    fn close(&self) -> StoreResult<()>;

    /// Returns the code of the most recent operation.
    fn last_error(&self) -> ErrorCode;

    /// Records `code` for an operation rejected before it reached the
    /// store, so `last_error` never reports a stale success.
    fn record_error(&self, code: ErrorCode);

    /// Writes the keys starting with `prefix` into `slots`, in ascending
    /// order, stopping when `slots` is full.
    fn match_prefix_into(&self, prefix: &[u8], slots: &mut [Vec<u8>]) -> StoreResult<usize>;

    /// Looks up every key of `keys`, writing slot `i` and state `i` for
    /// `keys[i]`. Returns the number of slot/state pairs written.
    fn get_bulk_into(
        &self,
        keys: &[&[u8]],
        slots: &mut [Vec<u8>],
        states: &mut [SlotState],
    ) -> StoreResult<usize>;

    /// Stores every pair and returns how many were applied.
    fn set_bulk(&self, pairs: &[(&[u8], &[u8])]) -> StoreResult<usize>;

    /// Removes every key and returns how many records existed.
    fn remove_bulk(&self, keys: &[&[u8]]) -> StoreResult<usize>;
}

/// Regular-expression key matching, offered by the local variant.
pub trait PatternMatch: StoreClient {
    /// Writes the keys matching `pattern` into `slots`, in ascending order.
    fn match_regex_into(&self, pattern: &str, slots: &mut [Vec<u8>]) -> StoreResult<usize>;
}

/// Server-side procedure invocation, offered by the remote variant.
pub trait ProcedureCall: StoreClient {
    /// Runs the procedure `name` and writes its result as alternating
    /// key and value slots. Returns the number of slots written, always even.
    fn play_script_into(
        &self,
        name: &str,
        params: &ParamMap,
        slots: &mut [Vec<u8>],
    ) -> StoreResult<usize>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_state_presence() {
        assert!(SlotState::Present(0).is_present());
        assert!(!SlotState::Absent.is_present());
        assert_eq!(SlotState::Present(0).len(), Some(0));
        assert_eq!(SlotState::Absent.len(), None);
        assert_eq!(SlotState::default(), SlotState::Absent);
    }
}
