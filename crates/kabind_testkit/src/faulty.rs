//! Misbehaving store clients.
//!
//! [`Faulty`] wraps a real client and corrupts the multi-value calls in a
//! chosen way, so tests can drive the failure and protocol-violation paths
//! of the marshaling layer.

use kabind_client::{
    ErrorCode, ParamMap, PatternMatch, ProcedureCall, SlotState, StoreClient, StoreError,
    StoreResult,
};
use std::sync::atomic::{AtomicI32, Ordering};

/// How a [`Faulty`] client misbehaves on multi-value calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Pass every call through unchanged.
    None,
    /// Fail every multi-value call with this code.
    Fail(ErrorCode),
    /// Report this many more results than were written.
    Overreport(usize),
    /// Report one slot fewer than written (breaks key/value pairing).
    DropOne,
    /// Report the first present bulk-get value this many bytes longer
    /// than written.
    OverreportLength(usize),
}

/// A client wrapper that injects a [`Fault`] into multi-value calls.
#[derive(Debug)]
pub struct Faulty<C> {
    inner: C,
    fault: Fault,
    last_error: AtomicI32,
}

impl<C: StoreClient> Faulty<C> {
    /// Wraps `inner`.
    pub fn new(inner: C, fault: Fault) -> Self {
        Self {
            inner,
            fault,
            last_error: AtomicI32::new(ErrorCode::Success.as_raw()),
        }
    }

    /// Returns the wrapped client.
    pub fn inner(&self) -> &C {
        &self.inner
    }

    fn corrupt(&self, result: StoreResult<usize>) -> StoreResult<usize> {
        let result = match (self.fault, result) {
            (Fault::Fail(code), _) => Err(StoreError::new(code, "injected failure")),
            (Fault::Overreport(extra), Ok(n)) => Ok(n + extra),
            (Fault::DropOne, Ok(n)) => Ok(n.saturating_sub(1)),
            (_, result) => result,
        };
        let code = match &result {
            Ok(_) => ErrorCode::Success,
            Err(err) => err.code(),
        };
        self.last_error.store(code.as_raw(), Ordering::Release);
        result
    }
}

impl<C: StoreClient> StoreClient for Faulty<C> {
    fn get(&self, key: &[u8]) -> StoreResult<Option<Vec<u8>>> {
        self.inner.get(key)
    }

    fn set(&self, key: &[u8], value: &[u8]) -> StoreResult<()> {
        self.inner.set(key, value)
    }

    fn add(&self, key: &[u8], value: &[u8]) -> StoreResult<()> {
        self.inner.add(key, value)
    }

    fn replace(&self, key: &[u8], value: &[u8]) -> StoreResult<()> {
        self.inner.replace(key, value)
    }

    fn append(&self, key: &[u8], value: &[u8]) -> StoreResult<()> {
        self.inner.append(key, value)
    }

    fn remove(&self, key: &[u8]) -> StoreResult<()> {
        self.inner.remove(key)
    }

    fn increment(&self, key: &[u8], delta: i64, initial: i64) -> StoreResult<i64> {
        self.inner.increment(key, delta, initial)
    }

    fn count(&self) -> StoreResult<i64> {
        self.inner.count()
    }

    fn clear(&self) -> StoreResult<()> {
        self.inner.clear()
    }

    fn close(&self) -> StoreResult<()> {
        self.inner.close()
    }

    fn last_error(&self) -> ErrorCode {
        ErrorCode::from_raw(self.last_error.load(Ordering::Acquire))
    }

    fn record_error(&self, code: ErrorCode) {
        self.last_error.store(code.as_raw(), Ordering::Release);
    }

    fn match_prefix_into(&self, prefix: &[u8], slots: &mut [Vec<u8>]) -> StoreResult<usize> {
        self.corrupt(self.inner.match_prefix_into(prefix, slots))
    }

    fn get_bulk_into(
        &self,
        keys: &[&[u8]],
        slots: &mut [Vec<u8>],
        states: &mut [SlotState],
    ) -> StoreResult<usize> {
        let result = self.inner.get_bulk_into(keys, slots, states);
        if let (Fault::OverreportLength(extra), Ok(n)) = (self.fault, &result) {
            if let Some(SlotState::Present(len)) = states[..*n]
                .iter_mut()
                .find(|state| state.is_present())
            {
                *len += extra;
            }
        }
        self.corrupt(result)
    }

    fn set_bulk(&self, pairs: &[(&[u8], &[u8])]) -> StoreResult<usize> {
        self.corrupt(self.inner.set_bulk(pairs))
    }

    fn remove_bulk(&self, keys: &[&[u8]]) -> StoreResult<usize> {
        self.corrupt(self.inner.remove_bulk(keys))
    }
}

impl<C: PatternMatch> PatternMatch for Faulty<C> {
    fn match_regex_into(&self, pattern: &str, slots: &mut [Vec<u8>]) -> StoreResult<usize> {
        self.corrupt(self.inner.match_regex_into(pattern, slots))
    }
}

impl<C: ProcedureCall> ProcedureCall for Faulty<C> {
    fn play_script_into(
        &self,
        name: &str,
        params: &ParamMap,
        slots: &mut [Vec<u8>],
    ) -> StoreResult<usize> {
        self.corrupt(self.inner.play_script_into(name, params, slots))
    }
}
