//! The allocation/trim protocol.
//!
//! Every multi-value call follows the same steps:
//!
//! 1. preallocate `max` slots, each reserving room for one record
//! 2. hand the slot array to the native call, which reports `n`
//! 3. on failure, release every preallocated slot and report the error
//! 4. reject `n > max` as a protocol violation
//! 5. release slots `[n, max)` and shrink the array to exactly `n`
//!
//! Bulk gets also reject a slot whose reported length exceeds the bytes
//! written to it.
//!
//! No slot past `n` survives step 5, so nothing preallocated but unused is
//! reachable from the resulting container.

use crate::error::{MarshalError, MarshalResult};
use kabind_client::{SlotState, StoreResult};
use tracing::{debug, error, warn};

/// Preallocates `max` empty slots with `record_capacity` bytes reserved.
pub fn preallocate(max: usize, record_capacity: usize) -> Vec<Vec<u8>> {
    (0..max).map(|_| Vec::with_capacity(record_capacity)).collect()
}

/// Runs a native fill over `max` preallocated slots and trims the result.
pub fn fill<F>(
    operation: &'static str,
    max: usize,
    record_capacity: usize,
    native: F,
) -> MarshalResult<Vec<Vec<u8>>>
where
    F: FnOnce(&mut [Vec<u8>]) -> StoreResult<usize>,
{
    let mut slots = preallocate(max, record_capacity);
    let n = match native(&mut slots) {
        Ok(n) => n,
        Err(err) => {
            warn!(operation, capacity = max, error = %err, "native fill failed");
            return Err(err.into());
        }
    };
    check_capacity(operation, n, max)?;
    trim(&mut slots, n);
    debug!(operation, capacity = max, count = n, "filled slots");
    Ok(slots)
}

/// Like [`fill`], with a parallel presence array of the same capacity.
pub fn fill_with_states<F>(
    operation: &'static str,
    max: usize,
    record_capacity: usize,
    native: F,
) -> MarshalResult<(Vec<Vec<u8>>, Vec<SlotState>)>
where
    F: FnOnce(&mut [Vec<u8>], &mut [SlotState]) -> StoreResult<usize>,
{
    let mut slots = preallocate(max, record_capacity);
    let mut states = vec![SlotState::Absent; max];
    let n = match native(&mut slots, &mut states) {
        Ok(n) => n,
        Err(err) => {
            warn!(operation, capacity = max, error = %err, "native fill failed");
            return Err(err.into());
        }
    };
    check_capacity(operation, n, max)?;
    check_lengths(operation, &slots[..n], &states[..n])?;
    trim(&mut slots, n);
    trim(&mut states, n);
    debug!(operation, capacity = max, count = n, "filled slots with presence");
    Ok((slots, states))
}

/// Validates a scalar count returned by a bulk write.
pub fn validate_count(operation: &'static str, n: usize, requested: usize) -> MarshalResult<usize> {
    check_capacity(operation, n, requested)?;
    Ok(n)
}

fn check_capacity(operation: &'static str, reported: usize, capacity: usize) -> MarshalResult<()> {
    if reported > capacity {
        error!(operation, reported, capacity, "native layer exceeded capacity");
        return Err(MarshalError::ProtocolViolation {
            operation,
            reported,
            capacity,
        });
    }
    Ok(())
}

fn check_lengths(
    operation: &'static str,
    slots: &[Vec<u8>],
    states: &[SlotState],
) -> MarshalResult<()> {
    for (index, (slot, state)) in slots.iter().zip(states).enumerate() {
        if let SlotState::Present(reported) = *state {
            if reported > slot.len() {
                error!(operation, index, reported, written = slot.len(), "slot length overrun");
                return Err(MarshalError::SlotOverrun {
                    operation,
                    index,
                    reported,
                    written: slot.len(),
                });
            }
        }
    }
    Ok(())
}

/// Releases entries `[n, len)` and shrinks the backing array to `n`.
fn trim<T>(slots: &mut Vec<T>, n: usize) {
    if n < slots.len() {
        slots.truncate(n);
        slots.shrink_to_fit();
    }
}
