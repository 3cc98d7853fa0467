//! Single-key operations shared by the local and remote entry points.

use crate::buffer::{KabBuffer, KabSlice};
use crate::error::{null_argument, store_failure, KabResult};
use kabind_client::{StoreClient, StoreResult};

/// A two-argument store mutation (`set`, `add`, `replace`, `append`).
pub(crate) type WriteOp = fn(&dyn StoreClient, &[u8], &[u8]) -> StoreResult<()>;

fn finish(result: StoreResult<()>) -> KabResult {
    match result {
        Ok(()) => KabResult::Ok,
        Err(e) => store_failure(&e),
    }
}

pub(crate) unsafe fn get(client: &dyn StoreClient, key: KabSlice, out_buffer: *mut KabBuffer) -> KabResult {
    if out_buffer.is_null() {
        return null_argument();
    }
    *out_buffer = KabBuffer::empty();

    let key = match key.as_bytes("key") {
        Ok(key) => key,
        Err(e) => return e.report(),
    };
    match client.get(key) {
        Ok(Some(value)) => {
            *out_buffer = KabBuffer::from_vec(value);
            KabResult::Ok
        }
        Ok(None) => KabResult::NotFound,
        Err(e) => store_failure(&e),
    }
}

pub(crate) unsafe fn write(
    client: &dyn StoreClient,
    key: KabSlice,
    value: KabSlice,
    op: WriteOp,
) -> KabResult {
    let (key, value) = match (key.as_bytes("key"), value.as_bytes("value")) {
        (Ok(key), Ok(value)) => (key, value),
        (Err(e), _) | (_, Err(e)) => return e.report(),
    };
    finish(op(client, key, value))
}

pub(crate) unsafe fn remove(client: &dyn StoreClient, key: KabSlice) -> KabResult {
    match key.as_bytes("key") {
        Ok(key) => finish(client.remove(key)),
        Err(e) => e.report(),
    }
}

pub(crate) unsafe fn increment(
    client: &dyn StoreClient,
    key: KabSlice,
    delta: i64,
    initial: i64,
    out_value: *mut i64,
) -> KabResult {
    if out_value.is_null() {
        return null_argument();
    }
    let key = match key.as_bytes("key") {
        Ok(key) => key,
        Err(e) => return e.report(),
    };
    match client.increment(key, delta, initial) {
        Ok(value) => {
            *out_value = value;
            KabResult::Ok
        }
        Err(e) => store_failure(&e),
    }
}

pub(crate) unsafe fn count(client: &dyn StoreClient, out_count: *mut i64) -> KabResult {
    if out_count.is_null() {
        return null_argument();
    }
    match client.count() {
        Ok(n) => {
            *out_count = n;
            KabResult::Ok
        }
        Err(e) => store_failure(&e),
    }
}

pub(crate) fn clear(client: &dyn StoreClient) -> KabResult {
    finish(client.clear())
}

pub(crate) fn close(client: &dyn StoreClient) -> KabResult {
    finish(client.close())
}
