//! Ordered record map shared by the local store and the loopback server.

use crate::client::SlotState;
use crate::error::{ErrorCode, StoreError, StoreResult};
use regex::bytes::Regex;
use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::atomic::{AtomicI32, Ordering};

/// Records keyed by raw bytes, iterated in ascending key order.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RecordMap {
    records: BTreeMap<Vec<u8>, Vec<u8>>,
}

impl RecordMap {
    /// Creates an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a map from existing records.
    pub fn from_records(records: BTreeMap<Vec<u8>, Vec<u8>>) -> Self {
        Self { records }
    }

    /// Returns the underlying records.
    pub fn records(&self) -> &BTreeMap<Vec<u8>, Vec<u8>> {
        &self.records
    }

    /// Returns the value of `key`.
    pub fn get(&self, key: &[u8]) -> Option<&Vec<u8>> {
        self.records.get(key)
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true when there are no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Creates or overwrites a record.
    pub fn set(&mut self, key: &[u8], value: &[u8]) {
        self.records.insert(key.to_vec(), value.to_vec());
    }

    /// Creates a record, failing with `Duplicate` when it exists.
    pub fn add(&mut self, key: &[u8], value: &[u8]) -> StoreResult<()> {
        if self.records.contains_key(key) {
            return Err(StoreError::new(
                ErrorCode::Duplicate,
                format!("record {} already exists", printable(key)),
            ));
        }
        self.set(key, value);
        Ok(())
    }

    /// Overwrites a record, failing with `NoRecord` when it is missing.
    pub fn replace(&mut self, key: &[u8], value: &[u8]) -> StoreResult<()> {
        match self.records.get_mut(key) {
            Some(existing) => {
                existing.clear();
                existing.extend_from_slice(value);
                Ok(())
            }
            None => Err(no_record(key)),
        }
    }

    /// Appends to a record, creating it when missing.
    pub fn append(&mut self, key: &[u8], value: &[u8]) {
        self.records
            .entry(key.to_vec())
            .or_default()
            .extend_from_slice(value);
    }

    /// Removes a record, failing with `NoRecord` when it is missing.
    pub fn remove(&mut self, key: &[u8]) -> StoreResult<()> {
        self.records
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| no_record(key))
    }

    /// Adds `delta` to an 8-byte big-endian counter.
    pub fn increment(&mut self, key: &[u8], delta: i64, initial: i64) -> StoreResult<i64> {
        let current = match self.records.get(key) {
            Some(value) => {
                let bytes: [u8; 8] = value.as_slice().try_into().map_err(|_| {
                    StoreError::new(
                        ErrorCode::Logic,
                        "not possible to increment a non-numeric record",
                    )
                })?;
                i64::from_be_bytes(bytes)
            }
            None => initial,
        };
        let next = current.checked_add(delta).ok_or_else(|| {
            StoreError::new(ErrorCode::Logic, "numeric record would overflow")
        })?;
        self.records.insert(key.to_vec(), next.to_be_bytes().to_vec());
        Ok(next)
    }

    /// Sets `key` to `new` when its value is `old`.
    ///
    /// Fails with `Logic` on a mismatch and `NoRecord` when missing.
    pub fn compare_and_swap(&mut self, key: &[u8], old: &[u8], new: &[u8]) -> StoreResult<()> {
        match self.records.get_mut(key) {
            Some(current) if current.as_slice() == old => {
                current.clear();
                current.extend_from_slice(new);
                Ok(())
            }
            Some(_) => Err(StoreError::new(
                ErrorCode::Logic,
                format!("status of {} was changed", printable(key)),
            )),
            None => Err(no_record(key)),
        }
    }

    /// Removes every record.
    pub fn clear(&mut self) {
        self.records.clear();
    }

    /// Writes keys starting with `prefix` into `slots` in ascending order.
    pub fn match_prefix_into(&self, prefix: &[u8], slots: &mut [Vec<u8>]) -> usize {
        let range = self
            .records
            .range::<[u8], _>((Bound::Included(prefix), Bound::Unbounded))
            .map(|(key, _)| key)
            .take_while(|key| key.starts_with(prefix));
        write_slots(range, slots)
    }

    /// Writes keys matching `pattern` into `slots` in ascending order.
    pub fn match_regex_into(&self, pattern: &str, slots: &mut [Vec<u8>]) -> StoreResult<usize> {
        let regex = Regex::new(pattern).map_err(|e| {
            StoreError::new(ErrorCode::Invalid, format!("invalid pattern: {e}"))
        })?;
        let matches = self.records.keys().filter(|key| regex.is_match(key));
        Ok(write_slots(matches, slots))
    }

    /// Looks up `keys` positionally into `slots` and `states`.
    pub fn get_bulk_into(
        &self,
        keys: &[&[u8]],
        slots: &mut [Vec<u8>],
        states: &mut [SlotState],
    ) -> StoreResult<usize> {
        if slots.len() < keys.len() || states.len() < keys.len() {
            return Err(StoreError::new(
                ErrorCode::Invalid,
                format!(
                    "{} keys requested with capacity for {} slots",
                    keys.len(),
                    slots.len().min(states.len())
                ),
            ));
        }
        for (i, key) in keys.iter().enumerate() {
            let slot = &mut slots[i];
            slot.clear();
            states[i] = match self.records.get(*key) {
                Some(value) => {
                    slot.extend_from_slice(value);
                    SlotState::Present(value.len())
                }
                None => SlotState::Absent,
            };
        }
        Ok(keys.len())
    }

    /// Stores every pair and returns how many were stored.
    pub fn set_bulk(&mut self, pairs: &[(&[u8], &[u8])]) -> usize {
        for (key, value) in pairs {
            self.set(key, value);
        }
        pairs.len()
    }

    /// Removes every key and returns how many existed.
    pub fn remove_bulk(&mut self, keys: &[&[u8]]) -> usize {
        keys.iter()
            .filter(|key| self.records.remove(**key).is_some())
            .count()
    }
}

/// Copies keys into consecutive slots until either side runs out.
fn write_slots<'a>(keys: impl Iterator<Item = &'a Vec<u8>>, slots: &mut [Vec<u8>]) -> usize {
    let mut written = 0;
    for (slot, key) in slots.iter_mut().zip(keys) {
        slot.clear();
        slot.extend_from_slice(key);
        written += 1;
    }
    written
}

fn no_record(key: &[u8]) -> StoreError {
    StoreError::new(
        ErrorCode::NoRecord,
        format!("no record for key {}", printable(key)),
    )
}

/// Renders a key for error messages, truncated to 80 bytes.
pub(crate) fn printable(key: &[u8]) -> String {
    const LIMIT: usize = 80;
    if key.len() > LIMIT {
        format!("{:?}...", String::from_utf8_lossy(&key[..LIMIT]))
    } else {
        format!("{:?}", String::from_utf8_lossy(key))
    }
}

/// The last error code of a client, updated after every operation.
#[derive(Debug, Default)]
pub struct LastError(AtomicI32);

impl LastError {
    /// Records the outcome of an operation and passes it through.
    pub fn track<T>(&self, result: StoreResult<T>) -> StoreResult<T> {
        let code = match &result {
            Ok(_) => ErrorCode::Success,
            Err(err) => err.code(),
        };
        self.0.store(code.as_raw(), Ordering::Release);
        result
    }

    /// Records a code directly.
    pub fn set(&self, code: ErrorCode) {
        self.0.store(code.as_raw(), Ordering::Release);
    }

    /// Returns the recorded code.
    pub fn get(&self) -> ErrorCode {
        ErrorCode::from_raw(self.0.load(Ordering::Acquire))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded() -> RecordMap {
        let mut map = RecordMap::new();
        for key in ["user:1", "user:2", "user:3", "order:1", "usex"] {
            map.set(key.as_bytes(), b"v");
        }
        map
    }

    #[test]
    fn prefix_match_is_ordered_and_capped() {
        let map = seeded();
        let mut slots = vec![Vec::new(); 10];
        let n = map.match_prefix_into(b"user:", &mut slots);
        assert_eq!(n, 3);
        assert_eq!(slots[0], b"user:1");
        assert_eq!(slots[2], b"user:3");

        let mut small = vec![Vec::new(); 2];
        assert_eq!(map.match_prefix_into(b"user:", &mut small), 2);
    }

    #[test]
    fn empty_prefix_matches_everything() {
        let map = seeded();
        let mut slots = vec![Vec::new(); 10];
        assert_eq!(map.match_prefix_into(b"", &mut slots), 5);
    }

    #[test]
    fn regex_match() {
        let map = seeded();
        let mut slots = vec![Vec::new(); 10];
        let n = map.match_regex_into("^user:[12]$", &mut slots).unwrap();
        assert_eq!(n, 2);
        assert_eq!(slots[1], b"user:2");
    }

    #[test]
    fn invalid_regex_is_invalid() {
        let map = seeded();
        let mut slots = vec![Vec::new(); 1];
        let err = map.match_regex_into("(", &mut slots).unwrap_err();
        assert_eq!(err.code(), ErrorCode::Invalid);
    }

    #[test]
    fn bulk_get_distinguishes_empty_from_absent() {
        let mut map = RecordMap::new();
        map.set(b"a", b"alpha");
        map.set(b"empty", b"");

        let keys: Vec<&[u8]> = vec![b"a", b"missing", b"empty"];
        let mut slots = vec![Vec::new(); 3];
        let mut states = vec![SlotState::Absent; 3];
        let n = map.get_bulk_into(&keys, &mut slots, &mut states).unwrap();

        assert_eq!(n, 3);
        assert_eq!(states[0], SlotState::Present(5));
        assert_eq!(states[1], SlotState::Absent);
        assert_eq!(states[2], SlotState::Present(0));
        assert_eq!(slots[0], b"alpha");
    }

    #[test]
    fn bulk_get_rejects_short_capacity() {
        let map = RecordMap::new();
        let keys: Vec<&[u8]> = vec![b"a", b"b"];
        let mut slots = vec![Vec::new(); 1];
        let mut states = vec![SlotState::Absent; 2];
        let err = map.get_bulk_into(&keys, &mut slots, &mut states).unwrap_err();
        assert_eq!(err.code(), ErrorCode::Invalid);
    }

    #[test]
    fn add_and_replace_semantics() {
        let mut map = RecordMap::new();
        map.add(b"k", b"1").unwrap();
        assert_eq!(map.add(b"k", b"2").unwrap_err().code(), ErrorCode::Duplicate);
        map.replace(b"k", b"3").unwrap();
        assert_eq!(map.get(b"k").unwrap(), b"3");
        assert_eq!(map.replace(b"x", b"1").unwrap_err().code(), ErrorCode::NoRecord);
    }

    #[test]
    fn increment_counts_from_initial() {
        let mut map = RecordMap::new();
        assert_eq!(map.increment(b"n", 5, 10).unwrap(), 15);
        assert_eq!(map.increment(b"n", -3, 10).unwrap(), 12);

        map.set(b"s", b"text");
        assert_eq!(map.increment(b"s", 1, 0).unwrap_err().code(), ErrorCode::Logic);
    }

    #[test]
    fn compare_and_swap() {
        let mut map = RecordMap::new();
        map.set(b"k", b"old");
        assert_eq!(
            map.compare_and_swap(b"k", b"wrong", b"new").unwrap_err().code(),
            ErrorCode::Logic
        );
        map.compare_and_swap(b"k", b"old", b"new").unwrap();
        assert_eq!(map.get(b"k").unwrap(), b"new");
    }

    #[test]
    fn remove_bulk_counts_existing() {
        let mut map = seeded();
        let keys: Vec<&[u8]> = vec![b"user:1", b"nope", b"order:1"];
        assert_eq!(map.remove_bulk(&keys), 2);
        assert_eq!(map.len(), 3);
    }

    #[test]
    fn last_error_tracks_outcome() {
        let last = LastError::default();
        let _ = last.track::<()>(Err(StoreError::new(ErrorCode::NoRecord, "x")));
        assert_eq!(last.get(), ErrorCode::NoRecord);
        let _ = last.track(Ok(1));
        assert_eq!(last.get(), ErrorCode::Success);
    }
}
