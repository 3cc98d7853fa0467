//! Property-based test generators using proptest.

use proptest::prelude::*;
use std::collections::BTreeMap;

/// Strategy for short text keys drawn from a small alphabet, so prefixes
/// and lookups collide often.
pub fn key_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::string::string_regex("[a-c:]{1,6}")
        .expect("Invalid regex")
        .prop_map(String::into_bytes)
}

/// Strategy for arbitrary values, including empty ones.
pub fn value_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..64)
}

/// Strategy for a store's full contents.
pub fn store_contents_strategy() -> impl Strategy<Value = BTreeMap<Vec<u8>, Vec<u8>>> {
    prop::collection::btree_map(key_strategy(), value_strategy(), 0..40)
}

/// Strategy for a positional key list, duplicates allowed.
pub fn key_list_strategy() -> impl Strategy<Value = Vec<Vec<u8>>> {
    prop::collection::vec(key_strategy(), 0..24)
}

/// Strategy for a prefix, possibly empty.
pub fn prefix_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::string::string_regex("[a-c:]{0,3}")
        .expect("Invalid regex")
        .prop_map(String::into_bytes)
}
