//! Operation adapters.
//!
//! One adapter per native multi-value call. Each runs the allocation/trim
//! protocol and translates the native result shape into a [`Container`].

use crate::alloc;
use crate::config::MarshalConfig;
use crate::container::Container;
use crate::error::{MarshalError, MarshalResult};
use kabind_client::{ParamMap, PatternMatch, ProcedureCall, StoreClient};
use tracing::debug;

/// Runs bulk operations against a store client.
///
/// # Example
///
/// ```rust
/// use kabind_client::{LocalStore, StoreClient};
/// use kabind_marshal::Marshaler;
///
/// let store = LocalStore::in_memory();
/// store.set(b"a", b"1").unwrap();
/// store.set(b"c", b"3").unwrap();
///
/// let marshaler = Marshaler::default();
/// let keys: [&[u8]; 3] = [b"a", b"b", b"c"];
/// let values = marshaler.get_bulk(&store, &keys).unwrap();
///
/// assert_eq!(values.len(), 3);
/// assert!(values.is_present(0));
/// assert!(!values.is_present(1));
/// assert_eq!(values.get(2), Some(b"3".as_slice()));
/// ```
#[derive(Debug, Clone, Default)]
pub struct Marshaler {
    config: MarshalConfig,
}

impl Marshaler {
    /// Creates a marshaler with the given configuration.
    pub fn new(config: MarshalConfig) -> Self {
        Self { config }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &MarshalConfig {
        &self.config
    }

    /// Bounds a match cap by `max_slots`. Never fails.
    fn bounded(&self, operation: &'static str, max: usize) -> usize {
        if max > self.config.max_slots {
            debug!(operation, requested = max, limit = self.config.max_slots, "clamped match cap");
            return self.config.max_slots;
        }
        max
    }

    /// Resolves a caller-supplied cap, `None` meaning the configured default.
    pub fn match_max(&self, max: Option<usize>) -> usize {
        max.unwrap_or(self.config.default_match_max)
    }

    /// Collects up to `max` keys starting with `prefix`.
    ///
    /// A cap above the configured `max_slots` is lowered to it.
    pub fn match_prefix<C>(&self, client: &C, prefix: &[u8], max: usize) -> MarshalResult<Container>
    where
        C: StoreClient + ?Sized,
    {
        let max = self.bounded("match_prefix", max);
        let slots = alloc::fill("match_prefix", max, self.config.record_capacity, |slots| {
            client.match_prefix_into(prefix, slots)
        })?;
        Ok(Container::from_keys(slots))
    }

    /// Collects up to `max` keys matching the regular expression `pattern`.
    pub fn match_regex<C>(&self, client: &C, pattern: &str, max: usize) -> MarshalResult<Container>
    where
        C: PatternMatch + ?Sized,
    {
        let max = self.bounded("match_regex", max);
        let slots = alloc::fill("match_regex", max, self.config.record_capacity, |slots| {
            client.match_regex_into(pattern, slots)
        })?;
        Ok(Container::from_keys(slots))
    }

    /// Fetches every key, positionally aligned with `keys`.
    ///
    /// The container has exactly `keys.len()` slots; missing keys are
    /// absent slots, not errors.
    pub fn get_bulk<C>(&self, client: &C, keys: &[&[u8]]) -> MarshalResult<Container>
    where
        C: StoreClient + ?Sized,
    {
        let (slots, states) = alloc::fill_with_states(
            "get_bulk",
            keys.len(),
            self.config.record_capacity,
            |slots, states| client.get_bulk_into(keys, slots, states),
        )?;
        let container = Container::from_values(slots, states);
        debug!(
            requested = keys.len(),
            present = (0..container.len()).filter(|&i| container.is_present(i)).count(),
            "bulk get"
        );
        Ok(container)
    }

    /// Stores every pair, returning the applied count.
    pub fn set_bulk<C>(&self, client: &C, pairs: &[(&[u8], &[u8])]) -> MarshalResult<usize>
    where
        C: StoreClient + ?Sized,
    {
        let n = client.set_bulk(pairs)?;
        let n = alloc::validate_count("set_bulk", n, pairs.len())?;
        debug!(requested = pairs.len(), applied = n, "bulk set");
        Ok(n)
    }

    /// Removes every key, returning how many existed.
    pub fn remove_bulk<C>(&self, client: &C, keys: &[&[u8]]) -> MarshalResult<usize>
    where
        C: StoreClient + ?Sized,
    {
        let n = client.remove_bulk(keys)?;
        let n = alloc::validate_count("remove_bulk", n, keys.len())?;
        debug!(requested = keys.len(), removed = n, "bulk remove");
        Ok(n)
    }

    /// Invokes the server-side procedure `name` and returns its result as
    /// key/value pairs in ascending key order.
    pub fn play_script<C>(&self, client: &C, name: &str, params: &ParamMap) -> MarshalResult<Container>
    where
        C: ProcedureCall + ?Sized,
    {
        let capacity = self.config.script_capacity;
        let slots = alloc::fill("play_script", capacity, self.config.record_capacity, |slots| {
            client.play_script_into(name, params, slots)
        })?;
        if slots.len() % 2 != 0 {
            return Err(MarshalError::UnpairedResult {
                operation: "play_script",
                reported: slots.len(),
            });
        }
        Ok(Container::from_pairs(slots))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kabind_client::{ErrorCode, LocalStore, SlotState};

    fn store() -> LocalStore {
        let store = LocalStore::in_memory();
        for (k, v) in [("user:1", "ada"), ("user:2", "bob"), ("user:3", ""), ("x", "y")] {
            store.set(k.as_bytes(), v.as_bytes()).unwrap();
        }
        store
    }

    #[test]
    fn prefix_match_scenario() {
        let c = Marshaler::default().match_prefix(&store(), b"user:", 10).unwrap();
        assert_eq!(c.len(), 3);
        assert_eq!(c.get(0), Some(b"user:1".as_slice()));
        assert_eq!(c.get(5), None);
        assert!(!c.is_failed());
    }

    #[test]
    fn prefix_match_capped() {
        let c = Marshaler::default().match_prefix(&store(), b"user:", 2).unwrap();
        assert_eq!(c.len(), 2);
    }

    #[test]
    fn regex_match() {
        let c = Marshaler::default().match_regex(&store(), "^user:[13]$", 10).unwrap();
        let keys: Vec<_> = c.iter().flatten().collect();
        assert_eq!(keys, vec![b"user:1".as_slice(), b"user:3".as_slice()]);
    }

    #[test]
    fn bulk_get_scenario() {
        let store = LocalStore::in_memory();
        store.set(b"a", b"1").unwrap();
        store.set(b"c", b"3").unwrap();

        let keys: [&[u8]; 3] = [b"a", b"b", b"c"];
        let c = Marshaler::default().get_bulk(&store, &keys).unwrap();
        assert_eq!(c.len(), 3);
        assert!(c.is_present(0));
        assert!(!c.is_present(1));
        assert!(c.is_present(2));
        assert_eq!(c.get(1), None);
    }

    #[test]
    fn bulk_get_empty_value_is_present() {
        let keys: [&[u8]; 1] = [b"user:3"];
        let c = Marshaler::default().get_bulk(&store(), &keys).unwrap();
        assert_eq!(c.size(0), Some(SlotState::Present(0)));
        assert_eq!(c.get(0), Some(b"".as_slice()));
    }

    #[test]
    fn bulk_get_no_keys() {
        let c = Marshaler::default().get_bulk(&store(), &[]).unwrap();
        assert!(c.is_empty());
        assert!(!c.is_failed());
    }

    #[test]
    fn failure_surfaces_error_code() {
        let store = store();
        store.close().unwrap();
        let err = Marshaler::default().match_prefix(&store, b"user:", 10).unwrap_err();
        assert_eq!(err.code(), ErrorCode::Invalid);
        assert_eq!(store.last_error(), ErrorCode::Invalid);
    }

    #[test]
    fn oversized_match_cap_is_clamped() {
        let marshaler = Marshaler::new(MarshalConfig::new().max_slots(2));
        let c = marshaler.match_prefix(&store(), b"user:", 100_000).unwrap();
        assert_eq!(c.len(), 2);

        let c = Marshaler::default().match_prefix(&store(), b"x", 100_000).unwrap();
        assert_eq!(c.len(), 1);
        assert!(!c.is_failed());
    }

    #[test]
    fn bulk_get_is_not_bounded_by_slot_limit() {
        let store = store();
        let marshaler = Marshaler::new(MarshalConfig::new().max_slots(2).record_capacity(0));
        let keys: Vec<&[u8]> = vec![b"user:1", b"nope", b"x", b"user:3", b"zz"];
        let c = marshaler.get_bulk(&store, &keys).unwrap();
        assert_eq!(c.len(), 5);
        assert!(c.is_present(3));
        assert!(!c.is_present(4));
        assert_eq!(store.last_error(), ErrorCode::Success);
    }

    #[test]
    fn bulk_set_and_remove_counts() {
        let store = LocalStore::in_memory();
        let marshaler = Marshaler::default();
        let pairs: [(&[u8], &[u8]); 2] = [(b"a", b"1"), (b"b", b"2")];
        assert_eq!(marshaler.set_bulk(&store, &pairs).unwrap(), 2);

        let keys: [&[u8]; 3] = [b"a", b"b", b"zz"];
        assert_eq!(marshaler.remove_bulk(&store, &keys).unwrap(), 2);
        assert_eq!(store.count().unwrap(), 0);
    }

    #[test]
    fn match_max_default() {
        let marshaler = Marshaler::default();
        assert_eq!(marshaler.match_max(None), 1000);
        assert_eq!(marshaler.match_max(Some(3)), 3);
    }
}
