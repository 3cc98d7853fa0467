//! Marshaling configuration.

/// Default per-slot preallocation, enough for one key or value record.
pub const DEFAULT_RECORD_CAPACITY: usize = 1024;

/// Default slot capacity for procedure results (32 key/value pairs).
pub const DEFAULT_SCRIPT_CAPACITY: usize = 64;

/// Default cap for key matching when the caller does not choose one.
pub const DEFAULT_MATCH_MAX: usize = 1000;

/// Default upper bound on the slots a match may preallocate.
pub const DEFAULT_MAX_SLOTS: usize = 64 * 1024;

/// Configuration for the allocation/trim protocol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarshalConfig {
    /// Bytes reserved up front in every slot.
    pub record_capacity: usize,

    /// Slots preallocated for a procedure result. Must be even.
    pub script_capacity: usize,

    /// Match cap used when the caller passes no maximum.
    pub default_match_max: usize,

    /// Largest match cap. Larger caps are lowered to it; bulk gets and
    /// procedure calls are not bounded by it.
    pub max_slots: usize,
}

impl Default for MarshalConfig {
    fn default() -> Self {
        Self {
            record_capacity: DEFAULT_RECORD_CAPACITY,
            script_capacity: DEFAULT_SCRIPT_CAPACITY,
            default_match_max: DEFAULT_MATCH_MAX,
            max_slots: DEFAULT_MAX_SLOTS,
        }
    }
}

impl MarshalConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the per-slot preallocation.
    #[must_use]
    pub const fn record_capacity(mut self, bytes: usize) -> Self {
        self.record_capacity = bytes;
        self
    }

    /// Sets the procedure result capacity, rounded down to an even count.
    #[must_use]
    pub const fn script_capacity(mut self, slots: usize) -> Self {
        self.script_capacity = slots & !1;
        self
    }

    /// Sets the default match cap.
    #[must_use]
    pub const fn default_match_max(mut self, max: usize) -> Self {
        self.default_match_max = max;
        self
    }

    /// Sets the largest match cap.
    #[must_use]
    pub const fn max_slots(mut self, max: usize) -> Self {
        self.max_slots = max;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = MarshalConfig::default();
        assert_eq!(config.record_capacity, 1024);
        assert_eq!(config.script_capacity, 64);
        assert_eq!(config.default_match_max, 1000);
    }

    #[test]
    fn builder_pattern() {
        let config = MarshalConfig::new()
            .record_capacity(16)
            .script_capacity(7)
            .max_slots(100);

        assert_eq!(config.record_capacity, 16);
        assert_eq!(config.script_capacity, 6);
        assert_eq!(config.max_slots, 100);
    }
}
