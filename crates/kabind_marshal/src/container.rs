//! The caller-owned result container.

use kabind_client::{ErrorCode, SlotState};

/// Shape of the data a container holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerKind {
    /// Matched keys; no per-slot sizes.
    Keys,
    /// Bulk-get values with per-slot presence.
    Values,
    /// Procedure results as consecutive key/value slots.
    Pairs,
}

/// Outcome of the call that produced a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerStatus {
    /// The native call succeeded; every slot is valid.
    Complete,
    /// The native call failed; the container is empty.
    Failed(ErrorCode),
}

/// A bundle of owned result buffers.
///
/// Every populated slot is stored NUL-terminated so its bytes can be handed
/// across the C boundary as-is; [`Container::get`] never includes the
/// terminator. Absent bulk-get slots hold no bytes at all.
///
/// A container is move-only. It owns every buffer it holds until it is
/// dropped, so it can be released exactly once and never read afterwards.
///
/// # Invariants
///
/// - after construction `len()` is the native result count, and no
///   preallocated slot beyond it remains
/// - `states` is empty unless the kind is [`ContainerKind::Values`], in
///   which case it has exactly one entry per slot
/// - a [`ContainerKind::Pairs`] container always has an even length
#[derive(Debug)]
pub struct Container {
    kind: ContainerKind,
    slots: Vec<Vec<u8>>,
    states: Vec<SlotState>,
    status: ContainerStatus,
}

impl Container {
    pub(crate) fn from_keys(slots: Vec<Vec<u8>>) -> Self {
        Self::sealed(ContainerKind::Keys, slots, Vec::new())
    }

    pub(crate) fn from_values(slots: Vec<Vec<u8>>, states: Vec<SlotState>) -> Self {
        debug_assert_eq!(slots.len(), states.len());
        Self::sealed(ContainerKind::Values, slots, states)
    }

    pub(crate) fn from_pairs(slots: Vec<Vec<u8>>) -> Self {
        debug_assert!(slots.len() % 2 == 0);
        Self::sealed(ContainerKind::Pairs, slots, Vec::new())
    }

    /// Creates the empty container produced by a failed call.
    pub fn failed(kind: ContainerKind, code: ErrorCode) -> Self {
        Self {
            kind,
            slots: Vec::new(),
            states: Vec::new(),
            status: ContainerStatus::Failed(code),
        }
    }

    fn sealed(kind: ContainerKind, mut slots: Vec<Vec<u8>>, mut states: Vec<SlotState>) -> Self {
        for (i, slot) in slots.iter_mut().enumerate() {
            match states.get(i).copied() {
                Some(SlotState::Present(len)) => {
                    debug_assert!(len <= slot.len(), "overruns are rejected before sealing");
                    slot.truncate(len);
                    slot.push(0);
                }
                Some(SlotState::Absent) => {
                    slot.clear();
                    slot.shrink_to_fit();
                }
                None => slot.push(0),
            }
        }
        states.shrink_to_fit();
        Self {
            kind,
            slots,
            states,
            status: ContainerStatus::Complete,
        }
    }

    /// Returns the container kind.
    pub fn kind(&self) -> ContainerKind {
        self.kind
    }

    /// Returns the outcome of the producing call.
    pub fn status(&self) -> ContainerStatus {
        self.status
    }

    /// Returns true when the producing call failed.
    pub fn is_failed(&self) -> bool {
        matches!(self.status, ContainerStatus::Failed(_))
    }

    /// Number of populated slots.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns true when there are no slots.
    ///
    /// An empty container is either "no matches" or a failure; check
    /// [`Container::status`] to tell them apart.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Returns true when the container carries per-slot sizes.
    pub fn has_sizes(&self) -> bool {
        self.kind == ContainerKind::Values
    }

    /// Returns the per-slot presence of a bulk-get container.
    ///
    /// `None` for key and pair containers, which carry no sizes.
    pub fn sizes(&self) -> Option<&[SlotState]> {
        self.has_sizes().then_some(self.states.as_slice())
    }

    /// Returns the bytes of slot `index`.
    ///
    /// `None` when the index is out of range or the slot is absent.
    pub fn get(&self, index: usize) -> Option<&[u8]> {
        self.get_with_nul(index)
            .map(|bytes| &bytes[..bytes.len() - 1])
    }

    /// Returns the bytes of slot `index` including the NUL terminator.
    pub fn get_with_nul(&self, index: usize) -> Option<&[u8]> {
        if !self.is_present(index) {
            return None;
        }
        self.slots.get(index).map(Vec::as_slice)
    }

    /// Returns the presence and length of slot `index`, `None` when out of range.
    pub fn size(&self, index: usize) -> Option<SlotState> {
        let slot = self.slots.get(index)?;
        Some(match self.states.get(index) {
            Some(state) => *state,
            None => SlotState::Present(slot.len() - 1),
        })
    }

    /// Returns true when slot `index` exists and holds a value.
    pub fn is_present(&self, index: usize) -> bool {
        self.size(index).is_some_and(SlotState::is_present)
    }

    /// Iterates over the slots, `None` for absent ones.
    pub fn iter(&self) -> impl Iterator<Item = Option<&[u8]>> + '_ {
        (0..self.len()).map(|i| self.get(i))
    }

    /// Number of key/value pairs in a [`ContainerKind::Pairs`] container.
    pub fn pair_count(&self) -> usize {
        match self.kind {
            ContainerKind::Pairs => self.len() / 2,
            _ => 0,
        }
    }

    /// Returns pair `index` as `(key, value)`.
    pub fn pair(&self, index: usize) -> Option<(&[u8], &[u8])> {
        if index >= self.pair_count() {
            return None;
        }
        Some((self.get(2 * index)?, self.get(2 * index + 1)?))
    }

    /// Iterates over the key/value pairs of a procedure result.
    pub fn pairs(&self) -> impl Iterator<Item = (&[u8], &[u8])> + '_ {
        (0..self.pair_count()).filter_map(|i| self.pair(i))
    }

    /// Consumes the container, returning each slot without its terminator.
    pub fn into_slots(self) -> Vec<Option<Vec<u8>>> {
        let states = self.states;
        self.slots
            .into_iter()
            .enumerate()
            .map(|(i, mut slot)| match states.get(i) {
                Some(SlotState::Absent) => None,
                _ => {
                    slot.pop();
                    Some(slot)
                }
            })
            .collect()
    }
}
