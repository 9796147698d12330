use std::fmt;

/// Handle to an entry inside an `ExpiryList`.
///
/// The generation changes every time the slot's entry is removed, so a handle
/// kept after `delete` or `sweep` never resolves to a later occupant of the slot.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntryId {
    pub(crate) index: usize,
    pub(crate) generation: u64,
}

impl fmt::Debug for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntryId({}v{})", self.index, self.generation)
    }
}

pub(crate) struct Entry<K, T> {
    pub key: K,
    pub timestamp: T,
    pub prev: Option<usize>,
    pub next: Option<usize>,
}

impl<K, T> Entry<K, T> {
    pub fn new(key: K, timestamp: T) -> Self {
        Self {
            key,
            timestamp,
            prev: None,
            next: None,
        }
    }
}

// An arena cell. `entry` is None while the slot sits on the free list.
pub(crate) struct Slot<K, T> {
    pub generation: u64,
    pub entry: Option<Entry<K, T>>,
}
