//! Storage seam for host-defined opcodes.
//!
//! The [`State`] trait is the key-value interface storage syscalls read from
//! and write to. [`OverlayState`] buffers writes so that a faulted execution
//! can be discarded and a halted one committed.

use std::collections::BTreeMap;

/// Key-value storage consumed by storage syscalls.
pub trait State {
    /// Retrieves a value by key, returning `None` if the key does not exist.
    fn get(&self, key: &[u8]) -> Option<Vec<u8>>;
    /// Stores a key-value pair, overwriting any existing value.
    fn put(&mut self, key: Vec<u8>, value: Vec<u8>);
    /// Removes a key from storage.
    fn delete(&mut self, key: &[u8]);

    /// Applies buffered writes produced by [`OverlayState::into_writes`].
    fn apply(&mut self, writes: Vec<(Vec<u8>, Option<Vec<u8>>)>) {
        for (key, value) in writes {
            match value {
                Some(value) => self.put(key, value),
                None => self.delete(&key),
            }
        }
    }
}

/// In-memory storage.
#[derive(Clone, Debug, Default)]
pub struct MemoryState {
    data: BTreeMap<Vec<u8>, Vec<u8>>,
}

impl MemoryState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_data(data: Vec<(Vec<u8>, Vec<u8>)>) -> Self {
        Self {
            data: data.into_iter().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Entries in ascending key order.
    pub fn iter(&self) -> impl Iterator<Item = (&Vec<u8>, &Vec<u8>)> {
        self.data.iter()
    }
}

impl State for MemoryState {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.data.get(key).cloned()
    }

    fn put(&mut self, key: Vec<u8>, value: Vec<u8>) {
        self.data.insert(key, value);
    }

    fn delete(&mut self, key: &[u8]) {
        self.data.remove(key);
    }
}

/// Write-buffering overlay on top of a base storage.
///
/// Reads fall through to the base for keys not yet written. Dropping the
/// overlay discards every pending write.
pub struct OverlayState<'a> {
    base: &'a dyn State,
    /// Pending writes: `Some(value)` for insertions, `None` for deletions.
    writes: BTreeMap<Vec<u8>, Option<Vec<u8>>>,
}

impl<'a> OverlayState<'a> {
    pub fn new(base: &'a dyn State) -> Self {
        Self {
            base,
            writes: BTreeMap::new(),
        }
    }

    /// Number of keys with a pending write or deletion.
    pub fn pending(&self) -> usize {
        self.writes.len()
    }

    /// Consumes the overlay and returns the pending writes in key order.
    pub fn into_writes(self) -> Vec<(Vec<u8>, Option<Vec<u8>>)> {
        self.writes.into_iter().collect()
    }
}

impl<'a> State for OverlayState<'a> {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        if let Some(v) = self.writes.get(key) {
            return v.clone();
        }
        self.base.get(key)
    }

    fn put(&mut self, key: Vec<u8>, value: Vec<u8>) {
        self.writes.insert(key, Some(value));
    }

    fn delete(&mut self, key: &[u8]) {
        self.writes.insert(key.to_vec(), None);
    }
}
