//! Key-value container keyed by canonical byte representation.

use crate::virtual_machine::value::StackItem;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

/// Map with reference semantics.
///
/// Keys are the `AsBytes` form of primitive values, so `Integer(1)`,
/// `Boolean(true)` and `ByteArray([1])` address the same entry. Entries are
/// kept sorted by key bytes, which gives deterministic iteration.
#[derive(Clone, Default)]
pub struct Map(Rc<RefCell<BTreeMap<Vec<u8>, StackItem>>>);

impl Map {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }

    pub fn get(&self, key: &[u8]) -> Option<StackItem> {
        self.0.borrow().get(key).cloned()
    }

    pub fn contains_key(&self, key: &[u8]) -> bool {
        self.0.borrow().contains_key(key)
    }

    /// Inserts or replaces an entry, returning the previous value.
    pub fn insert(&self, key: Vec<u8>, value: StackItem) -> Option<StackItem> {
        self.0.borrow_mut().insert(key, value)
    }

    pub fn remove(&self, key: &[u8]) -> Option<StackItem> {
        self.0.borrow_mut().remove(key)
    }

    /// Keys in ascending byte order.
    pub fn keys(&self) -> Vec<Vec<u8>> {
        self.0.borrow().keys().cloned().collect()
    }

    /// Values in ascending key order.
    pub fn values(&self) -> Vec<StackItem> {
        self.0.borrow().values().cloned().collect()
    }

    /// Entries in ascending key order.
    pub fn entries(&self) -> Vec<(Vec<u8>, StackItem)> {
        self.0
            .borrow()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Returns true if both handles alias the same storage.
    pub fn ptr_eq(&self, other: &Map) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Map {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.try_borrow() {
            Ok(entries) => write!(f, "Map(len={})", entries.len()),
            Err(_) => f.write_str("Map(<borrowed>)"),
        }
    }
}
