use crate::types::bytes::Bytes;
use crate::virtual_machine::errors::VMError;
use crate::virtual_machine::value::{Array, IntValue, Map, StackItem};

/// Maximum number of items on each of the evaluation and alt stacks.
pub const STACK_LIMIT: usize = 2048;

/// Bounded stack of values addressed from the top.
///
/// Depth `0` is the top item. Multi-pop helpers return items in argument
/// order, so `pop_pair` yields `(second, top)`: for `SUB` that is `a - b`
/// with `b` on top.
#[derive(Clone, Debug)]
pub struct ValueStack {
    items: Vec<StackItem>,
    limit: usize,
}

impl Default for ValueStack {
    fn default() -> Self {
        Self::new(STACK_LIMIT)
    }
}

impl ValueStack {
    /// Creates an empty stack holding at most `limit` items.
    pub fn new(limit: usize) -> Self {
        Self {
            items: Vec::new(),
            limit,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Iterates from the top of the stack down.
    pub fn iter(&self) -> impl Iterator<Item = &StackItem> {
        self.items.iter().rev()
    }

    pub fn push(&mut self, item: StackItem) -> Result<(), VMError> {
        if self.items.len() >= self.limit {
            return Err(VMError::StackOverflow { limit: self.limit });
        }
        self.items.push(item);
        Ok(())
    }

    pub fn pop(&mut self) -> Result<StackItem, VMError> {
        self.items.pop().ok_or(VMError::StackUnderflow)
    }

    /// Converts a depth into a vector index.
    ///
    /// `extra` widens the valid range for insertion, which may target the
    /// slot just below the bottom item.
    fn slot(&self, n: i64, extra: usize) -> Result<usize, VMError> {
        let len = self.items.len();
        let depth = usize::try_from(n).map_err(|_| VMError::IndexOutOfBound { index: n, len })?;
        if depth >= len + extra {
            return Err(VMError::StackUnderflow);
        }
        Ok(len - depth - 1 + extra)
    }

    /// Returns the item at depth `n` without removing it.
    pub fn peek(&self, n: i64) -> Result<&StackItem, VMError> {
        let idx = self.slot(n, 0)?;
        Ok(&self.items[idx])
    }

    /// Removes and returns the item at depth `n`.
    pub fn remove(&mut self, n: i64) -> Result<StackItem, VMError> {
        let idx = self.slot(n, 0)?;
        Ok(self.items.remove(idx))
    }

    /// Inserts `item` so that it ends up at depth `n`.
    pub fn insert(&mut self, n: i64, item: StackItem) -> Result<(), VMError> {
        let idx = self.slot(n, 1)?;
        if self.items.len() >= self.limit {
            return Err(VMError::StackOverflow { limit: self.limit });
        }
        self.items.insert(idx, item);
        Ok(())
    }

    /// Exchanges the items at depths `i` and `j`.
    pub fn swap(&mut self, i: i64, j: i64) -> Result<(), VMError> {
        let a = self.slot(i, 0)?;
        let b = self.slot(j, 0)?;
        self.items.swap(a, b);
        Ok(())
    }

    /// Pops two items, returned as `(second, top)`.
    pub fn pop_pair(&mut self) -> Result<(StackItem, StackItem), VMError> {
        let top = self.pop()?;
        let second = self.pop()?;
        Ok((second, top))
    }

    /// Pops three items, returned as `(third, second, top)`.
    pub fn pop_triple(&mut self) -> Result<(StackItem, StackItem, StackItem), VMError> {
        let top = self.pop()?;
        let second = self.pop()?;
        let third = self.pop()?;
        Ok((third, second, top))
    }

    pub fn pop_bool(&mut self) -> Result<bool, VMError> {
        self.pop()?.as_bool()
    }

    pub fn pop_int(&mut self) -> Result<IntValue, VMError> {
        self.pop()?.as_int()
    }

    pub fn pop_int64(&mut self) -> Result<i64, VMError> {
        self.pop()?.as_int64()
    }

    pub fn pop_bytes(&mut self) -> Result<Bytes, VMError> {
        self.pop()?.as_bytes()
    }

    pub fn pop_array(&mut self) -> Result<Array, VMError> {
        self.pop()?.as_array()
    }

    pub fn pop_map(&mut self) -> Result<Map, VMError> {
        self.pop()?.as_map()
    }

    pub fn pop_pair_int(&mut self) -> Result<(IntValue, IntValue), VMError> {
        let (a, b) = self.pop_pair()?;
        Ok((a.as_int()?, b.as_int()?))
    }

    pub fn pop_pair_bool(&mut self) -> Result<(bool, bool), VMError> {
        let (a, b) = self.pop_pair()?;
        Ok((a.as_bool()?, b.as_bool()?))
    }

    pub fn pop_pair_bytes(&mut self) -> Result<(Bytes, Bytes), VMError> {
        let (a, b) = self.pop_pair()?;
        Ok((a.as_bytes()?, b.as_bytes()?))
    }

    pub fn pop_triple_int(&mut self) -> Result<(IntValue, IntValue, IntValue), VMError> {
        let (a, b, c) = self.pop_triple()?;
        Ok((a.as_int()?, b.as_int()?, c.as_int()?))
    }

    pub fn pop_triple_bytes(&mut self) -> Result<(Bytes, Bytes, Bytes), VMError> {
        let (a, b, c) = self.pop_triple()?;
        Ok((a.as_bytes()?, b.as_bytes()?, c.as_bytes()?))
    }
}
