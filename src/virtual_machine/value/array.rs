//! Sequence containers: the shared [`Array`] and the value-typed [`Struct`].

use crate::virtual_machine::value::StackItem;
use std::cell::{Ref, RefCell};
use std::fmt;
use std::rc::Rc;

/// Maximum number of elements an array or struct may be created with.
pub const MAX_ARRAY_SIZE: usize = 1024;

/// Ordered sequence with reference semantics.
///
/// Cloning the handle aliases the same storage; a mutation through any clone
/// is visible through all of them.
#[derive(Clone, Default)]
pub struct Array(Rc<RefCell<Vec<StackItem>>>);

impl Array {
    pub fn new(items: Vec<StackItem>) -> Self {
        Self(Rc::new(RefCell::new(items)))
    }

    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }

    /// Returns a copy of the element at `index`.
    pub fn get(&self, index: usize) -> Option<StackItem> {
        self.0.borrow().get(index).cloned()
    }

    /// Replaces the element at `index`. Returns `false` if out of range.
    pub fn set(&self, index: usize, item: StackItem) -> bool {
        match self.0.borrow_mut().get_mut(index) {
            Some(slot) => {
                *slot = item;
                true
            }
            None => false,
        }
    }

    pub fn push(&self, item: StackItem) {
        self.0.borrow_mut().push(item);
    }

    /// Removes and returns the element at `index`, shifting later elements down.
    pub fn remove(&self, index: usize) -> Option<StackItem> {
        let mut items = self.0.borrow_mut();
        if index < items.len() {
            Some(items.remove(index))
        } else {
            None
        }
    }

    pub fn reverse(&self) {
        self.0.borrow_mut().reverse();
    }

    /// Borrows the elements for iteration.
    pub fn items(&self) -> Ref<'_, Vec<StackItem>> {
        self.0.borrow()
    }

    /// Copies the elements out.
    pub fn to_vec(&self) -> Vec<StackItem> {
        self.0.borrow().clone()
    }

    /// Returns true if both handles alias the same storage.
    pub fn ptr_eq(&self, other: &Array) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Array {
    // Arrays can contain themselves, so only the length is printed.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.try_borrow() {
            Ok(items) => write!(f, "Array(len={})", items.len()),
            Err(_) => f.write_str("Array(<borrowed>)"),
        }
    }
}

/// Ordered sequence with value semantics.
///
/// Stack copies share storage, so `SETITEM` through any of them is visible
/// to all. Storing a struct into a container goes through
/// [`Struct::deep_clone`], which copies nested structs recursively while
/// nested arrays and maps keep aliasing their storage.
#[derive(Clone, Default)]
pub struct Struct(Rc<RefCell<Vec<StackItem>>>);

impl Struct {
    pub fn new(items: Vec<StackItem>) -> Self {
        Self(Rc::new(RefCell::new(items)))
    }

    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }

    /// Returns a copy of the field at `index`.
    pub fn get(&self, index: usize) -> Option<StackItem> {
        self.0.borrow().get(index).cloned()
    }

    /// Replaces the field at `index`. Returns `false` if out of range.
    pub fn set(&self, index: usize, item: StackItem) -> bool {
        match self.0.borrow_mut().get_mut(index) {
            Some(slot) => {
                *slot = item;
                true
            }
            None => false,
        }
    }

    /// Borrows the fields for iteration.
    pub fn items(&self) -> Ref<'_, Vec<StackItem>> {
        self.0.borrow()
    }

    /// Copies the fields out without cloning nested structs.
    pub fn to_vec(&self) -> Vec<StackItem> {
        self.0.borrow().clone()
    }

    /// Returns true if both handles alias the same storage.
    pub fn ptr_eq(&self, other: &Struct) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Copies the struct into fresh storage, recursing into nested structs.
    ///
    /// Struct fields only ever hold deep copies, so the recursion follows a
    /// tree and terminates.
    pub fn deep_clone(&self) -> Struct {
        let items = self
            .0
            .borrow()
            .iter()
            .map(StackItem::deep_clone)
            .collect();
        Struct::new(items)
    }

    /// Field-wise equality using [`StackItem::equals`].
    pub fn deep_equals(&self, other: &Struct) -> bool {
        if self.ptr_eq(other) {
            return true;
        }
        let (a, b) = (self.0.borrow(), other.0.borrow());
        a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x.equals(y))
    }
}

impl fmt::Debug for Struct {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.try_borrow() {
            Ok(items) => f.debug_tuple("Struct").field(&*items).finish(),
            Err(_) => f.write_str("Struct(<borrowed>)"),
        }
    }
}
