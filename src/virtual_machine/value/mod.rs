//! Runtime value model.
//!
//! [`StackItem`] is the closed set of values the interpreter manipulates.
//! Primitive variants (`Boolean`, `Integer`, `BigInteger`, `ByteArray`) all
//! convert to bytes and compare by those bytes. Compound variants differ in
//! sharing: [`Array`] and [`Map`] are reference types; a [`Struct`] is shared
//! on the stacks but deep-copied whenever it is stored into a container, and
//! compares field by field.
//!
//! Conversion acceptance:
//!
//! | Conversion | Accepts | Rejects |
//! |---|---|---|
//! | `as_bytes` | primitives | compounds, interop |
//! | `as_bool` | primitives, struct and map (true), interop (non-null) | array |
//! | `as_int` | primitives (bytes as little-endian two's complement) | compounds, interop |

mod array;
mod int;
mod map;

pub use array::{Array, MAX_ARRAY_SIZE, Struct};
pub use int::{IntValue, MAX_INT_SIZE};
pub use map::Map;

use crate::types::bytes::Bytes;
use crate::types::hash::Hash;
use crate::virtual_machine::codec;
use crate::virtual_machine::errors::VMError;
use num_bigint::BigInt;

/// Maximum length of a byte array value.
pub const MAX_BYTEARRAY_SIZE: usize = 1024 * 1024;

/// Opaque host object handle.
///
/// Equality is handle identity; the null handle converts to `false`.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
pub struct Interop(Option<u64>);

impl Interop {
    pub const fn new(handle: u64) -> Self {
        Self(Some(handle))
    }

    pub const fn null() -> Self {
        Self(None)
    }

    pub const fn handle(&self) -> Option<u64> {
        self.0
    }

    pub const fn is_null(&self) -> bool {
        self.0.is_none()
    }
}

/// A value on the evaluation or alt stack.
#[derive(Clone, Debug)]
pub enum StackItem {
    Boolean(bool),
    /// Integer that fits in 64 bits.
    Integer(i64),
    /// Integer outside the 64-bit range; never holds a value that fits in `i64`.
    BigInteger(BigInt),
    ByteArray(Bytes),
    Array(Array),
    Struct(Struct),
    Map(Map),
    Interop(Interop),
}

impl StackItem {
    /// Creates a byte array value, enforcing [`MAX_BYTEARRAY_SIZE`].
    pub fn bytes(data: impl Into<Bytes>) -> Result<Self, VMError> {
        let data = data.into();
        if data.len() > MAX_BYTEARRAY_SIZE {
            return Err(VMError::SizeLimitExceeded {
                size: data.len(),
                limit: MAX_BYTEARRAY_SIZE,
            });
        }
        Ok(StackItem::ByteArray(data))
    }

    /// Creates an integer value, enforcing the integer size limit.
    pub fn from_bigint(value: BigInt) -> Result<Self, VMError> {
        IntValue::from_bigint(value).map(StackItem::from)
    }

    /// Creates an array, enforcing [`MAX_ARRAY_SIZE`].
    pub fn array(items: Vec<StackItem>) -> Result<Self, VMError> {
        check_count(items.len())?;
        Ok(StackItem::Array(Array::new(items)))
    }

    /// Creates a struct, enforcing [`MAX_ARRAY_SIZE`].
    pub fn structure(items: Vec<StackItem>) -> Result<Self, VMError> {
        check_count(items.len())?;
        Ok(StackItem::Struct(Struct::new(items)))
    }

    /// Creates an empty map.
    pub fn map() -> Self {
        StackItem::Map(Map::new())
    }

    /// Returns the variant name for error messages.
    pub const fn type_name(&self) -> &'static str {
        match self {
            StackItem::Boolean(_) => "Boolean",
            StackItem::Integer(_) => "Integer",
            StackItem::BigInteger(_) => "BigInteger",
            StackItem::ByteArray(_) => "ByteArray",
            StackItem::Array(_) => "Array",
            StackItem::Struct(_) => "Struct",
            StackItem::Map(_) => "Map",
            StackItem::Interop(_) => "Interop",
        }
    }

    fn mismatch(&self, expected: &'static str) -> VMError {
        VMError::TypeMismatch {
            expected,
            actual: self.type_name(),
        }
    }

    /// Byte form of a primitive value.
    ///
    /// Booleans are `[1]` or empty; integers use the shortest two's-complement
    /// little-endian form, zero being empty.
    pub fn as_bytes(&self) -> Result<Bytes, VMError> {
        match self {
            StackItem::Boolean(true) => Ok(Bytes::from([1u8])),
            StackItem::Boolean(false) => Ok(Bytes::default()),
            StackItem::Integer(v) => Ok(Bytes::from(IntValue::Small(*v).to_le_bytes())),
            StackItem::BigInteger(v) => Ok(Bytes::from(v.to_signed_bytes_le())),
            StackItem::ByteArray(b) => Ok(b.clone()),
            _ => Err(self.mismatch("ByteArray")),
        }
    }

    pub fn as_bool(&self) -> Result<bool, VMError> {
        match self {
            StackItem::Boolean(b) => Ok(*b),
            StackItem::Integer(v) => Ok(*v != 0),
            StackItem::BigInteger(_) => Ok(true),
            StackItem::ByteArray(b) => Ok(b.iter().any(|&x| x != 0)),
            StackItem::Struct(_) | StackItem::Map(_) => Ok(true),
            StackItem::Interop(i) => Ok(!i.is_null()),
            StackItem::Array(_) => Err(self.mismatch("Boolean")),
        }
    }

    pub fn as_int(&self) -> Result<IntValue, VMError> {
        match self {
            StackItem::Boolean(b) => Ok(IntValue::Small(*b as i64)),
            StackItem::Integer(v) => Ok(IntValue::Small(*v)),
            StackItem::BigInteger(v) => IntValue::from_bigint(v.clone()),
            StackItem::ByteArray(b) => IntValue::from_le_bytes(b),
            _ => Err(self.mismatch("Integer")),
        }
    }

    /// Integer conversion restricted to the 64-bit range.
    pub fn as_int64(&self) -> Result<i64, VMError> {
        self.as_int()?.to_i64().ok_or(VMError::InvalidValue {
            reason: "integer does not fit in 64 bits",
        })
    }

    pub fn as_array(&self) -> Result<Array, VMError> {
        match self {
            StackItem::Array(a) => Ok(a.clone()),
            _ => Err(self.mismatch("Array")),
        }
    }

    pub fn as_struct(&self) -> Result<Struct, VMError> {
        match self {
            StackItem::Struct(s) => Ok(s.clone()),
            _ => Err(self.mismatch("Struct")),
        }
    }

    pub fn as_map(&self) -> Result<Map, VMError> {
        match self {
            StackItem::Map(m) => Ok(m.clone()),
            _ => Err(self.mismatch("Map")),
        }
    }

    pub fn as_interop(&self) -> Result<Interop, VMError> {
        match self {
            StackItem::Interop(i) => Ok(*i),
            _ => Err(self.mismatch("Interop")),
        }
    }

    /// Protocol equality used by `EQUAL`.
    ///
    /// Primitives compare by their byte form, so `Integer(1)`, `Boolean(true)`
    /// and `ByteArray([1])` are equal. Otherwise the variants must match:
    /// arrays and maps compare by identity, structs field by field, interop
    /// handles by handle.
    pub fn equals(&self, other: &StackItem) -> bool {
        if let (Ok(a), Ok(b)) = (self.as_bytes(), other.as_bytes()) {
            return a == b;
        }
        match (self, other) {
            (StackItem::Array(a), StackItem::Array(b)) => a.ptr_eq(b),
            (StackItem::Map(a), StackItem::Map(b)) => a.ptr_eq(b),
            (StackItem::Struct(a), StackItem::Struct(b)) => a.deep_equals(b),
            (StackItem::Interop(a), StackItem::Interop(b)) => a == b,
            _ => false,
        }
    }

    /// Copy used when a value is stored into a container: structs get fresh
    /// storage, every other variant is cloned as is.
    pub fn deep_clone(&self) -> StackItem {
        match self {
            StackItem::Struct(s) => StackItem::Struct(s.deep_clone()),
            other => other.clone(),
        }
    }

    /// SHA3-256 of the canonical encoding.
    ///
    /// Fails for values that cannot be serialized (interop handles, nesting
    /// deeper than the codec allows).
    pub fn hash(&self) -> Result<Hash, VMError> {
        let mut h = Hash::sha3();
        codec::serialize_into(self, &mut h)?;
        Ok(h.finalize())
    }
}

fn check_count(count: usize) -> Result<(), VMError> {
    if count > MAX_ARRAY_SIZE {
        return Err(VMError::SizeLimitExceeded {
            size: count,
            limit: MAX_ARRAY_SIZE,
        });
    }
    Ok(())
}

impl From<bool> for StackItem {
    fn from(v: bool) -> Self {
        StackItem::Boolean(v)
    }
}

impl From<i64> for StackItem {
    fn from(v: i64) -> Self {
        StackItem::Integer(v)
    }
}

impl From<IntValue> for StackItem {
    fn from(v: IntValue) -> Self {
        match v {
            IntValue::Small(v) => StackItem::Integer(v),
            IntValue::Big(v) => StackItem::BigInteger(v),
        }
    }
}

impl From<Array> for StackItem {
    fn from(v: Array) -> Self {
        StackItem::Array(v)
    }
}

impl From<Struct> for StackItem {
    fn from(v: Struct) -> Self {
        StackItem::Struct(v)
    }
}

impl From<Map> for StackItem {
    fn from(v: Map) -> Self {
        StackItem::Map(v)
    }
}

impl From<Interop> for StackItem {
    fn from(v: Interop) -> Self {
        StackItem::Interop(v)
    }
}
