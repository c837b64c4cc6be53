//! Canonical binary encoding of stack items.
//!
//! Each value is a type tag followed by a payload:
//!
//! | Variant | Tag | Payload |
//! |---|---|---|
//! | `ByteArray` | `0x00` | var-length bytes |
//! | `Boolean` | `0x01` | one byte, 0 or 1 |
//! | `Integer`/`BigInteger` | `0x02` | var-length shortest two's-complement LE bytes |
//! | `Array` | `0x80` | var-length count, then each element |
//! | `Struct` | `0x81` | var-length count, then each element |
//! | `Map` | `0x82` | var-length count, then (`ByteArray` key, value) pairs sorted by key |
//!
//! Interop handles have no encoding. The layout is part of the protocol: any
//! change to tags, prefixes or key order changes hashes across the network.
//!
//! Arrays can alias one another, so a small heap can stand for an encoding
//! exponentially larger than itself. Encoding stops with `SizeLimitExceeded`
//! once [`MAX_SERIALIZED_SIZE`] bytes would be produced.

use crate::types::encoding::{
    Decode, DecodeError, Encode, EncodeSink, SizeCounter, VarUint, read_bytes, read_var_bytes,
    write_var_bytes,
};
use crate::virtual_machine::errors::VMError;
use crate::virtual_machine::value::{
    Array, IntValue, MAX_ARRAY_SIZE, MAX_BYTEARRAY_SIZE, Map, StackItem, Struct,
};

/// Type tag of a byte array.
pub const TAG_BYTE_ARRAY: u8 = 0x00;
/// Type tag of a boolean.
pub const TAG_BOOLEAN: u8 = 0x01;
/// Type tag of an integer of either width.
pub const TAG_INTEGER: u8 = 0x02;
/// Type tag of an array.
pub const TAG_ARRAY: u8 = 0x80;
/// Type tag of a struct.
pub const TAG_STRUCT: u8 = 0x81;
/// Type tag of a map.
pub const TAG_MAP: u8 = 0x82;

/// Maximum depth of nested compound values accepted in either direction.
pub const MAX_NESTING_DEPTH: usize = 64;

/// Maximum length of one canonical encoding.
pub const MAX_SERIALIZED_SIZE: usize = 2 * MAX_BYTEARRAY_SIZE;

/// Sink adapter that stops forwarding once the byte budget is spent.
struct Bounded<'a, S: EncodeSink> {
    inner: &'a mut S,
    written: usize,
}

impl<S: EncodeSink> EncodeSink for Bounded<'_, S> {
    fn write(&mut self, bytes: &[u8]) {
        self.written = self.written.saturating_add(bytes.len());
        if self.written <= MAX_SERIALIZED_SIZE {
            self.inner.write(bytes);
        }
    }
}

impl<S: EncodeSink> Bounded<'_, S> {
    fn check(&self) -> Result<(), VMError> {
        if self.written > MAX_SERIALIZED_SIZE {
            return Err(VMError::SizeLimitExceeded {
                size: self.written,
                limit: MAX_SERIALIZED_SIZE,
            });
        }
        Ok(())
    }
}

/// Serializes a value into a new buffer.
pub fn serialize(item: &StackItem) -> Result<Vec<u8>, VMError> {
    let mut out = Vec::new();
    serialize_into(item, &mut out)?;
    Ok(out)
}

/// Serializes a value into any sink, such as a hasher.
///
/// On error the sink may already hold a prefix of the encoding.
pub fn serialize_into<S: EncodeSink>(item: &StackItem, out: &mut S) -> Result<(), VMError> {
    let mut out = Bounded {
        inner: out,
        written: 0,
    };
    write_item(item, &mut out, 0)?;
    out.check()
}

fn write_item<S: EncodeSink>(
    item: &StackItem,
    out: &mut Bounded<'_, S>,
    depth: usize,
) -> Result<(), VMError> {
    out.check()?;
    match item {
        StackItem::Boolean(b) => {
            TAG_BOOLEAN.encode(out);
            b.encode(out);
        }
        StackItem::ByteArray(b) => {
            TAG_BYTE_ARRAY.encode(out);
            b.encode(out);
        }
        StackItem::Integer(_) | StackItem::BigInteger(_) => {
            TAG_INTEGER.encode(out);
            write_var_bytes(out, &item.as_bytes()?);
        }
        StackItem::Array(a) => {
            check_depth(depth)?;
            TAG_ARRAY.encode(out);
            write_sequence(a.items().iter(), out, depth)?;
        }
        StackItem::Struct(s) => {
            check_depth(depth)?;
            TAG_STRUCT.encode(out);
            write_sequence(s.items().iter(), out, depth)?;
        }
        StackItem::Map(m) => {
            check_depth(depth)?;
            TAG_MAP.encode(out);
            let entries = m.entries();
            VarUint(entries.len() as u64).encode(out);
            for (key, value) in &entries {
                TAG_BYTE_ARRAY.encode(out);
                write_var_bytes(out, key);
                write_item(value, out, depth + 1)?;
            }
        }
        StackItem::Interop(_) => {
            return Err(VMError::TypeMismatch {
                expected: "serializable value",
                actual: item.type_name(),
            });
        }
    }
    Ok(())
}

fn write_sequence<'a, S: EncodeSink>(
    items: impl ExactSizeIterator<Item = &'a StackItem>,
    out: &mut Bounded<'_, S>,
    depth: usize,
) -> Result<(), VMError> {
    VarUint(items.len() as u64).encode(out);
    for item in items {
        write_item(item, out, depth + 1)?;
    }
    Ok(())
}

fn check_depth(depth: usize) -> Result<(), VMError> {
    if depth >= MAX_NESTING_DEPTH {
        return Err(VMError::SizeLimitExceeded {
            size: depth + 1,
            limit: MAX_NESTING_DEPTH,
        });
    }
    Ok(())
}

/// Deserializes exactly one value; trailing bytes are irregular.
pub fn deserialize(data: &[u8]) -> Result<StackItem, DecodeError> {
    let mut input = data;
    let item = read_item(&mut input, 0)?;
    if !input.is_empty() {
        return Err(DecodeError::IrregularData);
    }
    Ok(item)
}

/// Deserializes one value from the front of `input`, advancing it.
pub fn deserialize_from(input: &mut &[u8]) -> Result<StackItem, DecodeError> {
    read_item(input, 0)
}

fn read_item(input: &mut &[u8], depth: usize) -> Result<StackItem, DecodeError> {
    match u8::decode(input)? {
        TAG_BOOLEAN => Ok(StackItem::Boolean(bool::decode(input)?)),
        TAG_BYTE_ARRAY => {
            let data = read_var_bytes(input)?;
            StackItem::bytes(data).map_err(|_| DecodeError::LengthOverflow)
        }
        TAG_INTEGER => {
            let data = read_var_bytes(input)?;
            let value = IntValue::from_le_bytes(data).map_err(|_| DecodeError::LengthOverflow)?;
            // Only the shortest form is canonical.
            if value.to_le_bytes() != data {
                return Err(DecodeError::IrregularData);
            }
            Ok(StackItem::from(value))
        }
        TAG_ARRAY => {
            let items = read_sequence(input, depth)?;
            Ok(StackItem::Array(Array::new(items)))
        }
        TAG_STRUCT => {
            let items = read_sequence(input, depth)?;
            Ok(StackItem::Struct(Struct::new(items)))
        }
        TAG_MAP => {
            let count = read_count(input, depth, 4)?;
            let map = Map::new();
            for _ in 0..count {
                // Keys are always written as byte arrays.
                if u8::decode(input)? != TAG_BYTE_ARRAY {
                    return Err(DecodeError::IrregularData);
                }
                let key = read_var_bytes(input)?;
                if key.len() > MAX_BYTEARRAY_SIZE {
                    return Err(DecodeError::LengthOverflow);
                }
                let value = read_item(input, depth + 1)?;
                if map.insert(key.to_vec(), value).is_some() {
                    return Err(DecodeError::IrregularData);
                }
            }
            Ok(StackItem::Map(map))
        }
        tag => Err(DecodeError::UnknownTag(tag)),
    }
}

fn read_sequence(input: &mut &[u8], depth: usize) -> Result<Vec<StackItem>, DecodeError> {
    let count = read_count(input, depth, 2)?;
    let mut items = Vec::with_capacity(count);
    for _ in 0..count {
        items.push(read_item(input, depth + 1)?);
    }
    Ok(items)
}

/// Reads an element count, rejecting counts that cannot fit in the rest of
/// the input given that each element takes at least `min_item_bytes`.
fn read_count(
    input: &mut &[u8],
    depth: usize,
    min_item_bytes: usize,
) -> Result<usize, DecodeError> {
    if depth >= MAX_NESTING_DEPTH {
        return Err(DecodeError::LengthOverflow);
    }
    let count = VarUint::decode(input)?.0;
    let count = usize::try_from(count).map_err(|_| DecodeError::LengthOverflow)?;
    if count > MAX_ARRAY_SIZE {
        return Err(DecodeError::LengthOverflow);
    }
    let needed = count.saturating_mul(min_item_bytes);
    // Peek so the error is reported without consuming the remaining input.
    read_bytes(&mut &input[..], needed)?;
    Ok(count)
}

/// Returns the size of the canonical encoding without allocating it.
pub fn serialized_size(item: &StackItem) -> Result<usize, VMError> {
    let mut counter = SizeCounter::new();
    serialize_into(item, &mut counter)?;
    Ok(counter.len())
}
