//! Binary encoding and decoding primitives for the canonical wire format.
//!
//! All fixed-width integers are little-endian. Lengths and counts use the
//! variable-length unsigned prefix shared with the rest of the protocol:
//!
//! - `< 0xFD`: one byte holding the value
//! - `<= 0xFFFF`: `0xFD` followed by a `u16`
//! - `<= 0xFFFF_FFFF`: `0xFE` followed by a `u32`
//! - otherwise: `0xFF` followed by a `u64`
//!
//! Decoding is strict: a prefix that is not the shortest form for its value,
//! or a boolean byte other than 0/1, is rejected as [`DecodeError::IrregularData`]
//! so that every value has exactly one accepted encoding.

use crate::types::bytes::Bytes;
use thiserror::Error;

/// Sink for writing encoded bytes.
///
/// Implemented by byte buffers and hashers to allow encoding directly into
/// the target without intermediate allocations.
pub trait EncodeSink {
    /// Writes the given bytes to the sink.
    fn write(&mut self, bytes: &[u8]);
}

/// Counter for computing encoded size without allocating memory.
#[derive(Default)]
pub struct SizeCounter {
    len: usize,
}

impl SizeCounter {
    /// Creates a new counter initialized to zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of bytes counted.
    pub fn len(&self) -> usize {
        self.len
    }
}

impl EncodeSink for SizeCounter {
    fn write(&mut self, bytes: &[u8]) {
        self.len += bytes.len();
    }
}

impl EncodeSink for Vec<u8> {
    fn write(&mut self, bytes: &[u8]) {
        self.extend_from_slice(bytes);
    }
}

/// Trait for types that can be serialized to binary format.
pub trait Encode {
    /// Writes the binary representation to the given sink.
    fn encode<S: EncodeSink>(&self, out: &mut S);

    /// Serializes to a new buffer with exact capacity.
    fn to_bytes(&self) -> Vec<u8> {
        let mut counter = SizeCounter::new();
        self.encode(&mut counter);

        let mut out = Vec::with_capacity(counter.len());
        self.encode(&mut out);
        out
    }
}

/// Errors that can occur during decoding.
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum DecodeError {
    /// Input ended before expected data was read.
    #[error("unexpected end of input")]
    UnexpectedEof,
    /// Data is well-formed but not in its canonical form, or trailing bytes remain.
    #[error("irregular data")]
    IrregularData,
    /// Leading type tag does not name a serializable value.
    #[error("unknown type tag 0x{0:02x}")]
    UnknownTag(u8),
    /// Length, count, or nesting exceeds a protocol limit.
    #[error("length exceeds protocol limit")]
    LengthOverflow,
}

/// Trait for types that can be deserialized from binary format.
pub trait Decode: Sized {
    /// Reads and decodes a value from the input buffer.
    ///
    /// Advances the input slice past the consumed bytes.
    fn decode(input: &mut &[u8]) -> Result<Self, DecodeError>;

    /// Decodes a value from a byte slice, requiring all bytes to be consumed.
    fn from_bytes(data: &[u8]) -> Result<Self, DecodeError> {
        let mut input = data;
        let value = Self::decode(&mut input)?;

        if !input.is_empty() {
            return Err(DecodeError::IrregularData);
        }

        Ok(value)
    }
}

/// Reads exactly `n` bytes from the input, advancing the slice.
pub fn read_bytes<'a>(input: &mut &'a [u8], n: usize) -> Result<&'a [u8], DecodeError> {
    if input.len() < n {
        return Err(DecodeError::UnexpectedEof);
    }
    let (bytes, rest) = input.split_at(n);
    *input = rest;
    Ok(bytes)
}

impl Encode for u8 {
    fn encode<S: EncodeSink>(&self, out: &mut S) {
        out.write(&[*self]);
    }
}

impl Decode for u8 {
    fn decode(input: &mut &[u8]) -> Result<Self, DecodeError> {
        let bytes = read_bytes(input, 1)?;
        Ok(bytes[0])
    }
}

macro_rules! impl_int {
    ($($t:ty),*) => {
        $(
            impl Encode for $t {
                fn encode<S: EncodeSink>(&self, out: &mut S) {
                    out.write(&self.to_le_bytes());
                }
            }

            impl Decode for $t {
                fn decode(input: &mut &[u8]) -> Result<Self, DecodeError> {
                    let mut buf = [0u8; std::mem::size_of::<$t>()];
                    buf.copy_from_slice(read_bytes(input, std::mem::size_of::<$t>())?);
                    Ok(<$t>::from_le_bytes(buf))
                }
            }
        )*
    };
}

impl_int!(u16, u32, u64);

impl Encode for bool {
    fn encode<S: EncodeSink>(&self, out: &mut S) {
        out.write(&[*self as u8]);
    }
}

impl Decode for bool {
    fn decode(input: &mut &[u8]) -> Result<Self, DecodeError> {
        match u8::decode(input)? {
            0 => Ok(false),
            1 => Ok(true),
            _ => Err(DecodeError::IrregularData),
        }
    }
}

/// Variable-length unsigned integer used for lengths and element counts.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct VarUint(pub u64);

impl Encode for VarUint {
    fn encode<S: EncodeSink>(&self, out: &mut S) {
        let v = self.0;
        if v < 0xFD {
            (v as u8).encode(out);
        } else if v <= 0xFFFF {
            0xFDu8.encode(out);
            (v as u16).encode(out);
        } else if v <= 0xFFFF_FFFF {
            0xFEu8.encode(out);
            (v as u32).encode(out);
        } else {
            0xFFu8.encode(out);
            v.encode(out);
        }
    }
}

impl Decode for VarUint {
    fn decode(input: &mut &[u8]) -> Result<Self, DecodeError> {
        let (value, min) = match u8::decode(input)? {
            0xFD => (u16::decode(input)? as u64, 0xFD),
            0xFE => (u32::decode(input)? as u64, 0x1_0000),
            0xFF => (u64::decode(input)?, 0x1_0000_0000),
            small => return Ok(VarUint(small as u64)),
        };
        if value < min {
            return Err(DecodeError::IrregularData);
        }
        Ok(VarUint(value))
    }
}

/// Writes a length-prefixed byte string.
pub fn write_var_bytes<S: EncodeSink>(out: &mut S, bytes: &[u8]) {
    VarUint(bytes.len() as u64).encode(out);
    out.write(bytes);
}

/// Reads a length-prefixed byte string, borrowing from the input.
pub fn read_var_bytes<'a>(input: &mut &'a [u8]) -> Result<&'a [u8], DecodeError> {
    let len = VarUint::decode(input)?.0;
    let len = usize::try_from(len).map_err(|_| DecodeError::LengthOverflow)?;
    read_bytes(input, len)
}

impl Encode for Bytes {
    fn encode<S: EncodeSink>(&self, out: &mut S) {
        write_var_bytes(out, self.as_slice());
    }
}

impl Decode for Bytes {
    fn decode(input: &mut &[u8]) -> Result<Self, DecodeError> {
        Ok(Bytes::from(read_var_bytes(input)?))
    }
}
