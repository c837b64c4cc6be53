//! Integer arithmetic with automatic promotion.
//!
//! [`IntValue`] keeps a machine `i64` whenever the value fits and switches to
//! an arbitrary precision [`BigInt`] only when it does not. Every operation
//! normalizes its result back to the small form when possible, so two equal
//! numbers always have the same representation and the same encoding.

use crate::virtual_machine::errors::VMError;
use num_bigint::BigInt;
use num_traits::{Signed, ToPrimitive};
use std::cmp::Ordering;

/// Maximum integer size in bytes; magnitudes are limited to `8 * MAX_INT_SIZE` bits.
pub const MAX_INT_SIZE: usize = 32;

const MAX_INT_BITS: u64 = (MAX_INT_SIZE * 8) as u64;

const INT_TOO_LARGE: VMError = VMError::InvalidValue {
    reason: "integer exceeds 256 bits",
};

/// Integer operand of arithmetic and bitwise opcodes.
#[derive(Clone, Debug)]
pub enum IntValue {
    /// Value fits in an `i64`.
    Small(i64),
    /// Value outside the `i64` range, at most 256 bits of magnitude.
    Big(BigInt),
}

impl IntValue {
    /// Normalizes a big integer, rejecting magnitudes over the protocol limit.
    pub fn from_bigint(value: BigInt) -> Result<Self, VMError> {
        if let Some(small) = value.to_i64() {
            return Ok(IntValue::Small(small));
        }
        if value.bits() > MAX_INT_BITS {
            return Err(INT_TOO_LARGE);
        }
        Ok(IntValue::Big(value))
    }

    /// Parses little-endian two's-complement bytes. Empty input is zero.
    pub fn from_le_bytes(bytes: &[u8]) -> Result<Self, VMError> {
        if bytes.len() <= 8 {
            // Sign-extend into an i64 without touching the big integer path.
            let mut buf = if bytes.last().is_some_and(|b| b & 0x80 != 0) {
                [0xFF; 8]
            } else {
                [0; 8]
            };
            buf[..bytes.len()].copy_from_slice(bytes);
            return Ok(IntValue::Small(i64::from_le_bytes(buf)));
        }
        Self::from_bigint(BigInt::from_signed_bytes_le(bytes))
    }

    /// Shortest little-endian two's-complement encoding; zero is empty.
    pub fn to_le_bytes(&self) -> Vec<u8> {
        match self {
            IntValue::Small(0) => Vec::new(),
            IntValue::Small(v) => {
                let bytes = v.to_le_bytes();
                let mut len = 8;
                // Drop redundant sign-extension bytes.
                while len > 1 {
                    let top = bytes[len - 1];
                    let next_sign = bytes[len - 2] & 0x80;
                    if (top == 0x00 && next_sign == 0) || (top == 0xFF && next_sign != 0) {
                        len -= 1;
                    } else {
                        break;
                    }
                }
                bytes[..len].to_vec()
            }
            IntValue::Big(v) => v.to_signed_bytes_le(),
        }
    }

    /// Returns the value as an `i64` if it fits.
    pub fn to_i64(&self) -> Option<i64> {
        match self {
            IntValue::Small(v) => Some(*v),
            IntValue::Big(_) => None,
        }
    }

    /// Widens to a big integer.
    pub fn to_bigint(&self) -> BigInt {
        match self {
            IntValue::Small(v) => BigInt::from(*v),
            IntValue::Big(v) => v.clone(),
        }
    }

    pub fn is_zero(&self) -> bool {
        matches!(self, IntValue::Small(0))
    }

    /// Returns -1, 0 or 1.
    pub fn sign(&self) -> i64 {
        match self {
            IntValue::Small(v) => v.signum(),
            IntValue::Big(v) => {
                if v.is_negative() {
                    -1
                } else {
                    1
                }
            }
        }
    }

    pub fn add(&self, other: &IntValue) -> Result<IntValue, VMError> {
        if let (IntValue::Small(a), IntValue::Small(b)) = (self, other) {
            if let Some(v) = a.checked_add(*b) {
                return Ok(IntValue::Small(v));
            }
        }
        Self::from_bigint(self.to_bigint() + other.to_bigint())
    }

    pub fn sub(&self, other: &IntValue) -> Result<IntValue, VMError> {
        if let (IntValue::Small(a), IntValue::Small(b)) = (self, other) {
            if let Some(v) = a.checked_sub(*b) {
                return Ok(IntValue::Small(v));
            }
        }
        Self::from_bigint(self.to_bigint() - other.to_bigint())
    }

    pub fn mul(&self, other: &IntValue) -> Result<IntValue, VMError> {
        if let (IntValue::Small(a), IntValue::Small(b)) = (self, other) {
            if let Some(v) = a.checked_mul(*b) {
                return Ok(IntValue::Small(v));
            }
        }
        Self::from_bigint(self.to_bigint() * other.to_bigint())
    }

    /// Truncating division; division by zero is an error.
    pub fn div(&self, other: &IntValue) -> Result<IntValue, VMError> {
        if other.is_zero() {
            return Err(VMError::InvalidValue {
                reason: "division by zero",
            });
        }
        if let (IntValue::Small(a), IntValue::Small(b)) = (self, other) {
            if let Some(v) = a.checked_div(*b) {
                return Ok(IntValue::Small(v));
            }
        }
        Self::from_bigint(self.to_bigint() / other.to_bigint())
    }

    /// Remainder with the sign of the dividend; modulo by zero is an error.
    pub fn rem(&self, other: &IntValue) -> Result<IntValue, VMError> {
        if other.is_zero() {
            return Err(VMError::InvalidValue {
                reason: "modulo by zero",
            });
        }
        if let (IntValue::Small(a), IntValue::Small(b)) = (self, other) {
            if let Some(v) = a.checked_rem(*b) {
                return Ok(IntValue::Small(v));
            }
        }
        Self::from_bigint(self.to_bigint() % other.to_bigint())
    }

    pub fn and(&self, other: &IntValue) -> Result<IntValue, VMError> {
        match (self, other) {
            (IntValue::Small(a), IntValue::Small(b)) => Ok(IntValue::Small(a & b)),
            _ => Self::from_bigint(self.to_bigint() & other.to_bigint()),
        }
    }

    pub fn or(&self, other: &IntValue) -> Result<IntValue, VMError> {
        match (self, other) {
            (IntValue::Small(a), IntValue::Small(b)) => Ok(IntValue::Small(a | b)),
            _ => Self::from_bigint(self.to_bigint() | other.to_bigint()),
        }
    }

    pub fn xor(&self, other: &IntValue) -> Result<IntValue, VMError> {
        match (self, other) {
            (IntValue::Small(a), IntValue::Small(b)) => Ok(IntValue::Small(a ^ b)),
            _ => Self::from_bigint(self.to_bigint() ^ other.to_bigint()),
        }
    }

    /// Bitwise complement, `-x - 1`.
    pub fn not(&self) -> Result<IntValue, VMError> {
        match self {
            IntValue::Small(a) => Ok(IntValue::Small(!a)),
            IntValue::Big(a) => Self::from_bigint(-a - BigInt::from(1)),
        }
    }

    pub fn neg(&self) -> Result<IntValue, VMError> {
        match self {
            IntValue::Small(a) => match a.checked_neg() {
                Some(v) => Ok(IntValue::Small(v)),
                None => Self::from_bigint(-BigInt::from(*a)),
            },
            IntValue::Big(a) => Self::from_bigint(-a),
        }
    }

    pub fn abs(&self) -> Result<IntValue, VMError> {
        match self {
            IntValue::Small(a) => match a.checked_abs() {
                Some(v) => Ok(IntValue::Small(v)),
                None => Self::from_bigint(BigInt::from(*a).abs()),
            },
            IntValue::Big(a) => Self::from_bigint(a.abs()),
        }
    }

    /// Left shift. The amount must be non-negative and the result must stay
    /// within the integer size limit.
    pub fn shl(&self, amount: &IntValue) -> Result<IntValue, VMError> {
        let amount = shift_amount(amount)?;
        if self.is_zero() || amount == 0 {
            return Ok(self.clone());
        }
        if amount > MAX_INT_BITS {
            return Err(INT_TOO_LARGE);
        }
        Self::from_bigint(self.to_bigint() << amount as usize)
    }

    /// Arithmetic right shift, rounding toward negative infinity.
    pub fn shr(&self, amount: &IntValue) -> Result<IntValue, VMError> {
        let amount = shift_amount(amount)?;
        match self {
            IntValue::Small(a) => Ok(IntValue::Small(a >> amount.min(63))),
            IntValue::Big(a) => {
                if amount > MAX_INT_BITS {
                    return Ok(IntValue::Small(if a.is_negative() { -1 } else { 0 }));
                }
                Self::from_bigint(a >> amount as usize)
            }
        }
    }

    pub fn min(self, other: IntValue) -> IntValue {
        if self <= other { self } else { other }
    }

    pub fn max(self, other: IntValue) -> IntValue {
        if self >= other { self } else { other }
    }
}

fn shift_amount(amount: &IntValue) -> Result<u64, VMError> {
    match amount {
        IntValue::Small(v) if *v >= 0 => Ok(*v as u64),
        IntValue::Small(_) => Err(VMError::InvalidValue {
            reason: "negative shift amount",
        }),
        IntValue::Big(v) if v.is_negative() => Err(VMError::InvalidValue {
            reason: "negative shift amount",
        }),
        IntValue::Big(_) => Ok(u64::MAX),
    }
}

impl From<i64> for IntValue {
    fn from(v: i64) -> Self {
        IntValue::Small(v)
    }
}

impl Ord for IntValue {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (IntValue::Small(a), IntValue::Small(b)) => a.cmp(b),
            _ => self.to_bigint().cmp(&other.to_bigint()),
        }
    }
}

impl PartialOrd for IntValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for IntValue {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for IntValue {}
