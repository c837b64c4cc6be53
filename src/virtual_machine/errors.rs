use crate::types::encoding::DecodeError;
use thiserror::Error;

/// Errors that can occur during VM execution.
///
/// Every variant is terminal: once an opcode handler returns one, the machine
/// transitions to `Fault` and the error is kept for later inspection.
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum VMError {
    /// Pop or peek on a stack with too few items.
    #[error("stack underflow")]
    StackUnderflow,
    /// Push past the stack limit, or CALL past the invocation depth limit.
    #[error("stack overflow: limit is {limit}")]
    StackOverflow { limit: usize },
    /// Value variant does not support the requested conversion.
    #[error("type mismatch: expected {expected}, got {actual}")]
    TypeMismatch {
        expected: &'static str,
        actual: &'static str,
    },
    /// Stack depth or container index outside the valid range.
    #[error("index {index} out of bounds for length {len}")]
    IndexOutOfBound { index: i64, len: usize },
    /// Byte array, array, struct or integer exceeds its protocol limit.
    #[error("size {size} exceeds limit {limit}")]
    SizeLimitExceeded { size: usize, limit: usize },
    /// Operand is well-typed but semantically invalid.
    #[error("invalid value: {reason}")]
    InvalidValue { reason: &'static str },
    /// Opcode byte does not name an instruction.
    #[error("unsupported opcode 0x{opcode:02x} at offset {offset}")]
    UnsupportedOpcode { opcode: u8, offset: usize },
    /// Code ended inside an operand, or a jump target is out of range.
    #[error("malformed instruction at offset {offset}: {reason}")]
    MalformedInstruction { offset: usize, reason: &'static str },
    /// PICKITEM on a map without the requested key.
    #[error("map key not found")]
    MapKeyNotFound,
    /// Explicit THROW or a failed THROWIFNOT.
    #[error("execution aborted by THROW at offset {offset}")]
    Throw { offset: usize },
    /// Gas consumption exceeded the configured limit.
    #[error("out of gas: used {used}, limit {limit}")]
    OutOfGas { used: u64, limit: u64 },
    /// SYSCALL named a service the host does not provide.
    #[error("unknown syscall {name}")]
    UnknownSyscall { name: String },
    /// Canonical value encoding failed to decode.
    #[error("decoding error: {0}")]
    Decode(#[from] DecodeError),
}
