use crate::types::bytes::Bytes;
use crate::types::encoding::{Decode, VarUint};
use crate::virtual_machine::errors::VMError;

/// One call frame: shared code plus an instruction pointer.
///
/// Cloning a context shares the code buffer and copies only the pointer, which
/// is how `CALL` creates the callee frame.
#[derive(Clone, Debug)]
pub struct ExecutionContext {
    /// Bytecode to execute, shared by every frame of the same script.
    code: Bytes,
    /// Offset of the next byte to read.
    ip: usize,
}

impl ExecutionContext {
    pub fn new(code: Bytes) -> Self {
        Self { code, ip: 0 }
    }

    pub fn code(&self) -> &Bytes {
        &self.code
    }

    pub fn ip(&self) -> usize {
        self.ip
    }

    pub fn set_ip(&mut self, ip: usize) {
        self.ip = ip;
    }

    /// Returns true once the pointer has run past the last instruction.
    pub fn is_at_end(&self) -> bool {
        self.ip >= self.code.len()
    }

    /// Reads exactly `count` bytes, advancing the pointer.
    ///
    /// Returns [`VMError::MalformedInstruction`] if the code ends first.
    pub fn read_bytes(&mut self, count: usize) -> Result<&[u8], VMError> {
        let start = self.ip;
        let slice = start
            .checked_add(count)
            .and_then(|end| self.code.get(start..end))
            .ok_or(VMError::MalformedInstruction {
                offset: start,
                reason: "code ends inside an operand",
            })?;
        self.ip = start + count;
        Ok(slice)
    }

    pub fn read_u8(&mut self) -> Result<u8, VMError> {
        Ok(self.read_bytes(1)?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16, VMError> {
        let b = self.read_bytes(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    pub fn read_u32(&mut self) -> Result<u32, VMError> {
        let b = self.read_bytes(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn read_i16(&mut self) -> Result<i16, VMError> {
        let b = self.read_bytes(2)?;
        Ok(i16::from_le_bytes([b[0], b[1]]))
    }

    /// Reads a variable-length prefixed byte string.
    pub fn read_var_bytes(&mut self) -> Result<&[u8], VMError> {
        let start = self.ip;
        let mut rest = self.code.get(start..).unwrap_or_default();
        let before = rest.len();
        let len = VarUint::decode(&mut rest)
            .map_err(|_| VMError::MalformedInstruction {
                offset: start,
                reason: "malformed length prefix",
            })?
            .0;
        self.ip += before - rest.len();
        let len = usize::try_from(len).map_err(|_| VMError::MalformedInstruction {
            offset: start,
            reason: "operand length overflows",
        })?;
        self.read_bytes(len)
    }
}
