//! Bytecode assembly for tests and embedders.

use crate::types::encoding::{EncodeSink, write_var_bytes};
use crate::virtual_machine::errors::VMError;
use crate::virtual_machine::isa::{OpCode, PUSHBYTES1, PUSHBYTES75};
use crate::virtual_machine::value::IntValue;

/// Appends instructions to a growing script.
///
/// Integer and byte pushes pick the shortest encoding. Jumps take offsets
/// relative to the start of the jump instruction, as the interpreter
/// resolves them.
#[derive(Clone, Debug, Default)]
pub struct ScriptBuilder {
    code: Vec<u8>,
}

impl EncodeSink for ScriptBuilder {
    fn write(&mut self, bytes: &[u8]) {
        self.code.extend_from_slice(bytes);
    }
}

impl ScriptBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Offset the next instruction will be written at.
    pub fn offset(&self) -> usize {
        self.code.len()
    }

    pub fn emit(&mut self, op: OpCode) -> &mut Self {
        self.code.push(op as u8);
        self
    }

    pub fn emit_push_int(&mut self, value: i64) -> &mut Self {
        self.emit_push_integer(&IntValue::from(value))
    }

    /// Pushes an integer of any supported width.
    pub fn emit_push_integer(&mut self, value: &IntValue) -> &mut Self {
        match value.to_i64() {
            Some(-1) => self.emit(OpCode::PushM1),
            Some(0) => self.emit(OpCode::Push0),
            Some(v @ 1..=16) => {
                self.code.push(OpCode::Push1 as u8 + (v - 1) as u8);
                self
            }
            _ => self.emit_push_bytes(&value.to_le_bytes()),
        }
    }

    /// Pushes `true` as `PUSH1` and `false` as `PUSH0`.
    pub fn emit_push_bool(&mut self, value: bool) -> &mut Self {
        self.emit(if value { OpCode::Push1 } else { OpCode::Push0 })
    }

    /// Pushes a byte array. An empty array uses `PUSHDATA1 0` so that it
    /// stays a byte array rather than the integer zero.
    pub fn emit_push_bytes(&mut self, data: &[u8]) -> &mut Self {
        let len = data.len();
        if (PUSHBYTES1 as usize..=PUSHBYTES75 as usize).contains(&len) {
            self.code.push(len as u8);
        } else if let Ok(n) = u8::try_from(len) {
            self.emit(OpCode::PushData1);
            self.code.push(n);
        } else if let Ok(n) = u16::try_from(len) {
            self.emit(OpCode::PushData2);
            self.code.extend_from_slice(&n.to_le_bytes());
        } else {
            self.emit(OpCode::PushData4);
            self.code.extend_from_slice(&(len as u32).to_le_bytes());
        }
        self.code.extend_from_slice(data);
        self
    }

    /// Emits `JMP`, `JMPIF`, `JMPIFNOT` or `CALL` with a raw relative offset.
    pub fn emit_jump(&mut self, op: OpCode, offset: i16) -> Result<&mut Self, VMError> {
        if !matches!(
            op,
            OpCode::Jmp | OpCode::JmpIf | OpCode::JmpIfNot | OpCode::Call
        ) {
            return Err(VMError::InvalidValue {
                reason: "not a jump opcode",
            });
        }
        self.emit(op);
        self.code.extend_from_slice(&offset.to_le_bytes());
        Ok(self)
    }

    /// Emits a jump to the absolute offset `target`.
    pub fn emit_jump_to(&mut self, op: OpCode, target: usize) -> Result<&mut Self, VMError> {
        let offset = i16::try_from(target as i64 - self.offset() as i64).map_err(|_| {
            VMError::InvalidValue {
                reason: "jump distance exceeds 16 bits",
            }
        })?;
        self.emit_jump(op, offset)
    }

    /// Rewrites the operand of the jump at `at` so that it lands on `target`.
    pub fn patch_jump(&mut self, at: usize, target: usize) -> Result<&mut Self, VMError> {
        let offset = i16::try_from(target as i64 - at as i64).map_err(|_| VMError::InvalidValue {
            reason: "jump distance exceeds 16 bits",
        })?;
        let len = self.code.len();
        let operand = self
            .code
            .get_mut(at + 1..at + 3)
            .ok_or(VMError::IndexOutOfBound {
                index: at as i64,
                len,
            })?;
        operand.copy_from_slice(&offset.to_le_bytes());
        Ok(self)
    }

    pub fn emit_syscall(&mut self, name: &str) -> &mut Self {
        self.emit(OpCode::Syscall);
        write_var_bytes(self, name.as_bytes());
        self
    }

    /// Appends pre-assembled code.
    pub fn emit_raw(&mut self, code: &[u8]) -> &mut Self {
        self.code.extend_from_slice(code);
        self
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.code.clone()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.code
    }
}
