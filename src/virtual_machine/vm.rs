//! Core stack machine.
//!
//! A [`VM`] owns an evaluation stack, an alt stack and a stack of
//! [`ExecutionContext`] frames sharing one code buffer. Each step fetches an
//! opcode from the top frame, charges its gas, and dispatches it. Any error
//! moves the machine to [`VMState::Fault`] and is kept for inspection; the
//! stacks are left exactly as the failing instruction left them.

mod context;
mod gas;
mod stack;

pub use context::ExecutionContext;
pub use gas::{GasCategory, GasMeter, GasProfile};
pub use stack::{STACK_LIMIT, ValueStack};

use crate::crypto::hashes;
use crate::types::bytes::Bytes;
use crate::virtual_machine::errors::VMError;
use crate::virtual_machine::host::{DefaultHost, Host};
use crate::virtual_machine::isa::{OpCode, PUSH_BYTES_GAS, push_bytes_len};
use crate::virtual_machine::value::{Array, IntValue, MAX_ARRAY_SIZE, StackItem, Struct};
use crate::{debug, warn};
use std::cmp::Ordering;

/// Maximum number of nested frames, the entry frame included.
pub const MAX_INVOCATION_DEPTH: usize = 1024;

/// Execution state of a [`VM`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum VMState {
    /// Inside [`VM::execute`].
    Running,
    /// Paused between instructions; the initial state.
    Break,
    /// Stopped on an error. Terminal.
    Fault,
    /// Every frame returned. Terminal.
    Halt,
}

/// Host-tunable limits for one execution.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ExecutionConfig {
    /// Maximum gas the execution may consume.
    pub gas_limit: u64,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            gas_limit: u64::MAX,
        }
    }
}

/// Bytecode interpreter.
pub struct VM {
    eval_stack: ValueStack,
    alt_stack: ValueStack,
    /// Active frames; the last one is executing.
    invocation_stack: Vec<ExecutionContext>,
    state: VMState,
    fault: Option<VMError>,
    gas: GasMeter,
}

impl VM {
    /// Creates an unmetered VM positioned at the first byte of `code`.
    pub fn new(code: impl Into<Bytes>) -> Self {
        Self::with_config(code, ExecutionConfig::default())
    }

    pub fn with_config(code: impl Into<Bytes>, config: ExecutionConfig) -> Self {
        Self {
            eval_stack: ValueStack::default(),
            alt_stack: ValueStack::default(),
            invocation_stack: vec![ExecutionContext::new(code.into())],
            state: VMState::Break,
            fault: None,
            gas: GasMeter::new(config.gas_limit),
        }
    }

    pub fn state(&self) -> VMState {
        self.state
    }

    /// The error that faulted the machine, if any.
    pub fn fault(&self) -> Option<&VMError> {
        self.fault.as_ref()
    }

    pub fn gas_used(&self) -> u64 {
        self.gas.used()
    }

    pub fn gas_profile(&self) -> &GasProfile {
        self.gas.profile()
    }

    pub fn eval_stack(&self) -> &ValueStack {
        &self.eval_stack
    }

    pub fn eval_stack_mut(&mut self) -> &mut ValueStack {
        &mut self.eval_stack
    }

    pub fn alt_stack(&self) -> &ValueStack {
        &self.alt_stack
    }

    /// Number of active frames.
    pub fn invocation_depth(&self) -> usize {
        self.invocation_stack.len()
    }

    /// The executing frame, `None` once halted.
    pub fn current_context(&self) -> Option<&ExecutionContext> {
        self.invocation_stack.last()
    }

    /// Pushes an argument or syscall result onto the evaluation stack.
    pub fn push_value(&mut self, item: StackItem) -> Result<(), VMError> {
        self.eval_stack.push(item)
    }

    /// Pops a result or syscall argument from the evaluation stack.
    pub fn pop_value(&mut self) -> Result<StackItem, VMError> {
        self.eval_stack.pop()
    }

    /// Charges gas on behalf of a host operation.
    pub fn charge_gas(&mut self, amount: u64, category: GasCategory) -> Result<(), VMError> {
        self.gas.charge(amount, category)
    }

    /// Runs to completion with the [`DefaultHost`].
    pub fn execute(&mut self) -> Result<(), VMError> {
        self.execute_with(&mut DefaultHost)
    }

    /// Runs until the machine halts or faults.
    ///
    /// Calling this on a faulted machine returns the stored fault again
    /// without executing anything.
    pub fn execute_with<H: Host>(&mut self, host: &mut H) -> Result<(), VMError> {
        if self.state == VMState::Break {
            self.state = VMState::Running;
        }
        while self.state == VMState::Running {
            self.execute_next(host);
        }
        self.outcome()
    }

    /// Executes one instruction with the [`DefaultHost`].
    pub fn step(&mut self) -> Result<VMState, VMError> {
        self.step_with(&mut DefaultHost)
    }

    /// Executes exactly one instruction and returns the resulting state.
    ///
    /// The machine is left in `Break` unless the instruction halted or
    /// faulted it.
    pub fn step_with<H: Host>(&mut self, host: &mut H) -> Result<VMState, VMError> {
        if self.state == VMState::Break {
            self.state = VMState::Running;
            self.execute_next(host);
            if self.state == VMState::Running {
                self.state = VMState::Break;
            }
        }
        self.outcome().map(|_| self.state)
    }

    fn outcome(&self) -> Result<(), VMError> {
        match &self.fault {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    /// Pops frames that ran off the end of their code; halts when none remain.
    fn unwind_finished(&mut self) {
        while self
            .invocation_stack
            .last()
            .is_some_and(ExecutionContext::is_at_end)
        {
            self.invocation_stack.pop();
        }
        if self.invocation_stack.is_empty() {
            self.state = VMState::Halt;
            debug!("VM halted, gas used {}", self.gas.used());
        }
    }

    fn execute_next<H: Host>(&mut self, host: &mut H) {
        self.unwind_finished();
        if self.state != VMState::Running {
            return;
        }
        let offset = self.current_context().map_or(0, ExecutionContext::ip);
        match self.exec(host) {
            Ok(()) => self.unwind_finished(),
            Err(err) => {
                warn!("VM fault at offset {offset}: {err}");
                self.fault = Some(err);
                self.state = VMState::Fault;
            }
        }
    }

    fn context_mut(&mut self) -> Result<&mut ExecutionContext, VMError> {
        self.invocation_stack
            .last_mut()
            .ok_or(VMError::StackUnderflow)
    }

    /// Fetches, meters and dispatches one instruction.
    fn exec<H: Host>(&mut self, host: &mut H) -> Result<(), VMError> {
        let ctx = self.context_mut()?;
        let start = ctx.ip();
        let byte = ctx.read_u8()?;

        if let Some(len) = push_bytes_len(byte) {
            self.gas.charge(PUSH_BYTES_GAS, GasCategory::OpcodeBase)?;
            debug!("{start:>6}: PUSHBYTES{len}");
            let data = self.context_mut()?.read_bytes(len)?.to_vec();
            return self.eval_stack.push(StackItem::bytes(data)?);
        }

        let op = OpCode::try_from(byte).map_err(|_| VMError::UnsupportedOpcode {
            opcode: byte,
            offset: start,
        })?;
        self.gas.charge(op.base_gas(), gas_category(op))?;
        debug!("{start:>6}: {}", op.mnemonic());

        match op {
            // Constants
            OpCode::Push0 => self.eval_stack.push(StackItem::Integer(0)),
            OpCode::PushM1 => self.eval_stack.push(StackItem::Integer(-1)),
            OpCode::Push1
            | OpCode::Push2
            | OpCode::Push3
            | OpCode::Push4
            | OpCode::Push5
            | OpCode::Push6
            | OpCode::Push7
            | OpCode::Push8
            | OpCode::Push9
            | OpCode::Push10
            | OpCode::Push11
            | OpCode::Push12
            | OpCode::Push13
            | OpCode::Push14
            | OpCode::Push15
            | OpCode::Push16 => {
                let value = (op as u8 - OpCode::Push1 as u8) as i64 + 1;
                self.eval_stack.push(StackItem::Integer(value))
            }
            OpCode::PushData1 => {
                let len = self.context_mut()?.read_u8()? as usize;
                self.op_push_data(len)
            }
            OpCode::PushData2 => {
                let len = self.context_mut()?.read_u16()? as usize;
                self.op_push_data(len)
            }
            OpCode::PushData4 => {
                let len = self.context_mut()?.read_u32()? as usize;
                self.op_push_data(len)
            }

            // Flow control
            OpCode::Nop => Ok(()),
            OpCode::Jmp => {
                let target = self.read_jump_target(start)?;
                self.context_mut()?.set_ip(target);
                Ok(())
            }
            OpCode::JmpIf | OpCode::JmpIfNot => {
                let target = self.read_jump_target(start)?;
                let condition = self.eval_stack.pop_bool()?;
                if condition == (op == OpCode::JmpIf) {
                    self.context_mut()?.set_ip(target);
                }
                Ok(())
            }
            OpCode::Call => self.op_call(start),
            OpCode::Ret => {
                self.invocation_stack.pop();
                Ok(())
            }
            OpCode::Syscall => {
                let raw = self.context_mut()?.read_var_bytes()?;
                let name = String::from_utf8_lossy(raw).into_owned();
                host.syscall(&name, self)
            }

            // Stack
            OpCode::DupFromAltStack => {
                let item = self.alt_stack.peek(0)?.clone();
                self.eval_stack.push(item)
            }
            OpCode::ToAltStack => {
                let item = self.eval_stack.pop()?;
                self.alt_stack.push(item)
            }
            OpCode::FromAltStack => {
                let item = self.alt_stack.pop()?;
                self.eval_stack.push(item)
            }
            OpCode::XDrop => {
                let n = self.eval_stack.pop_int64()?;
                self.eval_stack.remove(n).map(drop)
            }
            OpCode::XSwap => {
                let n = self.eval_stack.pop_int64()?;
                self.eval_stack.swap(0, n)
            }
            OpCode::XTuck => {
                let n = self.eval_stack.pop_int64()?;
                let item = self.eval_stack.peek(0)?.clone();
                self.eval_stack.insert(n, item)
            }
            OpCode::Depth => {
                let depth = self.eval_stack.len() as i64;
                self.eval_stack.push(StackItem::Integer(depth))
            }
            OpCode::Drop => self.eval_stack.pop().map(drop),
            OpCode::Dup => {
                let item = self.eval_stack.peek(0)?.clone();
                self.eval_stack.push(item)
            }
            OpCode::Nip => {
                let (_, top) = self.eval_stack.pop_pair()?;
                self.eval_stack.push(top)
            }
            OpCode::Over => {
                let item = self.eval_stack.peek(1)?.clone();
                self.eval_stack.push(item)
            }
            OpCode::Pick => {
                let n = self.eval_stack.pop_int64()?;
                let item = self.eval_stack.peek(n)?.clone();
                self.eval_stack.push(item)
            }
            OpCode::Roll => {
                let n = self.eval_stack.pop_int64()?;
                let item = self.eval_stack.remove(n)?;
                self.eval_stack.push(item)
            }
            OpCode::Rot => {
                let item = self.eval_stack.remove(2)?;
                self.eval_stack.push(item)
            }
            OpCode::Swap => self.eval_stack.swap(0, 1),
            OpCode::Tuck => {
                let (a, b) = self.eval_stack.pop_pair()?;
                self.eval_stack.push(b.clone())?;
                self.eval_stack.push(a)?;
                self.eval_stack.push(b)
            }

            // Splice
            OpCode::Cat => {
                let (a, b) = self.eval_stack.pop_pair_bytes()?;
                let mut joined = Vec::with_capacity(a.len() + b.len());
                joined.extend_from_slice(&a);
                joined.extend_from_slice(&b);
                self.eval_stack.push(StackItem::bytes(joined)?)
            }
            OpCode::Substr => {
                let count = self.eval_stack.pop_int64()?;
                let start = self.eval_stack.pop_int64()?;
                let bytes = self.eval_stack.pop_bytes()?;
                let range = byte_range(start, count, bytes.len())?;
                self.eval_stack.push(StackItem::bytes(&bytes[range])?)
            }
            OpCode::Left => {
                let count = self.eval_stack.pop_int64()?;
                let bytes = self.eval_stack.pop_bytes()?;
                let range = byte_range(0, count, bytes.len())?;
                self.eval_stack.push(StackItem::bytes(&bytes[range])?)
            }
            OpCode::Right => {
                let count = self.eval_stack.pop_int64()?;
                let bytes = self.eval_stack.pop_bytes()?;
                let len = bytes.len();
                let count = checked_count(count, len)?;
                self.eval_stack.push(StackItem::bytes(&bytes[len - count..])?)
            }
            OpCode::Size => {
                let len = self.eval_stack.pop_bytes()?.len() as i64;
                self.eval_stack.push(StackItem::Integer(len))
            }

            // Bitwise
            OpCode::Invert => self.op_unary(IntValue::not),
            OpCode::And => self.op_binary(IntValue::and),
            OpCode::Or => self.op_binary(IntValue::or),
            OpCode::Xor => self.op_binary(IntValue::xor),
            OpCode::Equal => {
                let (a, b) = self.eval_stack.pop_pair()?;
                self.eval_stack.push(StackItem::Boolean(a.equals(&b)))
            }

            // Arithmetic
            OpCode::Inc => self.op_unary(|x| x.add(&IntValue::from(1))),
            OpCode::Dec => self.op_unary(|x| x.sub(&IntValue::from(1))),
            OpCode::Sign => self.op_unary(|x| Ok(IntValue::from(x.sign()))),
            OpCode::Negate => self.op_unary(IntValue::neg),
            OpCode::Abs => self.op_unary(IntValue::abs),
            OpCode::Not => {
                let value = self.eval_stack.pop_bool()?;
                self.eval_stack.push(StackItem::Boolean(!value))
            }
            OpCode::Nz => self.op_unary(|x| Ok(IntValue::from(!x.is_zero() as i64))),
            OpCode::Add => self.op_binary(IntValue::add),
            OpCode::Sub => self.op_binary(IntValue::sub),
            OpCode::Mul => self.op_binary(IntValue::mul),
            OpCode::Div => self.op_binary(IntValue::div),
            OpCode::Mod => self.op_binary(IntValue::rem),
            OpCode::Shl => self.op_binary(IntValue::shl),
            OpCode::Shr => self.op_binary(IntValue::shr),
            OpCode::Min => self.op_binary(|a, b| Ok(a.clone().min(b.clone()))),
            OpCode::Max => self.op_binary(|a, b| Ok(a.clone().max(b.clone()))),

            // Comparison
            OpCode::BoolAnd => {
                let (a, b) = self.eval_stack.pop_pair_bool()?;
                self.eval_stack.push(StackItem::Boolean(a && b))
            }
            OpCode::BoolOr => {
                let (a, b) = self.eval_stack.pop_pair_bool()?;
                self.eval_stack.push(StackItem::Boolean(a || b))
            }
            OpCode::NumEqual => self.op_compare(Ordering::is_eq),
            OpCode::NumNotEqual => self.op_compare(Ordering::is_ne),
            OpCode::Lt => self.op_compare(Ordering::is_lt),
            OpCode::Gt => self.op_compare(Ordering::is_gt),
            OpCode::Lte => self.op_compare(Ordering::is_le),
            OpCode::Gte => self.op_compare(Ordering::is_ge),
            OpCode::Within => {
                let (x, a, b) = self.eval_stack.pop_triple_int()?;
                self.eval_stack.push(StackItem::Boolean(a <= x && x < b))
            }

            // Crypto
            OpCode::Sha1 => self.op_hash(|data| hashes::sha1(data).to_vec()),
            OpCode::Sha256 => self.op_hash(|data| hashes::sha256(data).to_vec()),
            OpCode::Hash160 => self.op_hash(|data| hashes::hash160(data).to_vec()),
            OpCode::Hash256 => self.op_hash(|data| hashes::hash256(data).to_vec()),
            OpCode::Verify => {
                let (public_key, signature, message) = self.eval_stack.pop_triple_bytes()?;
                let valid = host.verify(&public_key, &message, &signature)?;
                self.eval_stack.push(StackItem::Boolean(valid))
            }

            // Compound types
            OpCode::ArraySize => self.op_array_size(),
            OpCode::Pack => self.op_pack(),
            OpCode::Unpack => self.op_unpack(),
            OpCode::PickItem => self.op_pick_item(),
            OpCode::SetItem => self.op_set_item(),
            OpCode::NewArray => {
                let count = self.pop_count()?;
                let items = vec![StackItem::Integer(0); count];
                self.eval_stack.push(StackItem::Array(Array::new(items)))
            }
            OpCode::NewStruct => {
                let count = self.pop_count()?;
                let items = vec![StackItem::Integer(0); count];
                self.eval_stack.push(StackItem::Struct(Struct::new(items)))
            }
            OpCode::NewMap => self.eval_stack.push(StackItem::map()),
            OpCode::Append => {
                let (container, item) = self.eval_stack.pop_pair()?;
                let array = container.as_array()?;
                if array.len() >= MAX_ARRAY_SIZE {
                    return Err(VMError::SizeLimitExceeded {
                        size: array.len() + 1,
                        limit: MAX_ARRAY_SIZE,
                    });
                }
                array.push(item.deep_clone());
                Ok(())
            }
            OpCode::Reverse => {
                self.eval_stack.pop_array()?.reverse();
                Ok(())
            }
            OpCode::Remove => self.op_remove(),
            OpCode::HasKey => {
                let (container, key) = self.eval_stack.pop_pair()?;
                let map = container.as_map()?;
                let found = map.contains_key(&key.as_bytes()?);
                self.eval_stack.push(StackItem::Boolean(found))
            }
            OpCode::Keys => {
                let map = self.eval_stack.pop_map()?;
                let keys = map
                    .keys()
                    .into_iter()
                    .map(|k| StackItem::ByteArray(Bytes::from(k)))
                    .collect();
                self.eval_stack.push(StackItem::Array(Array::new(keys)))
            }
            OpCode::Values => {
                let map = self.eval_stack.pop_map()?;
                self.eval_stack.push(StackItem::Array(Array::new(map.values())))
            }

            // Exceptions
            OpCode::Throw => Err(VMError::Throw { offset: start }),
            OpCode::ThrowIfNot => {
                if self.eval_stack.pop_bool()? {
                    Ok(())
                } else {
                    Err(VMError::Throw { offset: start })
                }
            }
        }
    }

    fn op_push_data(&mut self, len: usize) -> Result<(), VMError> {
        let data = self.context_mut()?.read_bytes(len)?.to_vec();
        self.eval_stack.push(StackItem::bytes(data)?)
    }

    /// Reads a relative jump operand and resolves it against `start`.
    ///
    /// The end of the code is a valid target and acts as a return.
    fn read_jump_target(&mut self, start: usize) -> Result<usize, VMError> {
        let ctx = self.context_mut()?;
        let offset = ctx.read_i16()?;
        let len = ctx.code().len();
        (start as i64)
            .checked_add(offset as i64)
            .and_then(|t| usize::try_from(t).ok())
            .filter(|&t| t <= len)
            .ok_or(VMError::MalformedInstruction {
                offset: start,
                reason: "jump target out of range",
            })
    }

    /// Pushes a frame starting at the call target. The caller frame stays
    /// below it, already positioned after the operand.
    fn op_call(&mut self, start: usize) -> Result<(), VMError> {
        let target = self.read_jump_target(start)?;
        if self.invocation_stack.len() >= MAX_INVOCATION_DEPTH {
            return Err(VMError::StackOverflow {
                limit: MAX_INVOCATION_DEPTH,
            });
        }
        let mut callee = self.context_mut()?.clone();
        callee.set_ip(target);
        self.invocation_stack.push(callee);
        Ok(())
    }

    fn op_unary(
        &mut self,
        f: impl Fn(&IntValue) -> Result<IntValue, VMError>,
    ) -> Result<(), VMError> {
        let x = self.eval_stack.pop_int()?;
        self.eval_stack.push(f(&x)?.into())
    }

    fn op_binary(
        &mut self,
        f: impl Fn(&IntValue, &IntValue) -> Result<IntValue, VMError>,
    ) -> Result<(), VMError> {
        let (a, b) = self.eval_stack.pop_pair_int()?;
        self.eval_stack.push(f(&a, &b)?.into())
    }

    fn op_compare(&mut self, f: fn(Ordering) -> bool) -> Result<(), VMError> {
        let (a, b) = self.eval_stack.pop_pair_int()?;
        self.eval_stack.push(StackItem::Boolean(f(a.cmp(&b))))
    }

    fn op_hash(&mut self, f: impl Fn(&[u8]) -> Vec<u8>) -> Result<(), VMError> {
        let data = self.eval_stack.pop_bytes()?;
        self.eval_stack.push(StackItem::bytes(f(&data))?)
    }

    /// Pops an element count for `NEWARRAY`, `NEWSTRUCT` and `PACK`.
    fn pop_count(&mut self) -> Result<usize, VMError> {
        let n = self.eval_stack.pop_int64()?;
        let n = usize::try_from(n).map_err(|_| VMError::InvalidValue {
            reason: "negative element count",
        })?;
        if n > MAX_ARRAY_SIZE {
            return Err(VMError::SizeLimitExceeded {
                size: n,
                limit: MAX_ARRAY_SIZE,
            });
        }
        Ok(n)
    }

    fn op_array_size(&mut self) -> Result<(), VMError> {
        let len = match self.eval_stack.pop()? {
            StackItem::Array(a) => a.len(),
            StackItem::Struct(s) => s.len(),
            StackItem::Map(m) => m.len(),
            other => other.as_bytes()?.len(),
        };
        self.eval_stack.push(StackItem::Integer(len as i64))
    }

    /// The first value popped becomes the last element.
    fn op_pack(&mut self) -> Result<(), VMError> {
        let n = self.pop_count()?;
        if n > self.eval_stack.len() {
            return Err(VMError::StackUnderflow);
        }
        let mut items = Vec::with_capacity(n);
        for _ in 0..n {
            items.push(self.eval_stack.pop()?);
        }
        items.reverse();
        self.eval_stack.push(StackItem::Array(Array::new(items)))
    }

    fn op_unpack(&mut self) -> Result<(), VMError> {
        let array = self.eval_stack.pop_array()?;
        let items = array.to_vec();
        let count = items.len() as i64;
        for item in items {
            self.eval_stack.push(item)?;
        }
        self.eval_stack.push(StackItem::Integer(count))
    }

    fn op_pick_item(&mut self) -> Result<(), VMError> {
        let (container, key) = self.eval_stack.pop_pair()?;
        let item = match &container {
            StackItem::Array(a) => {
                let idx = element_index(&key, a.len())?;
                a.get(idx).ok_or(VMError::IndexOutOfBound {
                    index: idx as i64,
                    len: a.len(),
                })?
            }
            StackItem::Struct(s) => {
                let idx = element_index(&key, s.len())?;
                s.get(idx).ok_or(VMError::IndexOutOfBound {
                    index: idx as i64,
                    len: s.len(),
                })?
            }
            StackItem::Map(m) => m.get(&key.as_bytes()?).ok_or(VMError::MapKeyNotFound)?,
            other => return Err(container_mismatch(other)),
        };
        self.eval_stack.push(item)
    }

    /// Writes into the popped container. Every container is a shared handle,
    /// so the write is visible through all copies of it. A struct value is
    /// stored as a deep copy.
    fn op_set_item(&mut self) -> Result<(), VMError> {
        let (container, key, value) = self.eval_stack.pop_triple()?;
        let value = value.deep_clone();
        match container {
            StackItem::Array(a) => {
                let idx = element_index(&key, a.len())?;
                a.set(idx, value);
                Ok(())
            }
            StackItem::Struct(s) => {
                let idx = element_index(&key, s.len())?;
                s.set(idx, value);
                Ok(())
            }
            StackItem::Map(m) => {
                let key = key.as_bytes()?.to_vec();
                if !m.contains_key(&key) && m.len() >= MAX_ARRAY_SIZE {
                    return Err(VMError::SizeLimitExceeded {
                        size: m.len() + 1,
                        limit: MAX_ARRAY_SIZE,
                    });
                }
                m.insert(key, value);
                Ok(())
            }
            other => Err(container_mismatch(&other)),
        }
    }

    fn op_remove(&mut self) -> Result<(), VMError> {
        let (container, key) = self.eval_stack.pop_pair()?;
        match container {
            StackItem::Array(a) => {
                let idx = element_index(&key, a.len())?;
                a.remove(idx);
                Ok(())
            }
            StackItem::Map(m) => {
                m.remove(&key.as_bytes()?);
                Ok(())
            }
            other => Err(VMError::TypeMismatch {
                expected: "Array or Map",
                actual: other.type_name(),
            }),
        }
    }
}

fn gas_category(op: OpCode) -> GasCategory {
    match op {
        OpCode::Sha1 | OpCode::Sha256 | OpCode::Hash160 | OpCode::Hash256 | OpCode::Verify => {
            GasCategory::Crypto
        }
        OpCode::Call => GasCategory::CallOverhead,
        OpCode::Syscall => GasCategory::HostFunction,
        _ => GasCategory::OpcodeBase,
    }
}

fn container_mismatch(item: &StackItem) -> VMError {
    VMError::TypeMismatch {
        expected: "Array, Struct or Map",
        actual: item.type_name(),
    }
}

/// Converts an index operand, requiring `0 <= index < len`.
fn element_index(key: &StackItem, len: usize) -> Result<usize, VMError> {
    let index = key.as_int64()?;
    usize::try_from(index)
        .ok()
        .filter(|&i| i < len)
        .ok_or(VMError::IndexOutOfBound { index, len })
}

/// Validates a byte count against the length of its source.
fn checked_count(count: i64, len: usize) -> Result<usize, VMError> {
    usize::try_from(count)
        .ok()
        .filter(|&c| c <= len)
        .ok_or(VMError::IndexOutOfBound { index: count, len })
}

/// Resolves `[start, start + count)`, which must lie within `len`.
fn byte_range(start: i64, count: i64, len: usize) -> Result<std::ops::Range<usize>, VMError> {
    let begin = usize::try_from(start)
        .ok()
        .filter(|&s| s <= len)
        .ok_or(VMError::IndexOutOfBound { index: start, len })?;
    let count = checked_count(count, len - begin)
        .map_err(|_| VMError::IndexOutOfBound { index: count, len })?;
    Ok(begin..begin + count)
}

#[cfg(test)]
mod tests;
