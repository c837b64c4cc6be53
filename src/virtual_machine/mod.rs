//! Stack-based bytecode virtual machine for smart contract execution.
//!
//! # Architecture
//!
//! - **Values**: a closed [`value::StackItem`] union; arrays and maps are
//!   shared handles, structs are copied on every clone
//! - **Stacks**: a bounded evaluation stack and an alt stack
//! - **Frames**: `CALL` pushes a frame sharing the code buffer; `RET` or
//!   running off the end pops it; the machine halts when none remain
//! - **Faults**: any opcode error moves the machine to `Fault` and is kept
//! - **Gas metering**: each opcode charges its base cost against a limit
//!
//! # Modules
//!
//! - [`builder`]: Bytecode assembly helpers
//! - [`codec`]: Canonical binary encoding of values
//! - [`errors`]: Execution error type
//! - [`host`]: Signature verification and syscall seam
//! - [`isa`]: Opcode table, gas costs and disassembler
//! - [`state`]: Storage trait and write-buffering overlay
//! - [`value`]: Runtime value model
//! - [`vm`]: Interpreter, stacks, frames and gas metering

pub mod builder;
pub mod codec;
pub mod errors;
pub mod host;
pub mod isa;
#[cfg(test)]
mod isa_static_check;
pub mod state;
pub mod value;
pub mod vm;
