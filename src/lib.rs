//! NeoVM-style smart contract interpreter.
//!
//! Provides the value model, opcode interpreter and canonical codec, plus the
//! hashing and signature primitives the opcodes rely on.

pub mod crypto;
pub mod types;
pub mod utils;
pub mod virtual_machine;
