//! Instruction Set Architecture (ISA) definitions.
//!
//! The [`for_each_opcode!`](crate::for_each_opcode) macro holds the canonical
//! opcode table and invokes a callback macro for code generation, so the
//! interpreter, the fingerprint check and the disassembler all derive from one
//! list.
//!
//! This module generates:
//! - The [`OpCode`] enum with byte mappings
//! - `TryFrom<u8>` for decoding opcodes
//! - [`OpCode::mnemonic`], [`OpCode::base_gas`] and [`OpCode::operand`]
//!
//! # Bytecode Format
//!
//! Every instruction is one opcode byte followed by its immediate operand:
//! - `PUSHBYTES1..75` (`0x01..=0x4B`): the opcode value is the number of raw
//!   bytes that follow. These are not enum variants; see [`push_bytes_len`].
//! - `PUSHDATA1/2/4`: an 8/16/32-bit little-endian length, then that many bytes
//! - `JMP`, `JMPIF`, `JMPIFNOT`, `CALL`: a signed 16-bit little-endian offset
//!   relative to the start of the instruction
//! - `SYSCALL`: a variable-length prefixed service name
//! - everything else: no operand

use crate::types::encoding::{Decode, VarUint};
use crate::virtual_machine::errors::VMError;

/// First opcode of the `PUSHBYTES` range.
pub const PUSHBYTES1: u8 = 0x01;
/// Last opcode of the `PUSHBYTES` range.
pub const PUSHBYTES75: u8 = 0x4B;

/// Returns the payload length if `byte` is a `PUSHBYTES` opcode.
pub const fn push_bytes_len(byte: u8) -> Option<usize> {
    if byte >= PUSHBYTES1 && byte <= PUSHBYTES75 {
        Some(byte as usize)
    } else {
        None
    }
}

/// Shape of the immediate operand that follows an opcode.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Operand {
    /// No operand.
    None,
    /// `u8` length followed by that many bytes.
    Data1,
    /// `u16` length followed by that many bytes.
    Data2,
    /// `u32` length followed by that many bytes.
    Data4,
    /// Signed 16-bit relative jump offset.
    Offset,
    /// Variable-length prefixed byte string.
    VarBytes,
}

/// Invokes a callback macro with the complete opcode definition list.
#[macro_export]
macro_rules! for_each_opcode {
    ($callback:ident) => {
        $callback! {
            // =========================
            // Constants
            // =========================
            /// PUSH0 ; push integer 0
            Push0 = 0x00, "PUSH0" => [], 1,
            /// PUSHDATA1 len:u8 bytes ; push a byte array
            PushData1 = 0x4C, "PUSHDATA1" => [Data1], 1,
            /// PUSHDATA2 len:u16 bytes ; push a byte array
            PushData2 = 0x4D, "PUSHDATA2" => [Data2], 1,
            /// PUSHDATA4 len:u32 bytes ; push a byte array
            PushData4 = 0x4E, "PUSHDATA4" => [Data4], 1,
            /// PUSHM1 ; push integer -1
            PushM1 = 0x4F, "PUSHM1" => [], 1,
            /// PUSH1 ; push integer 1
            Push1 = 0x51, "PUSH1" => [], 1,
            /// PUSH2 ; push integer 2
            Push2 = 0x52, "PUSH2" => [], 1,
            /// PUSH3 ; push integer 3
            Push3 = 0x53, "PUSH3" => [], 1,
            /// PUSH4 ; push integer 4
            Push4 = 0x54, "PUSH4" => [], 1,
            /// PUSH5 ; push integer 5
            Push5 = 0x55, "PUSH5" => [], 1,
            /// PUSH6 ; push integer 6
            Push6 = 0x56, "PUSH6" => [], 1,
            /// PUSH7 ; push integer 7
            Push7 = 0x57, "PUSH7" => [], 1,
            /// PUSH8 ; push integer 8
            Push8 = 0x58, "PUSH8" => [], 1,
            /// PUSH9 ; push integer 9
            Push9 = 0x59, "PUSH9" => [], 1,
            /// PUSH10 ; push integer 10
            Push10 = 0x5A, "PUSH10" => [], 1,
            /// PUSH11 ; push integer 11
            Push11 = 0x5B, "PUSH11" => [], 1,
            /// PUSH12 ; push integer 12
            Push12 = 0x5C, "PUSH12" => [], 1,
            /// PUSH13 ; push integer 13
            Push13 = 0x5D, "PUSH13" => [], 1,
            /// PUSH14 ; push integer 14
            Push14 = 0x5E, "PUSH14" => [], 1,
            /// PUSH15 ; push integer 15
            Push15 = 0x5F, "PUSH15" => [], 1,
            /// PUSH16 ; push integer 16
            Push16 = 0x60, "PUSH16" => [], 1,
            // =========================
            // Flow control
            // =========================
            /// NOP ; does nothing
            Nop = 0x61, "NOP" => [], 1,
            /// JMP offset ; ip = start + offset
            Jmp = 0x62, "JMP" => [Offset], 1,
            /// JMPIF offset ; pop x; if x then ip = start + offset
            JmpIf = 0x63, "JMPIF" => [Offset], 1,
            /// JMPIFNOT offset ; pop x; if !x then ip = start + offset
            JmpIfNot = 0x64, "JMPIFNOT" => [Offset], 1,
            /// CALL offset ; push return context, then jump
            Call = 0x65, "CALL" => [Offset], 2,
            /// RET ; resume the calling context, or halt from the outermost one
            Ret = 0x66, "RET" => [], 1,
            /// SYSCALL name ; dispatch to a host-defined service
            Syscall = 0x68, "SYSCALL" => [VarBytes], 1,
            // =========================
            // Stack
            // =========================
            /// DUPFROMALTSTACK ; push a copy of the alt stack top
            DupFromAltStack = 0x6A, "DUPFROMALTSTACK" => [], 1,
            /// TOALTSTACK ; move the top item to the alt stack
            ToAltStack = 0x6B, "TOALTSTACK" => [], 1,
            /// FROMALTSTACK ; move the alt stack top back
            FromAltStack = 0x6C, "FROMALTSTACK" => [], 1,
            /// XDROP ; pop n; remove the item at depth n
            XDrop = 0x6D, "XDROP" => [], 1,
            /// XSWAP ; pop n; swap the top with the item at depth n
            XSwap = 0x72, "XSWAP" => [], 1,
            /// XTUCK ; pop n; insert a copy of the top at depth n
            XTuck = 0x73, "XTUCK" => [], 1,
            /// DEPTH ; push the number of stack items
            Depth = 0x74, "DEPTH" => [], 1,
            /// DROP ; remove the top item
            Drop = 0x75, "DROP" => [], 1,
            /// DUP ; duplicate the top item
            Dup = 0x76, "DUP" => [], 1,
            /// NIP ; remove the second-to-top item
            Nip = 0x77, "NIP" => [], 1,
            /// OVER ; copy the second-to-top item to the top
            Over = 0x78, "OVER" => [], 1,
            /// PICK ; pop n; copy the item at depth n to the top
            Pick = 0x79, "PICK" => [], 1,
            /// ROLL ; pop n; move the item at depth n to the top
            Roll = 0x7A, "ROLL" => [], 1,
            /// ROT ; move the third item to the top
            Rot = 0x7B, "ROT" => [], 1,
            /// SWAP ; swap the top two items
            Swap = 0x7C, "SWAP" => [], 1,
            /// TUCK ; copy the top item below the second
            Tuck = 0x7D, "TUCK" => [], 1,
            // =========================
            // Splice
            // =========================
            /// CAT ; concatenate two byte arrays
            Cat = 0x7E, "CAT" => [], 2,
            /// SUBSTR ; pop count, start, bytes; push bytes[start..start+count]
            Substr = 0x7F, "SUBSTR" => [], 2,
            /// LEFT ; pop count, bytes; push the first count bytes
            Left = 0x80, "LEFT" => [], 2,
            /// RIGHT ; pop count, bytes; push the last count bytes
            Right = 0x81, "RIGHT" => [], 2,
            /// SIZE ; push the byte length of the top item
            Size = 0x82, "SIZE" => [], 1,
            // =========================
            // Bitwise logic
            // =========================
            /// INVERT ; bitwise not
            Invert = 0x83, "INVERT" => [], 1,
            /// AND ; bitwise and
            And = 0x84, "AND" => [], 1,
            /// OR ; bitwise or
            Or = 0x85, "OR" => [], 1,
            /// XOR ; bitwise exclusive or
            Xor = 0x86, "XOR" => [], 1,
            /// EQUAL ; push whether the top two items are equal
            Equal = 0x87, "EQUAL" => [], 1,
            // =========================
            // Arithmetic
            // =========================
            /// INC ; x + 1
            Inc = 0x8B, "INC" => [], 1,
            /// DEC ; x - 1
            Dec = 0x8C, "DEC" => [], 1,
            /// SIGN ; -1, 0 or 1
            Sign = 0x8D, "SIGN" => [], 1,
            /// NEGATE ; -x
            Negate = 0x8F, "NEGATE" => [], 1,
            /// ABS ; |x|
            Abs = 0x90, "ABS" => [], 1,
            /// NOT ; logical negation
            Not = 0x91, "NOT" => [], 1,
            /// NZ ; push 1 if x != 0 else 0
            Nz = 0x92, "NZ" => [], 1,
            /// ADD ; a + b
            Add = 0x93, "ADD" => [], 1,
            /// SUB ; a - b
            Sub = 0x94, "SUB" => [], 1,
            /// MUL ; a * b
            Mul = 0x95, "MUL" => [], 2,
            /// DIV ; a / b, truncated (fault on zero)
            Div = 0x96, "DIV" => [], 2,
            /// MOD ; a % b, sign of a (fault on zero)
            Mod = 0x97, "MOD" => [], 2,
            /// SHL ; a << b
            Shl = 0x98, "SHL" => [], 2,
            /// SHR ; a >> b (arithmetic)
            Shr = 0x99, "SHR" => [], 2,
            /// BOOLAND ; a && b
            BoolAnd = 0x9A, "BOOLAND" => [], 1,
            /// BOOLOR ; a || b
            BoolOr = 0x9B, "BOOLOR" => [], 1,
            /// NUMEQUAL ; a == b
            NumEqual = 0x9C, "NUMEQUAL" => [], 1,
            /// NUMNOTEQUAL ; a != b
            NumNotEqual = 0x9E, "NUMNOTEQUAL" => [], 1,
            /// LT ; a < b
            Lt = 0x9F, "LT" => [], 1,
            /// GT ; a > b
            Gt = 0xA0, "GT" => [], 1,
            /// LTE ; a <= b
            Lte = 0xA1, "LTE" => [], 1,
            /// GTE ; a >= b
            Gte = 0xA2, "GTE" => [], 1,
            /// MIN ; min(a, b)
            Min = 0xA3, "MIN" => [], 1,
            /// MAX ; max(a, b)
            Max = 0xA4, "MAX" => [], 1,
            /// WITHIN ; a <= x < b
            Within = 0xA5, "WITHIN" => [], 1,
            // =========================
            // Crypto
            // =========================
            /// SHA1 ; SHA-1 digest
            Sha1 = 0xA7, "SHA1" => [], 10,
            /// SHA256 ; SHA-256 digest
            Sha256 = 0xA8, "SHA256" => [], 10,
            /// HASH160 ; RIPEMD160(SHA256(x))
            Hash160 = 0xA9, "HASH160" => [], 20,
            /// HASH256 ; SHA256(SHA256(x))
            Hash256 = 0xAA, "HASH256" => [], 20,
            /// VERIFY ; pop message, signature, pubkey; push signature validity
            Verify = 0xAD, "VERIFY" => [], 100,
            // =========================
            // Compound types
            // =========================
            /// ARRAYSIZE ; element count or byte length
            ArraySize = 0xC0, "ARRAYSIZE" => [], 1,
            /// PACK ; pop n, then n items into an array in push order
            Pack = 0xC1, "PACK" => [], 2,
            /// UNPACK ; push array elements in order, then the count
            Unpack = 0xC2, "UNPACK" => [], 2,
            /// PICKITEM ; container[key]
            PickItem = 0xC3, "PICKITEM" => [], 1,
            /// SETITEM ; container[key] = value
            SetItem = 0xC4, "SETITEM" => [], 1,
            /// NEWARRAY ; array of n zeros
            NewArray = 0xC5, "NEWARRAY" => [], 2,
            /// NEWSTRUCT ; struct of n zeros
            NewStruct = 0xC6, "NEWSTRUCT" => [], 2,
            /// NEWMAP ; empty map
            NewMap = 0xC7, "NEWMAP" => [], 1,
            /// APPEND ; push an item onto an array
            Append = 0xC8, "APPEND" => [], 1,
            /// REVERSE ; reverse an array in place
            Reverse = 0xC9, "REVERSE" => [], 1,
            /// REMOVE ; remove an array index or map key
            Remove = 0xCA, "REMOVE" => [], 1,
            /// HASKEY ; push whether a map holds the key
            HasKey = 0xCB, "HASKEY" => [], 1,
            /// KEYS ; sorted map keys as an array
            Keys = 0xCC, "KEYS" => [], 2,
            /// VALUES ; map values in key order as an array
            Values = 0xCD, "VALUES" => [], 2,
            // =========================
            // Exceptions
            // =========================
            /// THROW ; fault unconditionally
            Throw = 0xF0, "THROW" => [], 1,
            /// THROWIFNOT ; pop x; fault if x is false
            ThrowIfNot = 0xF1, "THROWIFNOT" => [], 1,
        }
    };
}

#[macro_export]
macro_rules! define_opcodes {
    (
        $(
            $(#[$doc:meta])*
            $name:ident = $opcode:literal, $mnemonic:literal => [ $( $kind:ident )? ], $gas:expr
        ),* $(,)?
    ) => {
        #[repr(u8)]
        #[derive(Copy, Clone, Debug, Eq, PartialEq)]
        pub enum OpCode {
            $(
                $(#[$doc])*
                $name = $opcode,
            )*
        }

        impl TryFrom<u8> for OpCode {
            type Error = VMError;

            fn try_from(value: u8) -> Result<Self, Self::Error> {
                match value {
                    $( $opcode => Ok(OpCode::$name), )*
                    _ => Err(VMError::UnsupportedOpcode {
                        opcode: value,
                        offset: 0,
                    }),
                }
            }
        }

        impl OpCode {
            /// Returns the assembly mnemonic for this opcode.
            pub const fn mnemonic(&self) -> &'static str {
                match self {
                    $( OpCode::$name => $mnemonic, )*
                }
            }

            /// Returns the base gas cost for this opcode.
            pub const fn base_gas(&self) -> u64 {
                match self {
                    $( OpCode::$name => $gas, )*
                }
            }

            /// Returns the shape of the immediate operand.
            pub const fn operand(&self) -> Operand {
                match self {
                    $( OpCode::$name => $crate::define_opcodes!(@operand $( $kind )?), )*
                }
            }
        }
    };

    (@operand) => { Operand::None };
    (@operand $kind:ident) => { Operand::$kind };
}

for_each_opcode!(define_opcodes);

/// Gas charged for a `PUSHBYTES` instruction.
pub const PUSH_BYTES_GAS: u64 = 1;

/// One decoded instruction of a disassembly listing.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DecodedInstruction {
    /// Offset of the opcode byte.
    pub offset: usize,
    /// Mnemonic, `PUSHBYTESn` for the raw push range.
    pub mnemonic: String,
    /// Raw operand bytes, without length prefixes.
    pub operand: Vec<u8>,
}

/// Decodes `code` into a flat instruction listing.
///
/// Jump offsets are reported as their two raw bytes. Fails on unknown opcodes
/// or operands that run past the end of the code.
pub fn disassemble(code: &[u8]) -> Result<Vec<DecodedInstruction>, VMError> {
    let mut out = Vec::new();
    let mut ip = 0usize;

    while ip < code.len() {
        let offset = ip;
        let byte = code[ip];
        ip += 1;

        let truncated = VMError::MalformedInstruction {
            offset,
            reason: "operand runs past end of code",
        };
        let take = |ip: &mut usize, n: usize| -> Result<Vec<u8>, VMError> {
            let end = ip.checked_add(n).ok_or(truncated.clone())?;
            let bytes = code.get(*ip..end).ok_or(truncated.clone())?.to_vec();
            *ip = end;
            Ok(bytes)
        };

        if let Some(len) = push_bytes_len(byte) {
            let operand = take(&mut ip, len)?;
            out.push(DecodedInstruction {
                offset,
                mnemonic: format!("PUSHBYTES{len}"),
                operand,
            });
            continue;
        }

        let op = OpCode::try_from(byte)
            .map_err(|_| VMError::UnsupportedOpcode { opcode: byte, offset })?;
        let operand = match op.operand() {
            Operand::None => Vec::new(),
            Operand::Data1 => {
                let len = take(&mut ip, 1)?[0] as usize;
                take(&mut ip, len)?
            }
            Operand::Data2 => {
                let raw = take(&mut ip, 2)?;
                take(&mut ip, u16::from_le_bytes([raw[0], raw[1]]) as usize)?
            }
            Operand::Data4 => {
                let raw = take(&mut ip, 4)?;
                let len = u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]) as usize;
                take(&mut ip, len)?
            }
            Operand::Offset => take(&mut ip, 2)?,
            Operand::VarBytes => {
                let mut rest = &code[ip..];
                let before = rest.len();
                let len = VarUint::decode(&mut rest)
                    .map_err(|_| truncated.clone())?
                    .0;
                ip += before - rest.len();
                let len = usize::try_from(len).map_err(|_| truncated.clone())?;
                take(&mut ip, len)?
            }
        };
        out.push(DecodedInstruction {
            offset,
            mnemonic: op.mnemonic().to_string(),
            operand,
        });
    }

    Ok(out)
}
