//! Host seam: signature verification and host-defined syscalls.
//!
//! The interpreter calls into a [`Host`] for `VERIFY` and `SYSCALL`.
//! Syscall arguments and results travel over the evaluation stack through
//! [`VM::pop_value`] and [`VM::push_value`].

use crate::crypto::key_pair::PublicKey;
use crate::virtual_machine::errors::VMError;
use crate::virtual_machine::state::State;
use crate::virtual_machine::value::StackItem;
use crate::virtual_machine::vm::{GasCategory, VM};

/// Maximum length of a storage key.
pub const MAX_STORAGE_KEY_SIZE: usize = 1024;

/// Gas charged for `Storage.Get`.
pub const STORAGE_READ_GAS: u64 = 100;
/// Base gas charged for `Storage.Put`, plus one unit per key and value byte.
pub const STORAGE_WRITE_GAS: u64 = 1000;
/// Gas charged for `Storage.Delete`.
pub const STORAGE_DELETE_GAS: u64 = 100;

/// Services the interpreter delegates to its embedder.
pub trait Host {
    /// Checks `signature` over `message` under `public_key`.
    ///
    /// The default verifies BIP-340 Schnorr signatures over secp256k1. A key
    /// that does not parse is an error; a signature that does not verify is
    /// `Ok(false)`.
    fn verify(
        &mut self,
        public_key: &[u8],
        message: &[u8],
        signature: &[u8],
    ) -> Result<bool, VMError> {
        let key = PublicKey::from_bytes(public_key).ok_or(VMError::InvalidValue {
            reason: "malformed public key",
        })?;
        Ok(key.verify(message, signature))
    }

    /// Runs the host-defined operation `name`.
    fn syscall(&mut self, name: &str, _vm: &mut VM) -> Result<(), VMError> {
        Err(VMError::UnknownSyscall {
            name: name.to_string(),
        })
    }
}

/// Host with the default verifier and no syscalls.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultHost;

impl Host for DefaultHost {}

/// Host exposing key-value storage through syscalls.
///
/// | Syscall | Stack in (top last) | Stack out |
/// |---|---|---|
/// | `Storage.Get` | key | value, empty if absent |
/// | `Storage.Put` | value, key | |
/// | `Storage.Delete` | key | |
pub struct StorageHost<'a, S: State> {
    state: &'a mut S,
}

impl<'a, S: State> StorageHost<'a, S> {
    pub fn new(state: &'a mut S) -> Self {
        Self { state }
    }

    fn pop_key(vm: &mut VM) -> Result<Vec<u8>, VMError> {
        let key = vm.pop_value()?.as_bytes()?;
        if key.len() > MAX_STORAGE_KEY_SIZE {
            return Err(VMError::SizeLimitExceeded {
                size: key.len(),
                limit: MAX_STORAGE_KEY_SIZE,
            });
        }
        Ok(key.to_vec())
    }
}

impl<'a, S: State> Host for StorageHost<'a, S> {
    fn syscall(&mut self, name: &str, vm: &mut VM) -> Result<(), VMError> {
        match name {
            "Storage.Get" => {
                vm.charge_gas(STORAGE_READ_GAS, GasCategory::StateRead)?;
                let key = Self::pop_key(vm)?;
                let value = self.state.get(&key).unwrap_or_default();
                vm.push_value(StackItem::bytes(value)?)
            }
            "Storage.Put" => {
                let key = Self::pop_key(vm)?;
                let value = vm.pop_value()?.as_bytes()?;
                let cost = STORAGE_WRITE_GAS
                    .saturating_add(key.len() as u64)
                    .saturating_add(value.len() as u64);
                vm.charge_gas(cost, GasCategory::StateStore)?;
                self.state.put(key, value.to_vec());
                Ok(())
            }
            "Storage.Delete" => {
                vm.charge_gas(STORAGE_DELETE_GAS, GasCategory::StateStore)?;
                let key = Self::pop_key(vm)?;
                self.state.delete(&key);
                Ok(())
            }
            _ => Err(VMError::UnknownSyscall {
                name: name.to_string(),
            }),
        }
    }
}
