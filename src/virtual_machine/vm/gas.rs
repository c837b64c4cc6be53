use crate::virtual_machine::errors::VMError;

/// Number of gas categories tracked by [`GasProfile`].
const GAS_CATEGORY_COUNT: usize = 6;

/// Categories of gas consumption for profiling.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
#[repr(u8)]
pub enum GasCategory {
    /// Base cost of plain opcodes.
    OpcodeBase = 0,
    /// Hashing and signature verification opcodes.
    Crypto = 1,
    /// `CALL` frames.
    CallOverhead = 2,
    /// Reads from host storage.
    StateRead = 3,
    /// Writes and deletions in host storage.
    StateStore = 4,
    /// Any other host-defined syscall work.
    HostFunction = 5,
}

impl GasCategory {
    pub const fn as_str(&self) -> &'static str {
        match self {
            GasCategory::OpcodeBase => "Opcode Base",
            GasCategory::Crypto => "Crypto",
            GasCategory::CallOverhead => "Call Overhead",
            GasCategory::StateRead => "State Read",
            GasCategory::StateStore => "State Store",
            GasCategory::HostFunction => "Host Function",
        }
    }

    /// All categories in discriminant order.
    const ALL: [GasCategory; GAS_CATEGORY_COUNT] = [
        GasCategory::OpcodeBase,
        GasCategory::Crypto,
        GasCategory::CallOverhead,
        GasCategory::StateRead,
        GasCategory::StateStore,
        GasCategory::HostFunction,
    ];
}

/// Gas consumption broken down by [`GasCategory`].
///
/// Backed by a flat array indexed by the category discriminant.
#[derive(Clone, Debug, Default)]
pub struct GasProfile {
    counts: [u64; GAS_CATEGORY_COUNT],
}

impl GasProfile {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline(always)]
    pub fn add(&mut self, category: GasCategory, amount: u64) {
        let slot = &mut self.counts[category as usize];
        *slot = slot.saturating_add(amount);
    }

    pub fn get(&self, category: GasCategory) -> u64 {
        self.counts[category as usize]
    }

    /// Returns the total gas across all categories.
    pub fn total(&self) -> u64 {
        self.counts
            .iter()
            .fold(0u64, |acc, &v| acc.saturating_add(v))
    }

    /// Iterates over categories with non-zero usage.
    pub fn iter(&self) -> impl Iterator<Item = (GasCategory, u64)> {
        GasCategory::ALL
            .into_iter()
            .zip(self.counts)
            .filter(|(_, v)| *v > 0)
    }
}

/// Running gas account for one execution.
///
/// A charge that would push usage past the limit fails with
/// [`VMError::OutOfGas`] and leaves usage unchanged.
#[derive(Clone, Debug)]
pub struct GasMeter {
    limit: u64,
    used: u64,
    profile: GasProfile,
}

impl GasMeter {
    pub fn new(limit: u64) -> Self {
        Self {
            limit,
            used: 0,
            profile: GasProfile::new(),
        }
    }

    /// A meter that never runs out.
    pub fn unmetered() -> Self {
        Self::new(u64::MAX)
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }

    pub fn used(&self) -> u64 {
        self.used
    }

    pub fn remaining(&self) -> u64 {
        self.limit - self.used
    }

    pub fn profile(&self) -> &GasProfile {
        &self.profile
    }

    pub fn charge(&mut self, amount: u64, category: GasCategory) -> Result<(), VMError> {
        let used = self.used.saturating_add(amount);
        if used > self.limit {
            return Err(VMError::OutOfGas {
                used,
                limit: self.limit,
            });
        }
        self.used = used;
        self.profile.add(category, amount);
        Ok(())
    }
}
