//! Sideways ROM banks paged into 0x8000-0xBFFF.

use crate::error::{EmuError, EmuResult};
use crate::guest::Memory;

/// Number of sideways banks.
pub const BANK_COUNT: usize = 16;

/// Size of one bank and of the paged window.
pub const BANK_SIZE: usize = 0x4000;

/// Start of the paged window.
pub const WINDOW: u16 = 0x8000;

/// The sixteen 16 KiB ROM images behind the paged window.
///
/// Banks are filled during start-up and only ever read afterwards; paging
/// copies a whole bank into guest memory, so nothing the guest writes can
/// find its way back into a bank.
pub struct BankStore {
    banks: Vec<[u8; BANK_SIZE]>,
    selected: u8,
}

impl Default for BankStore {
    fn default() -> Self {
        Self::new()
    }
}

impl BankStore {
    pub fn new() -> Self {
        Self {
            banks: vec![[0; BANK_SIZE]; BANK_COUNT],
            selected: 0,
        }
    }

    /// Copy `data` into a bank, truncating at 16 KiB.
    pub fn load(&mut self, bank: u8, data: &[u8]) -> EmuResult<()> {
        let slot = self
            .banks
            .get_mut(bank as usize)
            .ok_or(EmuError::BadBank(bank))?;
        let len = data.len().min(BANK_SIZE);
        slot[..len].copy_from_slice(&data[..len]);
        slot[len..].fill(0);
        Ok(())
    }

    /// Snapshot whatever is currently in the paged window into a bank.
    pub fn capture(&mut self, bank: u8, memory: &Memory) -> EmuResult<()> {
        let start = WINDOW as usize;
        let window = &memory[start..start + BANK_SIZE];
        self.load(bank, window)
    }

    /// Page in the bank named by the low nibble of `value`.
    pub fn select(&mut self, value: u8, memory: &mut Memory) {
        let bank = value & 0x0F;
        let start = WINDOW as usize;
        memory[start..start + BANK_SIZE].copy_from_slice(&self.banks[bank as usize]);
        self.selected = bank;
    }

    /// Bank most recently paged in.
    pub fn selected(&self) -> u8 {
        self.selected
    }

    /// Read-only view of a bank.
    pub fn bank(&self, bank: u8) -> Option<&[u8]> {
        self.banks.get(bank as usize).map(|b| &b[..])
    }
}
