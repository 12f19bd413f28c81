//! Guest bus: RAM plus per-address read/write hooks.
//!
//! The CPU engine sees this through `mos6502::memory::Bus`. Hooks stand in
//! for the memory-mapped hardware of the emulated machine: ROM that ignores
//! writes, the sideways bank latch, and an optional stdio port.

use std::ops::RangeInclusive;

use mos6502::memory::Bus;

use crate::banks::BankStore;
use crate::console::HostConsole;
use crate::guest::{Memory, MEMORY_SIZE};

/// Side effect attached to a guest write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteHook {
    /// Read-only memory; the write is dropped.
    Rom,
    /// Sideways bank select latch (ROMSEL).
    BankSelect,
    /// Send the byte to host output.
    Stdout,
}

/// Side effect attached to a guest read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadHook {
    /// Return the next host input byte.
    Stdin,
}

/// Memory, devices and host console as seen from the guest.
pub struct GuestBus<C: HostConsole> {
    pub(crate) ram: Box<Memory>,
    pub(crate) banks: BankStore,
    pub(crate) console: C,
    reads: Vec<Option<ReadHook>>,
    writes: Vec<Option<WriteHook>>,
}

impl<C: HostConsole> GuestBus<C> {
    pub fn new(console: C) -> Self {
        Self {
            ram: Box::new([0; MEMORY_SIZE]),
            banks: BankStore::new(),
            console,
            reads: vec![None; MEMORY_SIZE],
            writes: vec![None; MEMORY_SIZE],
        }
    }

    /// Attach a write hook to every address in `range`.
    pub fn hook_writes(&mut self, range: RangeInclusive<u16>, hook: WriteHook) {
        for addr in range {
            self.writes[addr as usize] = Some(hook);
        }
    }

    /// Attach a read hook to every address in `range`.
    pub fn hook_reads(&mut self, range: RangeInclusive<u16>, hook: ReadHook) {
        for addr in range {
            self.reads[addr as usize] = Some(hook);
        }
    }

    pub fn write_hook(&self, address: u16) -> Option<WriteHook> {
        self.writes[address as usize]
    }

    pub fn read_hook(&self, address: u16) -> Option<ReadHook> {
        self.reads[address as usize]
    }

    /// Fill a range of RAM directly, bypassing hooks.
    pub fn fill(&mut self, range: RangeInclusive<u16>, value: u8) {
        self.ram[*range.start() as usize..=*range.end() as usize].fill(value);
    }

    /// Read RAM without triggering hooks.
    pub fn peek(&self, address: u16) -> u8 {
        self.ram[address as usize]
    }
}

impl<C: HostConsole> Bus for GuestBus<C> {
    fn get_byte(&mut self, address: u16) -> u8 {
        match self.reads[address as usize] {
            Some(ReadHook::Stdin) => self.console.read_char().unwrap_or(0xFF),
            None => self.ram[address as usize],
        }
    }

    fn set_byte(&mut self, address: u16, value: u8) {
        match self.writes[address as usize] {
            Some(WriteHook::Rom) => {}
            Some(WriteHook::BankSelect) => self.banks.select(value, &mut self.ram),
            Some(WriteHook::Stdout) => {
                self.console.write(value);
                self.console.flush();
            }
            None => self.ram[address as usize] = value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::console::HeadlessConsole;

    #[test]
    fn test_rom_hook_drops_writes() {
        let mut bus = GuestBus::new(HeadlessConsole::new());
        bus.ram[0x9000] = 0x11;
        bus.hook_writes(0x8000..=0xBFFF, WriteHook::Rom);

        bus.set_byte(0x9000, 0x22);
        bus.set_byte(0x7FFF, 0x33);

        assert_eq!(bus.get_byte(0x9000), 0x11);
        assert_eq!(bus.get_byte(0x7FFF), 0x33);
    }

    #[test]
    fn test_bank_select_hook() {
        let mut bus = GuestBus::new(HeadlessConsole::new());
        bus.banks.load(7, &[0xAB; 0x4000]).unwrap();
        bus.hook_writes(0xFE30..=0xFE33, WriteHook::BankSelect);

        bus.set_byte(0xFE32, 0x17);

        assert_eq!(bus.banks.selected(), 7);
        assert_eq!(bus.peek(0x8000), 0xAB);
        assert_eq!(bus.peek(0xBFFF), 0xAB);
        // the latch itself is not RAM
        assert_eq!(bus.peek(0xFE32), 0x00);
    }

    #[test]
    fn test_stdio_port() {
        let mut bus = GuestBus::new(HeadlessConsole::with_input(b"Q"));
        bus.hook_reads(0xE000..=0xE000, ReadHook::Stdin);
        bus.hook_writes(0xE000..=0xE000, WriteHook::Stdout);
        assert_eq!(bus.read_hook(0xE000), Some(ReadHook::Stdin));
        assert_eq!(bus.write_hook(0xE000), Some(WriteHook::Stdout));
        assert_eq!(bus.read_hook(0xE001), None);

        bus.set_byte(0xE000, b'!');
        assert_eq!(bus.get_byte(0xE000), b'Q');
        assert_eq!(bus.get_byte(0xE000), 0xFF);
        assert_eq!(bus.console.output(), b"!");
    }

    #[test]
    fn test_fill() {
        let mut bus = GuestBus::new(HeadlessConsole::new());
        bus.fill(0xFC00..=0xFEFF, 0xFF);
        assert_eq!(bus.peek(0xFBFF), 0x00);
        assert_eq!(bus.peek(0xFC00), 0xFF);
        assert_eq!(bus.peek(0xFEFF), 0xFF);
        assert_eq!(bus.peek(0xFF00), 0x00);
    }
}
