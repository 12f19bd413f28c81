//! Guest register file and memory conventions shared by the OS call handlers.

/// Size of the 6502 address space.
pub const MEMORY_SIZE: usize = 0x10000;

/// The guest's flat 64 KiB address space.
pub type Memory = [u8; MEMORY_SIZE];

/// Processor status bits.
pub mod flags {
    pub const CARRY: u8 = 0x01;
    pub const ZERO: u8 = 0x02;
    pub const IRQ_DISABLE: u8 = 0x04;
    pub const DECIMAL: u8 = 0x08;
    pub const BREAK: u8 = 0x10;
    pub const UNUSED: u8 = 0x20;
    pub const OVERFLOW: u8 = 0x40;
    pub const NEGATIVE: u8 = 0x80;
}

/// Carriage return, the MOS string and line terminator.
pub const CR: u8 = 0x0D;

/// Longest string the handlers will pull out of guest memory.
pub const MAX_STRING: usize = 1023;

/// Snapshot of the 6502 registers handed to an OS call handler.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Registers {
    pub a: u8,
    pub x: u8,
    pub y: u8,
    /// Stack pointer (offset into page 1).
    pub s: u8,
    /// Processor status.
    pub p: u8,
    pub pc: u16,
}

impl Registers {
    /// Carry flag, the MOS error/escape signal.
    pub fn carry(&self) -> bool {
        self.p & flags::CARRY != 0
    }

    pub fn set_carry(&mut self, on: bool) {
        if on {
            self.p |= flags::CARRY;
        } else {
            self.p &= !flags::CARRY;
        }
    }

    /// The X (low) / Y (high) parameter pointer used by most MOS calls.
    pub fn yx(&self) -> u16 {
        u16::from_le_bytes([self.x, self.y])
    }

    /// One-line register dump for diagnostics.
    pub fn dump(&self) -> String {
        const NAMES: &[u8; 8] = b"NV-BDIZC";
        let status: String = NAMES
            .iter()
            .enumerate()
            .map(|(i, &name)| {
                if self.p & (0x80 >> i) != 0 {
                    name as char
                } else {
                    '-'
                }
            })
            .collect();
        format!(
            "PC={:04X} SP={:04X} A={:02X} X={:02X} Y={:02X} P={:02X} {}",
            self.pc,
            0x0100 + self.s as u16,
            self.a,
            self.x,
            self.y,
            self.p,
            status
        )
    }
}

/// Read a little-endian word, wrapping at the top of memory.
pub fn read_word(memory: &Memory, address: u16) -> u16 {
    let lo = memory[address as usize];
    let hi = memory[address.wrapping_add(1) as usize];
    u16::from_le_bytes([lo, hi])
}

/// Copy bytes into guest memory starting at `address`, wrapping at 0xFFFF.
pub fn write_bytes(memory: &mut Memory, address: u16, bytes: &[u8]) {
    let mut addr = address;
    for &b in bytes {
        memory[addr as usize] = b;
        addr = addr.wrapping_add(1);
    }
}

/// Extract the raw bytes of a CR-terminated string from guest memory,
/// stopping after `MAX_STRING` bytes.
///
/// With `skip_stars` set, leading `*` and space characters are dropped
/// first, which is how OSCLI sees its argument.
pub fn read_cr_bytes(memory: &Memory, address: u16, skip_stars: bool) -> Vec<u8> {
    let mut addr = address;
    if skip_stars {
        while matches!(memory[addr as usize], b'*' | b' ') {
            addr = addr.wrapping_add(1);
        }
    }
    let mut bytes = Vec::new();
    while memory[addr as usize] != CR && bytes.len() < MAX_STRING {
        bytes.push(memory[addr as usize]);
        addr = addr.wrapping_add(1);
    }
    bytes
}

/// Like `read_cr_bytes`, with each byte taken as one Latin-1 character.
pub fn read_cr_string(memory: &Memory, address: u16, skip_stars: bool) -> String {
    read_cr_bytes(memory, address, skip_stars)
        .into_iter()
        .map(char::from)
        .collect()
}

/// Pop the JSR return address off the guest stack, RTS style.
pub fn pull_return_address(regs: &mut Registers, memory: &Memory) -> u16 {
    regs.s = regs.s.wrapping_add(1);
    let lo = memory[0x0100 + regs.s as usize];
    regs.s = regs.s.wrapping_add(1);
    let hi = memory[0x0100 + regs.s as usize];
    u16::from_le_bytes([lo, hi]).wrapping_add(1)
}
