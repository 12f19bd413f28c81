//! Acorn MOS call emulation.
//!
//! Each handler takes the guest registers and memory (plus the host
//! console and file table), performs one OS call, and tells the driver how
//! to continue. Handlers never exit the process themselves.

mod chario;
mod filing;
mod osbyte;
mod oscli;
mod osword;
mod tube;

pub use oscli::write_error;
pub use osword::{scan_line, ESCAPE};

use log::debug;

use crate::console::HostConsole;
use crate::files::FileTable;
use crate::guest::{Memory, Registers};
use crate::traps::{Flow, Service};

/// Fixed addresses used by the emulated MOS.
pub mod addr {
    /// OSWORD entry in the MOS ROM.
    pub const OSWORD: u16 = 0xFFF1;
    /// OSBYTE entry in the MOS ROM.
    pub const OSBYTE: u16 = 0xFFF4;
    /// OSCLI entry in the MOS ROM.
    pub const OSCLI: u16 = 0xFFF7;
    /// OSWRCH entry in the MOS ROM.
    pub const OSWRCH: u16 = 0xFFEE;
    /// Non-vectored OSWRCH inside the MOS 1.20 ROM.
    pub const NVWRCH: u16 = 0xE0A4;
    /// Where error blocks are built before a BRK.
    pub const ERROR_BLOCK: u16 = 0x0100;
    /// Where the Tube start-up command is handed to the client.
    pub const TUBE_COMMAND: u16 = 0x0800;
}

/// Illegal opcodes the Tube client ROM uses to call the host.
pub mod opcode {
    pub const OSCLI: u8 = 0x03;
    pub const OSBYTE: u8 = 0x13;
    pub const OSWORD: u8 = 0x23;
    pub const OSWRCH: u8 = 0x33;
    pub const OSRDCH: u8 = 0x43;
    pub const OSBGET: u8 = 0x73;
    pub const OSFIND: u8 = 0xA3;
    pub const QUIT: u8 = 0xB3;
    pub const ENTER_LANGUAGE: u8 = 0xC3;
}

/// Error number reported for an unrecognised `*` command.
pub const ERR_BAD_COMMAND: u8 = 254;

/// Everything a handler may touch for the duration of one call.
pub struct CallContext<'a, C: HostConsole> {
    pub regs: &'a mut Registers,
    pub memory: &'a mut Memory,
    pub console: &'a mut C,
    pub files: &'a mut FileTable,
    /// Command handed over by the Tube start-up handshake.
    pub startup_command: Option<&'a str>,
}

/// Run one OS call.
pub fn dispatch<C: HostConsole>(service: Service, ctx: &mut CallContext<'_, C>) -> Flow {
    debug!("[MOS] {:?} {}", service, ctx.regs.dump());

    match service {
        Service::LineInput(personality) => osword::osword(ctx, personality),
        Service::ByteQuery(personality) => osbyte::osbyte(ctx, personality),
        Service::CommandExec(personality) => oscli::oscli(ctx, personality),
        Service::ConsoleOut => chario::oswrch(ctx),
        Service::ConsoleIn => chario::osrdch(ctx),
        Service::ByteRead => filing::osbget(ctx),
        Service::FileOpenClose => filing::osfind(ctx),
        Service::Quit => tube::quit(ctx),
        Service::EnterLanguage => tube::enter_language(ctx),
        Service::HostGetChar => chario::get_char(ctx),
        Service::HostPutChar => chario::put_char(ctx),
        Service::ExitTrap => tube::exit_trap(ctx),
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::console::HeadlessConsole;
    use crate::guest::MEMORY_SIZE;

    /// Owned state for driving handlers directly.
    pub struct Rig {
        pub regs: Registers,
        pub memory: Box<Memory>,
        pub console: HeadlessConsole,
        pub files: FileTable,
        pub startup_command: Option<String>,
    }

    impl Rig {
        pub fn new() -> Self {
            Self::with_input(b"")
        }

        pub fn with_input(input: &[u8]) -> Self {
            Self {
                regs: Registers {
                    s: 0xFF,
                    p: 0x24,
                    ..Default::default()
                },
                memory: Box::new([0; MEMORY_SIZE]),
                console: HeadlessConsole::with_input(input),
                files: FileTable::new(),
                startup_command: None,
            }
        }

        pub fn call(&mut self, service: Service) -> Flow {
            let mut ctx = CallContext {
                regs: &mut self.regs,
                memory: &mut self.memory,
                console: &mut self.console,
                files: &mut self.files,
                startup_command: self.startup_command.as_deref(),
            };
            dispatch(service, &mut ctx)
        }

        /// Point X/Y at `address`.
        pub fn point_at(&mut self, address: u16) {
            let [lo, hi] = address.to_le_bytes();
            self.regs.x = lo;
            self.regs.y = hi;
        }
    }
}
