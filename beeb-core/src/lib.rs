//! Acorn MOS Emulation Core
//!
//! This crate runs 6502 machine code written for the BBC Micro without a
//! real MOS ROM, supplying the operating system calls from the host:
//! - MOS call handlers (OSWORD 0, OSBYTE, OSCLI, OSWRCH, OSRDCH, OSFIND, OSBGET)
//! - Sideways ROM banks and the standalone memory map
//! - Host files behind guest file handles
//! - ROM sets packaged as ZIP archives
//!
//! # Architecture
//!
//! The emulator uses two personalities:
//! - Standalone: a BBC Model B whose MOS entry points are trapped by address
//! - Tube: a 6502 second processor whose client ROM reaches the host
//!   through illegal opcodes
//!
//! `BeebEmulator` owns the `mos6502` CPU engine, checks the trap table before
//! every instruction, and runs the matching handler from `mos` against a
//! snapshot of the registers. Handlers report how to continue with a `Flow`;
//! only the driver ever stops the run.

pub mod banks;
pub mod bus;
pub mod console;
pub mod emulator;
pub mod error;
pub mod files;
pub mod guest;
pub mod mos;
pub mod personality;
pub mod romset;
pub mod traps;

pub use console::{HeadlessConsole, HostConsole};
pub use emulator::{BeebEmulator, Vector};
pub use error::{EmuError, EmuResult};
pub use guest::Registers;
pub use personality::ModeRequest;
pub use romset::{load_romset, load_romset_from_path, RomImage, RomSet, RomSetManifest};
pub use traps::{Personality, Service, TrapKey};

/// Reason the guest stopped.
#[derive(Debug, Clone, PartialEq)]
pub enum ExitReason {
    /// Tube client QUIT call
    Quit,
    /// Host input ran out during OSWORD 0 or OSRDCH
    EndOfInput,
    /// Debug exit trap reached
    ExitTrap,
    /// Guest jumped or branched to itself
    Halt,
    /// Opcode the CPU could not execute and no trap claimed
    IllegalOpcode { opcode: u8, pc: u16 },
    /// Unsupported OS call in a personality that treats it as fatal
    Fault(String),
}

impl ExitReason {
    /// Whether the process should exit with status 0.
    pub fn is_success(&self) -> bool {
        !matches!(
            self,
            ExitReason::IllegalOpcode { .. } | ExitReason::Fault(_)
        )
    }
}

/// Information about how a run ended.
#[derive(Debug, Clone)]
pub struct ExitInfo {
    pub reason: ExitReason,
    pub pc: u16,
    /// Instructions executed by the CPU, not counting OS calls.
    pub steps: u64,
}
