//! Trap table: which guest addresses and opcodes are OS calls.

use std::collections::HashMap;

use crate::ExitReason;

/// Which platform the guest believes it is running on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Personality {
    /// BBC Model B with sideways ROMs; MOS calls arrive at the ROM vectors.
    Standalone,
    /// 6502 second processor; MOS calls arrive as illegal opcodes planted
    /// by the Tube client ROM.
    Tube,
}

/// What a service does with a request it has no emulation for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fallback {
    /// Dump the registers and stop the emulator.
    Abort,
    /// Dump the registers, signal the guest where the call allows it and
    /// carry on. The real machine can receive these.
    Report,
}

impl Personality {
    /// Policy for unsupported OSBYTE and OSWORD calls.
    pub fn fallback(self) -> Fallback {
        match self {
            Personality::Standalone => Fallback::Abort,
            Personality::Tube => Fallback::Report,
        }
    }

    /// Whether OSCLI may reach the host command interpreter.
    pub fn runs_host_commands(self) -> bool {
        match self {
            Personality::Standalone => true,
            Personality::Tube => false,
        }
    }
}

/// One emulated OS entry point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Service {
    /// OSWORD; only A=0 (read line) is emulated.
    LineInput(Personality),
    /// OSBYTE.
    ByteQuery(Personality),
    /// OSCLI.
    CommandExec(Personality),
    /// OSWRCH.
    ConsoleOut,
    /// OSRDCH.
    ConsoleIn,
    /// OSBGET.
    ByteRead,
    /// OSFIND.
    FileOpenClose,
    /// Tube client exit.
    Quit,
    /// Tube enter-language request.
    EnterLanguage,
    /// Debug trap: A = next host input byte.
    HostGetChar,
    /// Debug trap: write A to the host.
    HostPutChar,
    /// Debug trap: stop emulation.
    ExitTrap,
}

/// Where a trap is planted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrapKey {
    /// Execution reaching this address (normally via JSR).
    Call(u16),
    /// Execution reaching this opcode byte anywhere in memory.
    Opcode(u8),
}

/// What the driver does once a handler returns.
#[derive(Debug, Clone, PartialEq)]
pub enum Flow {
    /// Resume where the trapped call would have returned to.
    Return,
    /// Resume at the given address.
    Jump(u16),
    /// Stop emulation.
    Exit(ExitReason),
}

/// Address- and opcode-indexed registry of installed services.
///
/// Built once by the mode selector (plus any debug traps) before the
/// guest starts, and only read afterwards.
#[derive(Default)]
pub struct TrapTable {
    entries: Vec<(TrapKey, Service)>,
    calls: HashMap<u16, Service>,
    opcodes: HashMap<u8, Service>,
}

impl TrapTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a service, replacing whatever was at the same key.
    pub fn install(&mut self, key: TrapKey, service: Service) {
        self.entries.retain(|(k, _)| *k != key);
        self.entries.push((key, service));
        match key {
            TrapKey::Call(addr) => {
                self.calls.insert(addr, service);
            }
            TrapKey::Opcode(op) => {
                self.opcodes.insert(op, service);
            }
        }
    }

    /// Install a batch of entries in order.
    pub fn install_all(&mut self, entries: impl IntoIterator<Item = (TrapKey, Service)>) {
        for (key, service) in entries {
            self.install(key, service);
        }
    }

    /// Find the trap for the instruction about to run at `pc`.
    ///
    /// Call traps take precedence over opcode traps at the same location.
    pub fn lookup(&self, pc: u16, opcode: u8) -> Option<(TrapKey, Service)> {
        if let Some(&service) = self.calls.get(&pc) {
            return Some((TrapKey::Call(pc), service));
        }
        self.opcodes
            .get(&opcode)
            .map(|&service| (TrapKey::Opcode(opcode), service))
    }

    /// Installed entries in installation order.
    pub fn entries(&self) -> &[(TrapKey, Service)] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
