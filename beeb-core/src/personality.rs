//! Mode selection: which set of OS traps the guest gets.
//!
//! Exactly one personality is installed, never both. Standalone sets up the
//! BBC Micro memory map (ROM protection, I/O shadows, sideways paging) and
//! traps the MOS ROM entry points. Tube leaves memory alone and traps the
//! illegal opcodes the Tube client ROM uses to reach the host.

use log::{debug, info};

use crate::banks::WINDOW;
use crate::bus::{GuestBus, WriteHook};
use crate::console::HostConsole;
use crate::error::{EmuError, EmuResult};
use crate::guest::Memory;
use crate::mos::{addr, opcode};
use crate::traps::{Personality, Service, TrapKey, TrapTable};

/// Text every Tube client ROM carries somewhere in its top 2 KiB.
pub const TUBE_SIGNATURE: &[u8] = b"Acorn 6502 Tube";

/// Where the Tube client ROM lives.
pub const TUBE_ROM_START: u16 = 0xF800;

/// Sideways bank select latch (ROMSEL) and its mirrors.
pub const ROMSEL: std::ops::RangeInclusive<u16> = 0xFE30..=0xFE33;

/// Which personality the user asked for.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModeRequest {
    /// `-B`: BBC Micro with sideways ROMs.
    pub standalone: bool,
    /// `-T`: 6502 second processor.
    pub tube: bool,
    /// `-c`: `*` command handed to the Tube client at start-up.
    pub startup_command: Option<String>,
    /// Let standalone OSCLI run host commands.
    pub host_commands: bool,
}

impl ModeRequest {
    /// Check the request is consistent and name the personality it selects.
    /// `None` means no OS traps at all.
    pub fn resolve(&self) -> EmuResult<Option<Personality>> {
        if self.standalone && self.tube {
            return Err(EmuError::IncompatibleModes);
        }
        if self.startup_command.is_some() && !self.tube {
            return Err(EmuError::CommandWithoutTube);
        }
        Ok(if self.standalone {
            Some(Personality::Standalone)
        } else if self.tube {
            Some(Personality::Tube)
        } else {
            None
        })
    }
}

/// MOS ROM entry points trapped in standalone mode.
pub fn standalone_traps(host_commands: bool) -> Vec<(TrapKey, Service)> {
    let mut traps = vec![
        (
            TrapKey::Call(addr::OSWORD),
            Service::LineInput(Personality::Standalone),
        ),
        (
            TrapKey::Call(addr::OSBYTE),
            Service::ByteQuery(Personality::Standalone),
        ),
        (TrapKey::Call(addr::OSWRCH), Service::ConsoleOut),
        (TrapKey::Call(addr::NVWRCH), Service::ConsoleOut),
    ];
    if host_commands {
        traps.push((
            TrapKey::Call(addr::OSCLI),
            Service::CommandExec(Personality::Standalone),
        ));
    }
    traps
}

/// Illegal opcodes trapped in Tube mode.
pub fn tube_traps() -> Vec<(TrapKey, Service)> {
    vec![
        (
            TrapKey::Opcode(opcode::OSCLI),
            Service::CommandExec(Personality::Tube),
        ),
        (
            TrapKey::Opcode(opcode::OSBYTE),
            Service::ByteQuery(Personality::Tube),
        ),
        (
            TrapKey::Opcode(opcode::OSWORD),
            Service::LineInput(Personality::Tube),
        ),
        (TrapKey::Opcode(opcode::OSWRCH), Service::ConsoleOut),
        (TrapKey::Opcode(opcode::OSRDCH), Service::ConsoleIn),
        (TrapKey::Opcode(opcode::OSBGET), Service::ByteRead),
        (TrapKey::Opcode(opcode::OSFIND), Service::FileOpenClose),
        (TrapKey::Opcode(opcode::QUIT), Service::Quit),
        (TrapKey::Opcode(opcode::ENTER_LANGUAGE), Service::EnterLanguage),
    ]
}

/// Locate the Tube client ROM signature in 0xF800-0xFFFF.
pub fn find_signature(memory: &Memory) -> Option<u16> {
    let start = TUBE_ROM_START as usize;
    memory[start..]
        .windows(TUBE_SIGNATURE.len())
        .position(|w| w == TUBE_SIGNATURE)
        .map(|offset| (start + offset) as u16)
}

/// Set up the BBC Micro memory map and trap the MOS entry points.
///
/// Whatever is in the paged window at this point becomes bank 0.
pub fn install_standalone<C: HostConsole>(
    bus: &mut GuestBus<C>,
    traps: &mut TrapTable,
    host_commands: bool,
) -> EmuResult<()> {
    bus.banks.capture(0, &bus.ram)?;

    bus.hook_writes(WINDOW..=0xFBFF, WriteHook::Rom);
    bus.fill(0xFC00..=0xFEFF, 0xFF);
    bus.hook_writes(ROMSEL, WriteHook::BankSelect);
    bus.fill(0xFE40..=0xFE4F, 0x00);
    bus.hook_writes(0xFF00..=0xFFFF, WriteHook::Rom);

    traps.install_all(standalone_traps(host_commands));
    debug!(
        "Standalone traps installed (OSCLI {})",
        if host_commands { "on" } else { "off" }
    );
    Ok(())
}

/// Check for the Tube client ROM and trap its host-call opcodes.
///
/// A real second processor copies its ROM into RAM at start-up, so no
/// memory is write protected.
pub fn install_tube<C: HostConsole>(bus: &GuestBus<C>, traps: &mut TrapTable) -> EmuResult<()> {
    let at = find_signature(&bus.ram).ok_or(EmuError::TubeRomMissing)?;
    info!("Tube client ROM found at {:04X}", at);
    traps.install_all(tube_traps());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::console::HeadlessConsole;
    use crate::guest::write_bytes;
    use mos6502::memory::Bus;

    fn request(standalone: bool, tube: bool, command: Option<&str>) -> ModeRequest {
        ModeRequest {
            standalone,
            tube,
            startup_command: command.map(String::from),
            host_commands: false,
        }
    }

    #[test]
    fn test_resolve() {
        assert_eq!(request(false, false, None).resolve().unwrap(), None);
        assert_eq!(
            request(true, false, None).resolve().unwrap(),
            Some(Personality::Standalone)
        );
        assert_eq!(
            request(false, true, Some("BASIC")).resolve().unwrap(),
            Some(Personality::Tube)
        );
        assert!(matches!(
            request(true, true, None).resolve(),
            Err(EmuError::IncompatibleModes)
        ));
        assert!(matches!(
            request(true, false, Some("BASIC")).resolve(),
            Err(EmuError::CommandWithoutTube)
        ));
        assert!(matches!(
            request(false, false, Some("BASIC")).resolve(),
            Err(EmuError::CommandWithoutTube)
        ));
        // both modes beats a stray command
        assert!(matches!(
            request(true, true, Some("BASIC")).resolve(),
            Err(EmuError::IncompatibleModes)
        ));
    }

    #[test]
    fn test_standalone_memory_map() {
        let mut bus = GuestBus::new(HeadlessConsole::new());
        bus.ram[0x8000] = 0x42;
        let mut traps = TrapTable::new();

        install_standalone(&mut bus, &mut traps, false).unwrap();

        assert_eq!(bus.banks.bank(0).unwrap()[0], 0x42);
        assert_eq!(bus.peek(0xFC00), 0xFF);
        assert_eq!(bus.peek(0xFE3F), 0xFF);
        assert_eq!(bus.peek(0xFE40), 0x00);
        assert_eq!(bus.peek(0xFE4F), 0x00);
        assert_eq!(bus.peek(0xFE50), 0xFF);
        assert_eq!(bus.write_hook(0x8000), Some(WriteHook::Rom));
        assert_eq!(bus.write_hook(0xFBFF), Some(WriteHook::Rom));
        assert_eq!(bus.write_hook(0xFC00), None);
        assert_eq!(bus.write_hook(0xFE30), Some(WriteHook::BankSelect));
        assert_eq!(bus.write_hook(0xFE33), Some(WriteHook::BankSelect));
        assert_eq!(bus.write_hook(0xFFFF), Some(WriteHook::Rom));
        assert_eq!(bus.write_hook(0x7FFF), None);

        bus.set_byte(0x9000, 0x99);
        assert_eq!(bus.peek(0x9000), 0x00);

        assert_eq!(traps.entries().len(), 4);
        assert_eq!(
            traps.lookup(addr::NVWRCH, 0),
            Some((TrapKey::Call(addr::NVWRCH), Service::ConsoleOut))
        );
        assert_eq!(traps.lookup(addr::OSCLI, 0), None);
    }

    #[test]
    fn test_standalone_oscli_is_optional() {
        let mut bus = GuestBus::new(HeadlessConsole::new());
        let mut traps = TrapTable::new();
        install_standalone(&mut bus, &mut traps, true).unwrap();
        assert_eq!(
            traps.lookup(addr::OSCLI, 0),
            Some((
                TrapKey::Call(addr::OSCLI),
                Service::CommandExec(Personality::Standalone)
            ))
        );
    }

    #[test]
    fn test_tube_requires_signature() {
        let bus = GuestBus::new(HeadlessConsole::new());
        let mut traps = TrapTable::new();
        assert!(matches!(
            install_tube(&bus, &mut traps),
            Err(EmuError::TubeRomMissing)
        ));
        assert!(traps.is_empty());
    }

    #[test]
    fn test_tube_install() {
        let mut bus = GuestBus::new(HeadlessConsole::new());
        write_bytes(&mut bus.ram, 0xF812, TUBE_SIGNATURE);
        let mut traps = TrapTable::new();

        install_tube(&bus, &mut traps).unwrap();

        let opcodes: Vec<u8> = traps
            .entries()
            .iter()
            .map(|(key, _)| match key {
                TrapKey::Opcode(op) => *op,
                TrapKey::Call(a) => panic!("unexpected call trap at {:04X}", a),
            })
            .collect();
        assert_eq!(
            opcodes,
            [0x03, 0x13, 0x23, 0x33, 0x43, 0x73, 0xA3, 0xB3, 0xC3]
        );
        // nothing is write protected
        assert!((0x8000..=0xFFFFu32).all(|a| bus.write_hook(a as u16).is_none()));
    }

    #[test]
    fn test_signature_search_window() {
        let mut memory = Box::new([0u8; 0x10000]);
        // below the window does not count
        write_bytes(&mut memory, 0xF7F0, TUBE_SIGNATURE);
        assert_eq!(find_signature(&memory), None);

        // flush against the top of memory does
        let top = (0x10000 - TUBE_SIGNATURE.len()) as u16;
        write_bytes(&mut memory, top, TUBE_SIGNATURE);
        assert_eq!(find_signature(&memory), Some(top));
    }
}
