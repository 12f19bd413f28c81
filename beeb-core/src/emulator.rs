//! 6502 emulator driver - runs the CPU engine and dispatches OS traps.

use log::{debug, info};
use mos6502::cpu::CPU;
use mos6502::instruction::Nmos6502;
use mos6502::Variant;
use mos6502::registers::{StackPointer, Status};

use crate::banks::{BANK_COUNT, WINDOW};
use crate::bus::{GuestBus, ReadHook, WriteHook};
use crate::console::HostConsole;
use crate::error::{EmuError, EmuResult};
use crate::files::FileTable;
use crate::guest::{flags, pull_return_address, read_word, Memory, Registers, MEMORY_SIZE};
use crate::mos::{self, CallContext};
use crate::personality::{self, ModeRequest};
use crate::traps::{Flow, Personality, Service, TrapKey, TrapTable};
use crate::{ExitInfo, ExitReason};

/// Hardware vectors at the top of memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Vector {
    Nmi,
    Reset,
    Irq,
}

impl Vector {
    pub fn address(self) -> u16 {
        match self {
            Vector::Nmi => 0xFFFA,
            Vector::Reset => 0xFFFC,
            Vector::Irq => 0xFFFE,
        }
    }
}

/// BRK.
const BRK: u8 = 0x00;

/// Bottom of the hardware stack page.
const STACK: usize = 0x0100;

/// 6502 machine with emulated Acorn MOS calls.
pub struct BeebEmulator<C: HostConsole> {
    /// 6502 CPU; owns the guest bus.
    cpu: CPU<GuestBus<C>, Nmos6502>,
    /// Host files opened by the guest.
    files: FileTable,
    /// Installed OS and debug traps.
    traps: TrapTable,
    /// Installed personality, if any.
    personality: Option<Personality>,
    /// Command for the Tube start-up handshake.
    startup_command: Option<String>,
    /// Bank the next sideways image goes into.
    next_bank: Option<u8>,
    /// Instructions executed by the last run.
    steps: u64,
}

impl<C: HostConsole> BeebEmulator<C> {
    /// Create a new emulator with zeroed memory and no traps.
    pub fn new(console: C) -> Self {
        Self {
            cpu: CPU::new(GuestBus::new(console), Nmos6502),
            files: FileTable::new(),
            traps: TrapTable::new(),
            personality: None,
            startup_command: None,
            next_bank: Some(BANK_COUNT as u8 - 1),
            steps: 0,
        }
    }

    /// Get console reference.
    pub fn console(&self) -> &C {
        &self.cpu.memory.console
    }

    /// Get mutable console reference.
    pub fn console_mut(&mut self) -> &mut C {
        &mut self.cpu.memory.console
    }

    /// Guest memory as it stands.
    pub fn memory(&self) -> &Memory {
        &self.cpu.memory.ram
    }

    /// Contents of a sideways bank.
    pub fn bank(&self, bank: u8) -> Option<&[u8]> {
        self.cpu.memory.banks.bank(bank)
    }

    pub fn personality(&self) -> Option<Personality> {
        self.personality
    }

    pub fn traps(&self) -> &TrapTable {
        &self.traps
    }

    /// Host files still open.
    pub fn open_files(&self) -> usize {
        self.files.open_count()
    }

    /// Current CPU registers.
    pub fn registers(&self) -> Registers {
        let r = &self.cpu.registers;
        Registers {
            a: r.accumulator,
            x: r.index_x,
            y: r.index_y,
            s: r.stack_pointer.0,
            p: r.status.bits(),
            pc: r.program_counter,
        }
    }

    fn set_registers(&mut self, regs: &Registers) {
        let r = &mut self.cpu.registers;
        r.accumulator = regs.a;
        r.index_x = regs.x;
        r.index_y = regs.y;
        r.stack_pointer = StackPointer(regs.s);
        r.status = Status::from_bits_truncate(regs.p);
        r.program_counter = regs.pc;
    }

    /// Set the program counter.
    pub fn set_pc(&mut self, address: u16) {
        self.cpu.registers.program_counter = address;
    }

    /// Copy raw bytes into memory, dropping whatever would pass 0xFFFF.
    pub fn load_at(&mut self, address: u16, data: &[u8]) {
        let start = address as usize;
        let end = (start + data.len()).min(MEMORY_SIZE);
        self.cpu.memory.ram[start..end].copy_from_slice(&data[..end - start]);
    }

    /// Load an interpreter image: `#!` and the rest of its first line are
    /// skipped, the remainder is loaded at `address`.
    pub fn load_interpreter(&mut self, address: u16, data: &[u8]) -> EmuResult<()> {
        let body = data.strip_prefix(b"#!").ok_or(EmuError::NotInterpreter)?;
        // the byte that ends the header line is consumed with it
        let skip = body
            .iter()
            .position(|&b| b < b' ')
            .map_or(body.len(), |i| i + 1);
        self.load_at(address, &body[skip..]);
        Ok(())
    }

    /// Load a sideways ROM image at 0x8000 and keep a copy of the window in
    /// the next free bank, counting down from 15. Returns the bank used.
    pub fn load_sideways_image(&mut self, data: &[u8]) -> EmuResult<u8> {
        let bank = self.next_bank.ok_or(EmuError::TooManyImages)?;
        self.load_at(WINDOW, data);
        let bus = &mut self.cpu.memory;
        bus.banks.capture(bank, &bus.ram)?;
        self.next_bank = bank.checked_sub(1);
        debug!("Sideways image of {} bytes in bank {}", data.len(), bank);
        Ok(bank)
    }

    /// Put an image straight into a bank without touching the window.
    pub fn load_bank(&mut self, bank: u8, data: &[u8]) -> EmuResult<()> {
        self.cpu.memory.banks.load(bank, data)
    }

    /// Copy `len` bytes starting at `address`, stopping at the top of memory.
    pub fn save(&self, address: u16, len: usize) -> Vec<u8> {
        let start = address as usize;
        let end = (start + len).min(MEMORY_SIZE);
        self.cpu.memory.ram[start..end].to_vec()
    }

    /// Point a hardware vector at `address`.
    pub fn set_vector(&mut self, vector: Vector, address: u16) {
        self.load_at(vector.address(), &address.to_le_bytes());
    }

    /// Install a single trap, e.g. one of the host debug traps.
    pub fn install_trap(&mut self, key: TrapKey, service: Service) {
        self.traps.install(key, service);
    }

    /// Map host stdin/stdout onto one guest address.
    pub fn map_stdio(&mut self, address: u16) {
        self.cpu.memory.hook_reads(address..=address, ReadHook::Stdin);
        self.cpu.memory.hook_writes(address..=address, WriteHook::Stdout);
    }

    /// Validate the mode request and install the personality it names.
    pub fn select_mode(&mut self, request: &ModeRequest) -> EmuResult<Option<Personality>> {
        let selected = request.resolve()?;
        match selected {
            Some(Personality::Standalone) => personality::install_standalone(
                &mut self.cpu.memory,
                &mut self.traps,
                request.host_commands,
            )?,
            Some(Personality::Tube) => {
                personality::install_tube(&self.cpu.memory, &mut self.traps)?
            }
            None => {}
        }
        self.personality = selected;
        self.startup_command = request.startup_command.clone();
        info!("Personality: {:?}", selected);
        Ok(selected)
    }

    /// Reset the CPU: PC from the reset vector, empty stack, IRQs masked.
    pub fn reset(&mut self) {
        let pc = read_word(&self.cpu.memory.ram, Vector::Reset.address());
        self.set_registers(&Registers {
            s: 0xFF,
            p: flags::UNUSED | flags::IRQ_DISABLE,
            pc,
            ..Default::default()
        });
    }

    /// Run from the current PC until the guest stops.
    ///
    /// Any files the guest left open are closed on the way out.
    pub fn run(&mut self) -> ExitInfo {
        self.steps = 0;
        let reason = self.run_until_exit();
        let closed = self.files.close_all();
        if closed > 0 {
            debug!("Closed {} guest files at exit", closed);
        }
        ExitInfo {
            reason,
            pc: self.cpu.registers.program_counter,
            steps: self.steps,
        }
    }

    fn run_until_exit(&mut self) -> ExitReason {
        loop {
            let pc = self.cpu.registers.program_counter;
            let opcode = self.cpu.memory.peek(pc);

            // Check for OS traps BEFORE executing
            if let Some((key, service)) = self.traps.lookup(pc, opcode) {
                if let Some(reason) = self.handle_trap(key, service) {
                    return reason;
                }
                continue;
            }

            if opcode == BRK {
                self.take_break(pc);
            } else {
                self.cpu.single_step();
            }
            self.steps += 1;

            // Only a loop onto itself or an opcode the engine could not
            // decode leaves PC where it was
            if self.cpu.registers.program_counter == pc {
                return if Nmos6502::decode(opcode).is_none() {
                    ExitReason::IllegalOpcode { opcode, pc }
                } else {
                    ExitReason::Halt
                };
            }
        }
    }

    /// BRK at `pc`: stack `pc + 2` (the byte after BRK is padding), then P
    /// with B set, mask IRQs and continue through the IRQ/BRK vector.
    fn take_break(&mut self, pc: u16) {
        let mut regs = self.registers();
        let [lo, hi] = pc.wrapping_add(2).to_le_bytes();
        let pushed = regs.p | flags::BREAK | flags::UNUSED;
        for byte in [hi, lo, pushed] {
            self.cpu.memory.ram[STACK + regs.s as usize] = byte;
            regs.s = regs.s.wrapping_sub(1);
        }
        regs.p |= flags::IRQ_DISABLE;
        regs.pc = read_word(&self.cpu.memory.ram, Vector::Irq.address());
        self.set_registers(&regs);
    }

    /// Run one OS call. Returns Some(reason) if the guest should stop.
    fn handle_trap(&mut self, key: TrapKey, service: Service) -> Option<ExitReason> {
        let mut regs = self.registers();
        let bus = &mut self.cpu.memory;
        let mut ctx = CallContext {
            regs: &mut regs,
            memory: &mut bus.ram,
            console: &mut bus.console,
            files: &mut self.files,
            startup_command: self.startup_command.as_deref(),
        };

        let flow = mos::dispatch(service, &mut ctx);
        let resume = match flow {
            Flow::Return => match key {
                TrapKey::Call(_) => pull_return_address(&mut regs, &bus.ram),
                TrapKey::Opcode(_) => regs.pc.wrapping_add(1),
            },
            Flow::Jump(address) => address,
            Flow::Exit(reason) => {
                self.set_registers(&regs);
                return Some(reason);
            }
        };

        regs.pc = resume;
        self.set_registers(&regs);
        None
    }
}
