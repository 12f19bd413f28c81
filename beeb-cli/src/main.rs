//! run6502 - Run 6502 programs against emulated Acorn MOS calls.
//!
//! Usage:
//!   run6502 [options] [image ...]
//!   run6502 image
//!
//! Examples:
//!   run6502 -l 8000 BASIC2.ROM -R 8000 -B     # BBC BASIC, standalone
//!   run6502 -l f800 client.rom -T -c BASIC   # Tube client, start BASIC
//!   run6502 --romset tube-basic.zip          # everything from a ROM set
//!   run6502 hello                            # #! script or raw image at 0

use std::io::{self, BufRead, Read, Write};
use std::path::PathBuf;
use std::process::Command;
use std::sync::mpsc;
use std::time::Duration;

use clap::Parser;
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    terminal::{disable_raw_mode, enable_raw_mode},
};
use log::{debug, error, info, warn};
use tokio::sync::mpsc as tokio_mpsc;

use beeb_core::{
    load_romset_from_path, BeebEmulator, EmuError, ExitInfo, HostConsole, ModeRequest, Service,
    TrapKey, Vector,
};

/// Memory dump written by -w.
const EXIT_DUMP: &str = "run6502.out";

/// Ctrl-D ends input in raw mode.
const END_OF_INPUT_KEY: u8 = 0x04;

/// 6502 emulator with Acorn MOS call emulation
#[derive(Parser, Debug)]
#[command(name = "run6502")]
#[command(version, about = "Run 6502 programs with emulated BBC Micro / Tube MOS calls")]
struct Args {
    /// Emulate a BBC Micro with sideways ROMs (standalone MOS traps)
    #[arg(short = 'B')]
    bbc: bool,

    /// Emulate a 6502 second processor (Tube client ROM required at F800)
    #[arg(short = 'T')]
    tube: bool,

    /// Command handed to the Tube client at start-up (requires -T)
    #[arg(short = 'c', value_name = "COMMAND")]
    command: Option<String>,

    /// Load FILE raw at hex ADDR
    #[arg(short = 'l', num_args = 2, value_names = ["ADDR", "FILE"])]
    load: Vec<String>,

    /// Load #! interpreter image FILE at hex ADDR
    #[arg(short = 'i', num_args = 2, value_names = ["ADDR", "FILE"])]
    interpreter: Vec<String>,

    /// Save memory from ADDR up to LAST (or +SIZE) to FILE after loading
    #[arg(short = 's', num_args = 3, value_names = ["ADDR", "LAST", "FILE"])]
    save: Vec<String>,

    /// Emulate getchar(3) at ADDR
    #[arg(short = 'G', value_name = "ADDR", value_parser = parse_hex)]
    getchar: Vec<u16>,

    /// Emulate putchar(3) at ADDR
    #[arg(short = 'P', value_name = "ADDR", value_parser = parse_hex)]
    putchar: Vec<u16>,

    /// Map stdin/stdout onto the memory location ADDR
    #[arg(short = 'M', value_name = "ADDR", value_parser = parse_hex)]
    stdio: Vec<u16>,

    /// Terminate emulation when ADDR is called
    #[arg(short = 'X', value_name = "ADDR", value_parser = parse_hex)]
    exit_at: Vec<u16>,

    /// Set IRQ vector
    #[arg(short = 'I', value_name = "ADDR", value_parser = parse_hex)]
    irq: Option<u16>,

    /// Set NMI vector
    #[arg(short = 'N', value_name = "ADDR", value_parser = parse_hex)]
    nmi: Option<u16>,

    /// Set RST vector
    #[arg(short = 'R', value_name = "ADDR", value_parser = parse_hex)]
    reset: Option<u16>,

    /// Write all 64 KiB of memory to run6502.out on exit
    #[arg(short = 'w')]
    write_on_exit: bool,

    /// Exit without running anything
    #[arg(short = 'x')]
    exit_immediately: bool,

    /// Let OSCLI (&FFF7) run host commands in standalone mode
    #[arg(long)]
    oscli: bool,

    /// Read the keyboard key by key (raw terminal mode)
    #[arg(long)]
    raw: bool,

    /// ZIP of ROM images with an optional manifest.json
    #[arg(long, value_name = "ZIP")]
    romset: Option<PathBuf>,

    /// Log every OS call
    #[arg(short, long)]
    trace: bool,

    /// Sideways ROM images, loaded into banks 15 downwards
    #[arg(requires = "bbc")]
    images: Vec<PathBuf>,
}

fn hex_arg(text: &str) -> Result<u16, EmuError> {
    u16::from_str_radix(text, 16).map_err(|_| EmuError::BadAddress(text.to_string()))
}

fn parse_hex(text: &str) -> Result<u16, String> {
    hex_arg(text).map_err(|e| e.to_string())
}

/// `-s` end address: absolute hex, or `+size` relative to the start.
fn parse_save_end(start: u16, text: &str) -> Result<usize, EmuError> {
    match text.strip_prefix('+') {
        Some(size) => Ok(start as usize + hex_arg(size)? as usize),
        None => Ok(hex_arg(text)? as usize),
    }
}

/// Line-buffered console on the process's stdin and stdout.
struct StdioConsole {
    stdin: io::Stdin,
    stdout: io::Stdout,
}

impl StdioConsole {
    fn new() -> Self {
        Self {
            stdin: io::stdin(),
            stdout: io::stdout(),
        }
    }
}

impl HostConsole for StdioConsole {
    fn write(&mut self, ch: u8) {
        let _ = self.stdout.lock().write_all(&[ch]);
    }

    fn flush(&mut self) {
        let _ = self.stdout.flush();
    }

    fn read_line(&mut self, limit: usize) -> Option<Vec<u8>> {
        let mut input = self.stdin.lock();
        if input.fill_buf().map_or(true, |buf| buf.is_empty()) {
            return None;
        }
        let mut line = Vec::new();
        while line.len() < limit {
            let Some(&b) = input.fill_buf().ok().and_then(|buf| buf.first()) else {
                break;
            };
            input.consume(1);
            line.push(b);
            if b == b'\n' {
                break;
            }
        }
        Some(line)
    }

    fn read_char(&mut self) -> Option<u8> {
        let mut byte = [0u8; 1];
        match self.stdin.read(&mut byte) {
            Ok(1) => Some(byte[0]),
            _ => None,
        }
    }

    fn run_command(&mut self, command: &str) {
        run_host_command(command);
    }
}

/// Raw-mode console fed key by key from the terminal reader task.
struct KeyboardConsole {
    /// Receiver for keyboard input
    key_rx: mpsc::Receiver<u8>,
}

impl KeyboardConsole {
    fn new(key_rx: mpsc::Receiver<u8>) -> Self {
        Self { key_rx }
    }

    fn next_key(&mut self) -> Option<u8> {
        match self.key_rx.recv() {
            Ok(END_OF_INPUT_KEY) | Err(_) => None,
            Ok(ch) => Some(ch),
        }
    }
}

impl HostConsole for KeyboardConsole {
    fn write(&mut self, ch: u8) {
        let stdout = io::stdout();
        let mut handle = stdout.lock();

        match ch {
            // Raw mode turns off output post-processing
            0x0A => {
                let _ = handle.write_all(b"\r\n");
            }
            _ => {
                let _ = handle.write_all(&[ch]);
            }
        }
    }

    fn flush(&mut self) {
        let _ = io::stdout().flush();
    }

    /// Read a line with local echo and backspace editing.
    fn read_line(&mut self, limit: usize) -> Option<Vec<u8>> {
        let mut line = Vec::new();
        loop {
            let ch = self.next_key()?;
            match ch {
                0x0D | 0x0A => {
                    if line.len() < limit {
                        line.push(b'\n');
                    }
                    self.write(b'\n');
                    self.flush();
                    return Some(line);
                }
                0x08 | 0x7F => {
                    if line.pop().is_some() {
                        self.write_all(b"\x08 \x08");
                    }
                }
                // Escape ends the line so the guest sees it at once
                0x1B => {
                    if line.len() < limit {
                        line.push(ch);
                    }
                    return Some(line);
                }
                _ if line.len() < limit => {
                    line.push(ch);
                    self.write(ch);
                }
                _ => self.write(0x07),
            }
            self.flush();
        }
    }

    fn read_char(&mut self) -> Option<u8> {
        self.next_key()
    }

    fn run_command(&mut self, command: &str) {
        let _ = disable_raw_mode();
        run_host_command(command);
        let _ = enable_raw_mode();
    }
}

/// Run a command line through the host shell and wait for it.
fn run_host_command(command: &str) {
    debug!("Running host command: {}", command);
    match Command::new("sh").arg("-c").arg(command).status() {
        Ok(status) if !status.success() => warn!("'{}' exited with {}", command, status),
        Ok(_) => {}
        Err(e) => warn!("Failed to run '{}': {}", command, e),
    }
}

/// Translate crossterm key events to the codes a BBC Micro keyboard sends.
fn translate_key(code: KeyCode, modifiers: KeyModifiers) -> Option<u8> {
    // Handle control characters
    if modifiers.contains(KeyModifiers::CONTROL) {
        if let KeyCode::Char(c) = code {
            let upper = c.to_ascii_uppercase();
            if upper.is_ascii_uppercase() {
                return Some(upper as u8 - 64); // Ctrl+A=1, Ctrl+D=4, etc.
            }
        }
    }

    match code {
        KeyCode::Char(c) if c.is_ascii() => Some(c as u8),
        KeyCode::Enter => Some(13),
        KeyCode::Backspace => Some(8),
        KeyCode::Delete => Some(127),
        KeyCode::Tab => Some(9),
        KeyCode::Esc => Some(27),
        // BBC cursor keys in their default editing codes
        KeyCode::Left => Some(136),
        KeyCode::Right => Some(137),
        KeyCode::Down => Some(138),
        KeyCode::Up => Some(139),
        _ => None,
    }
}

/// Everything that has to happen before the guest runs.
fn prepare<C: HostConsole>(emu: &mut BeebEmulator<C>, args: &Args) -> Result<(), EmuError> {
    let mut request = ModeRequest {
        standalone: args.bbc,
        tube: args.tube,
        startup_command: args.command.clone(),
        host_commands: args.oscli,
    };

    if let Some(path) = &args.romset {
        let set = load_romset_from_path(path)?;
        info!(
            "Loaded ROM set: {} ({} images)",
            set.manifest.name,
            set.images.len()
        );
        set.load_into(emu)?;
        set.merge_into(&mut request)?;
    }

    for pair in args.load.chunks(2) {
        let address = hex_arg(&pair[0])?;
        emu.load_at(address, &read_file(&pair[1])?);
    }

    for pair in args.interpreter.chunks(2) {
        let address = hex_arg(&pair[0])?;
        emu.load_interpreter(address, &read_file(&pair[1])?)?;
    }

    for path in &args.images {
        let bank = emu.load_sideways_image(&read_file(path)?)?;
        info!("{} -> bank {}", path.display(), bank);
    }

    for triple in args.save.chunks(3) {
        let start = hex_arg(&triple[0])?;
        let end = parse_save_end(start, &triple[1])?;
        let data = emu.save(start, end.saturating_sub(start as usize));
        std::fs::write(&triple[2], data)?;
    }

    if let Some(address) = args.irq {
        emu.set_vector(Vector::Irq, address);
    }
    if let Some(address) = args.nmi {
        emu.set_vector(Vector::Nmi, address);
    }
    if let Some(address) = args.reset {
        emu.set_vector(Vector::Reset, address);
    }

    for &address in &args.getchar {
        emu.install_trap(TrapKey::Call(address), Service::HostGetChar);
    }
    for &address in &args.putchar {
        emu.install_trap(TrapKey::Call(address), Service::HostPutChar);
    }
    for &address in &args.exit_at {
        emu.install_trap(TrapKey::Call(address), Service::ExitTrap);
    }
    for &address in &args.stdio {
        emu.map_stdio(address);
    }

    emu.select_mode(&request)?;
    Ok(())
}

fn read_file(path: impl AsRef<std::path::Path>) -> Result<Vec<u8>, EmuError> {
    let path = path.as_ref();
    std::fs::read(path).map_err(|e| {
        error!("{}: {}", path.display(), e);
        EmuError::Io(e)
    })
}

/// A lone image argument: `#!` script or raw binary at 0, standalone.
fn prepare_single<C: HostConsole>(emu: &mut BeebEmulator<C>, path: &str) -> Result<(), EmuError> {
    let data = read_file(path)?;
    if emu.load_interpreter(0, &data).is_err() {
        emu.load_at(0, &data);
    }
    emu.select_mode(&ModeRequest {
        standalone: true,
        ..Default::default()
    })?;
    Ok(())
}

/// Set up, run and tidy up after one emulation.
fn emulate<C: HostConsole>(
    console: C,
    args: &Args,
    single: Option<&str>,
) -> Result<ExitInfo, EmuError> {
    let mut emu = BeebEmulator::new(console);
    match single {
        Some(path) => prepare_single(&mut emu, path)?,
        None => prepare(&mut emu, args)?,
    }

    emu.reset();
    let info = emu.run();
    emu.console_mut().flush();

    if args.write_on_exit {
        std::fs::write(EXIT_DUMP, emu.save(0, 0x10000))?;
    }
    Ok(info)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // run6502 FILE with nothing else: load it at 0 and run it standalone
    let argv: Vec<String> = std::env::args().collect();
    let single = match argv.as_slice() {
        [_, only] if !only.starts_with('-') => Some(only.clone()),
        _ => None,
    };
    let args = match single {
        Some(_) => Args::parse_from([argv[0].as_str()]),
        None => Args::parse(),
    };

    let default_level = if args.trace { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    if args.exit_immediately {
        return Ok(());
    }

    let raw = args.raw && enable_raw_mode().is_ok();

    let result = if raw {
        // Create channel for keyboard input
        let (key_tx, key_rx) = mpsc::channel::<u8>();

        // Create shutdown signal
        let (shutdown_tx, mut shutdown_rx) = tokio_mpsc::channel::<()>(1);

        // Spawn emulator in blocking task
        let emu_handle = tokio::task::spawn_blocking(move || {
            emulate(KeyboardConsole::new(key_rx), &args, None)
        });

        // Spawn terminal input reader
        let input_handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        break;
                    }
                    _ = tokio::time::sleep(Duration::from_millis(10)) => {
                        // Poll for terminal events
                        if event::poll(Duration::from_millis(0)).unwrap_or(false) {
                            if let Ok(Event::Key(key_event)) = event::read() {
                                let pressed = key_event.kind != KeyEventKind::Release;
                                let key = translate_key(key_event.code, key_event.modifiers)
                                    .filter(|_| pressed);
                                if let Some(ch) = key {
                                    if key_tx.send(ch).is_err() {
                                        break; // Channel closed
                                    }
                                }
                            }
                        }
                    }
                }
            }
        });

        // Wait for emulator to finish
        let result = emu_handle.await?;

        // Signal input handler to stop
        let _ = shutdown_tx.send(()).await;
        let _ = input_handle.await;

        let _ = disable_raw_mode();
        result
    } else {
        tokio::task::spawn_blocking(move || emulate(StdioConsole::new(), &args, single.as_deref()))
            .await?
    };

    match result {
        Ok(info) => {
            debug!(
                "Exited: {:?} at {:04X} after {} instructions",
                info.reason, info.pc, info.steps
            );
            if !info.reason.is_success() {
                error!("{:?} at {:04X}", info.reason, info.pc);
                std::process::exit(1);
            }
            Ok(())
        }
        Err(e) => {
            eprintln!("run6502: {}", e);
            std::process::exit(1);
        }
    }
}
