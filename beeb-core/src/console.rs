//! Host console abstraction for the MOS emulator.
//!
//! The `HostConsole` trait is everything the OS call handlers need from
//! the host process: a byte output stream, a blocking input stream and a
//! command interpreter. `HeadlessConsole` implements it in memory for tests.

use std::collections::VecDeque;

/// Host-side services consumed by the OS call handlers.
pub trait HostConsole: Send {
    /// Write one byte to the host output stream.
    fn write(&mut self, ch: u8);

    /// Write a run of bytes to the host output stream.
    fn write_all(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.write(b);
        }
    }

    /// Push buffered output to the host.
    fn flush(&mut self) {}

    /// Read one line of at most `limit` bytes, blocking.
    ///
    /// The trailing newline is included when it fits. Bytes past `limit`
    /// stay in the stream for the next read. Returns `None` once the input
    /// stream is exhausted.
    fn read_line(&mut self, limit: usize) -> Option<Vec<u8>>;

    /// Read a single byte, blocking. Returns `None` at end of stream.
    fn read_char(&mut self) -> Option<u8>;

    /// Hand a command line to the host command interpreter and wait for it.
    fn run_command(&mut self, command: &str);
}

/// Headless console for testing - captures output, provides queued input.
#[derive(Default)]
pub struct HeadlessConsole {
    output: Vec<u8>,
    input: VecDeque<u8>,
    commands: Vec<String>,
    flushes: usize,
}

impl HeadlessConsole {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with pre-queued input.
    pub fn with_input(input: &[u8]) -> Self {
        Self {
            input: input.iter().copied().collect(),
            ..Self::default()
        }
    }

    /// Queue input bytes.
    pub fn queue_input(&mut self, input: &[u8]) {
        self.input.extend(input.iter().copied());
    }

    /// Get all output as bytes.
    pub fn output(&self) -> &[u8] {
        &self.output
    }

    /// Get output as string (lossy UTF-8 conversion).
    pub fn output_string(&self) -> String {
        String::from_utf8_lossy(&self.output).into_owned()
    }

    /// Commands passed to the host interpreter, oldest first.
    pub fn commands(&self) -> &[String] {
        &self.commands
    }

    /// Number of flushes requested so far.
    pub fn flushes(&self) -> usize {
        self.flushes
    }

    /// Input bytes not yet consumed.
    pub fn pending_input(&self) -> usize {
        self.input.len()
    }
}

impl HostConsole for HeadlessConsole {
    fn write(&mut self, ch: u8) {
        self.output.push(ch);
    }

    fn flush(&mut self) {
        self.flushes += 1;
    }

    fn read_line(&mut self, limit: usize) -> Option<Vec<u8>> {
        if self.input.is_empty() {
            return None;
        }
        let mut line = Vec::new();
        while line.len() < limit {
            match self.input.pop_front() {
                Some(b) => {
                    line.push(b);
                    if b == b'\n' {
                        break;
                    }
                }
                None => break,
            }
        }
        Some(line)
    }

    fn read_char(&mut self) -> Option<u8> {
        self.input.pop_front()
    }

    fn run_command(&mut self, command: &str) {
        self.commands.push(command.to_string());
    }
}
