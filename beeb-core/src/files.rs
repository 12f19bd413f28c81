//! Guest file handles backed by host files.
//!
//! Handles are the small integers OSFIND hands back to the guest. Handle 0
//! is never allocated; it means "all files" to OSFIND close.

use std::fs::{File, OpenOptions};
use std::io::{self, Read};
use std::path::Path;

use thiserror::Error;

/// Highest handle the table will allocate.
pub const MAX_HANDLE: u8 = 255;

/// Host file mode selected by the OSFIND A register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// &40: open for input (binary read).
    Read,
    /// &80: open for output (binary write, truncating).
    Write,
    /// &C0: open for update (binary read/write of an existing file).
    Update,
}

impl OpenMode {
    /// Map an OSFIND sub-function to a mode. `None` for anything but
    /// &40, &80 and &C0.
    pub fn from_osfind(a: u8) -> Option<Self> {
        match a {
            0x40 => Some(Self::Read),
            0x80 => Some(Self::Write),
            0xC0 => Some(Self::Update),
            _ => None,
        }
    }

    fn open(self, path: &Path) -> io::Result<File> {
        match self {
            Self::Read => File::open(path),
            Self::Write => File::create(path),
            Self::Update => OpenOptions::new().read(true).write(true).open(path),
        }
    }
}

/// Why an open did not produce a handle.
#[derive(Error, Debug)]
pub enum OpenError {
    #[error("no free file handles")]
    NoFreeHandle,

    #[error("{0}")]
    Host(#[from] io::Error),
}

/// Table mapping guest handles 1..=255 to open host files.
pub struct FileTable {
    slots: Vec<Option<File>>,
}

impl Default for FileTable {
    fn default() -> Self {
        Self::new()
    }
}

impl FileTable {
    pub fn new() -> Self {
        let mut slots = Vec::with_capacity(MAX_HANDLE as usize + 1);
        slots.resize_with(MAX_HANDLE as usize + 1, || None);
        Self { slots }
    }

    /// Lowest unbound handle, if any.
    pub fn free_handle(&self) -> Option<u8> {
        (1..=MAX_HANDLE).find(|&h| self.slots[h as usize].is_none())
    }

    /// Open a host file and bind it to the lowest free handle.
    ///
    /// A handle is only claimed once the host open has succeeded.
    pub fn open(&mut self, path: impl AsRef<Path>, mode: OpenMode) -> Result<u8, OpenError> {
        let handle = self.free_handle().ok_or(OpenError::NoFreeHandle)?;
        let file = mode.open(path.as_ref())?;
        self.slots[handle as usize] = Some(file);
        Ok(handle)
    }

    /// Whether `handle` is currently bound.
    pub fn is_open(&self, handle: u8) -> bool {
        handle != 0 && self.slots[handle as usize].is_some()
    }

    /// Read one byte. `None` if the handle is unbound, at end of file, or
    /// the host read failed.
    pub fn read_byte(&mut self, handle: u8) -> Option<u8> {
        if handle == 0 {
            return None;
        }
        let file = self.slots[handle as usize].as_mut()?;
        let mut byte = [0u8; 1];
        match file.read(&mut byte) {
            Ok(1) => Some(byte[0]),
            _ => None,
        }
    }

    /// Close and unbind a handle. Returns false if it was not bound.
    pub fn close(&mut self, handle: u8) -> bool {
        if handle == 0 {
            return false;
        }
        self.slots[handle as usize].take().is_some()
    }

    /// Close every bound handle, lowest first. Returns how many were open.
    pub fn close_all(&mut self) -> usize {
        let mut closed = 0;
        for slot in self.slots.iter_mut().skip(1) {
            if slot.take().is_some() {
                closed += 1;
            }
        }
        closed
    }

    /// Number of bound handles.
    pub fn open_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }
}
