//! Error types for the MOS emulator.

use thiserror::Error;

/// Errors that stop the emulator from starting or running.
///
/// Guest-visible failures (a file that will not open, an unsupported
/// OSBYTE in Tube mode) are not errors here: they are reported to the
/// guest through its registers and the run continues.
#[derive(Error, Debug)]
pub enum EmuError {
    #[error("-B and -T are incompatible")]
    IncompatibleModes,

    #[error("-c is only valid with -T")]
    CommandWithoutTube,

    #[error("-T requires Tube emulation ROM to be loaded")]
    TubeRomMissing,

    #[error("too many images")]
    TooManyImages,

    #[error("Invalid bank: {0}")]
    BadBank(u8),

    #[error("bad hex number: {0}")]
    BadAddress(String),

    #[error("Not an interpreter image (missing #! header)")]
    NotInterpreter,

    #[error("ROM set error: {0}")]
    RomSet(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for emulator operations.
pub type EmuResult<T> = Result<T, EmuError>;
