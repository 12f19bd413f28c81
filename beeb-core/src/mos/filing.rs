//! OSFIND and OSBGET against host files.

use std::path::PathBuf;

use log::{debug, warn};

use super::CallContext;
use crate::console::HostConsole;
use crate::files::OpenMode;
use crate::guest::read_cr_bytes;
use crate::traps::Flow;

/// OSFIND A=0: close the file in Y, or every file if Y=0.
const CLOSE: u8 = 0x00;

pub(super) fn osfind<C: HostConsole>(ctx: &mut CallContext<'_, C>) -> Flow {
    let a = ctx.regs.a;
    if a == CLOSE {
        close(ctx);
        return Flow::Return;
    }

    match OpenMode::from_osfind(a) {
        Some(mode) => open(ctx, mode),
        None => {
            warn!("Unsupported OSFIND &{:02X}: {}", a, ctx.regs.dump());
            ctx.regs.a = 0;
        }
    }
    Flow::Return
}

/// Open the file named at XY. A = handle, or 0 on any failure.
fn open<C: HostConsole>(ctx: &mut CallContext<'_, C>, mode: OpenMode) {
    let path = host_path(read_cr_bytes(ctx.memory, ctx.regs.yx(), false));
    match ctx.files.open(&path, mode) {
        Ok(handle) => {
            debug!("[MOS] OSFIND {:?} '{}' -> {}", mode, path.display(), handle);
            ctx.regs.a = handle;
        }
        Err(e) => {
            debug!("[MOS] OSFIND {:?} '{}' failed: {}", mode, path.display(), e);
            ctx.regs.a = 0;
        }
    }
}

/// Host path for a guest file name, byte for byte where the host allows.
#[cfg(unix)]
fn host_path(name: Vec<u8>) -> PathBuf {
    use std::ffi::OsString;
    use std::os::unix::ffi::OsStringExt;
    PathBuf::from(OsString::from_vec(name))
}

#[cfg(not(unix))]
fn host_path(name: Vec<u8>) -> PathBuf {
    PathBuf::from(name.into_iter().map(char::from).collect::<String>())
}

fn close<C: HostConsole>(ctx: &mut CallContext<'_, C>) {
    let handle = ctx.regs.y;
    if handle == 0 {
        let closed = ctx.files.close_all();
        debug!("[MOS] OSFIND close all: {} closed", closed);
    } else if !ctx.files.close(handle) {
        debug!("[MOS] OSFIND close of unbound handle {}", handle);
    }
}

/// Read a byte from the file in Y. Carry set on end of file or a bad
/// handle, in which case A is left alone.
pub(super) fn osbget<C: HostConsole>(ctx: &mut CallContext<'_, C>) -> Flow {
    match ctx.files.read_byte(ctx.regs.y) {
        Some(byte) => {
            ctx.regs.a = byte;
            ctx.regs.set_carry(false);
        }
        None => ctx.regs.set_carry(true),
    }
    Flow::Return
}
