//! OSBYTE: the handful of calls language ROMs make at start-up.

use log::{error, warn};

use super::{addr, CallContext};
use crate::console::HostConsole;
use crate::guest::{write_bytes, CR};
use crate::traps::{Fallback, Flow, Personality};
use crate::ExitReason;

/// OSBYTE numbers with an emulation.
pub mod number {
    /// Perform keyboard scan.
    pub const KEYBOARD_SCAN: u8 = 0x7A;
    /// Acknowledge escape condition.
    pub const ACK_ESCAPE: u8 = 0x7E;
    /// Read machine high order address.
    pub const HIGH_ORDER_ADDRESS: u8 = 0x82;
    /// Read OSHWM (top of OS workspace).
    pub const READ_OSHWM: u8 = 0x83;
    /// Read bottom of display RAM (HIMEM).
    pub const READ_HIMEM: u8 = 0x84;
    /// Cassette motor control.
    pub const MOTOR_CONTROL: u8 = 0x89;
    /// Read/write number of items in the VDU queue.
    pub const VDU_QUEUE: u8 = 0xDA;
    /// Tube host request (start-up command handshake).
    pub const TUBE_HOST: u8 = 0xA3;
}

/// X value of the Tube host OSBYTE &A3 calls.
const TUBE_HOST_X: u8 = 243;

pub(super) fn osbyte<C: HostConsole>(ctx: &mut CallContext<'_, C>, personality: Personality) -> Flow {
    let a = ctx.regs.a;
    match a {
        number::KEYBOARD_SCAN => ctx.regs.x = 0x00,
        number::ACK_ESCAPE => ctx.regs.x = 0x00,
        number::HIGH_ORDER_ADDRESS => {
            ctx.regs.x = 0x00;
            ctx.regs.y = 0x00;
        }
        number::READ_OSHWM => {
            ctx.regs.x = 0x00;
            ctx.regs.y = 0x0E;
        }
        number::READ_HIMEM => {
            ctx.regs.x = 0x00;
            ctx.regs.y = 0x80;
        }
        number::MOTOR_CONTROL => {}
        number::VDU_QUEUE => ctx.regs.x = 0x00,
        number::TUBE_HOST if personality == Personality::Tube && tube_host(ctx) => {}
        _ => return unsupported(ctx, personality),
    }
    Flow::Return
}

/// OSBYTE &A3,243: the Tube client asking the host about itself.
///
/// With Y=6 the client wants a `*` command to run at start-up; it is
/// copied to 0x0800 followed by CR and its address returned in XY.
/// Returns false for forms with no emulation.
fn tube_host<C: HostConsole>(ctx: &mut CallContext<'_, C>) -> bool {
    if ctx.regs.x != TUBE_HOST_X {
        return false;
    }
    match ctx.regs.y {
        6 => {
            match ctx.startup_command {
                Some(command) => {
                    write_bytes(ctx.memory, addr::TUBE_COMMAND, command.as_bytes());
                    let end = addr::TUBE_COMMAND.wrapping_add(command.len() as u16);
                    ctx.memory[end as usize] = CR;
                    let [lo, hi] = addr::TUBE_COMMAND.to_le_bytes();
                    ctx.regs.x = lo;
                    ctx.regs.y = hi;
                }
                None => ctx.regs.y = 0,
            }
            true
        }
        4 => {
            ctx.regs.y = 0;
            true
        }
        _ => false,
    }
}

fn unsupported<C: HostConsole>(ctx: &mut CallContext<'_, C>, personality: Personality) -> Flow {
    match personality.fallback() {
        Fallback::Abort => {
            let message = format!("Unsupported OSBYTE &{:02X}: {}", ctx.regs.a, ctx.regs.dump());
            error!("{}", message);
            Flow::Exit(ExitReason::Fault(message))
        }
        Fallback::Report => {
            warn!("Unsupported OSBYTE &{:02X}: {}", ctx.regs.a, ctx.regs.dump());
            ctx.regs.x = 0xFF;
            Flow::Return
        }
    }
}
