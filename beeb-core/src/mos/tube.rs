//! Tube client lifecycle calls and the exit debug trap.

use log::error;

use super::CallContext;
use crate::console::HostConsole;
use crate::traps::Flow;
use crate::ExitReason;

pub(super) fn quit<C: HostConsole>(ctx: &mut CallContext<'_, C>) -> Flow {
    ctx.console.flush();
    Flow::Exit(ExitReason::Quit)
}

/// Picking a language ROM for the client is not emulated.
pub(super) fn enter_language<C: HostConsole>(ctx: &mut CallContext<'_, C>) -> Flow {
    let message = format!("Unsupported enter language call: {}", ctx.regs.dump());
    error!("{}", message);
    Flow::Exit(ExitReason::Fault(message))
}

pub(super) fn exit_trap<C: HostConsole>(ctx: &mut CallContext<'_, C>) -> Flow {
    ctx.console.flush();
    Flow::Exit(ExitReason::ExitTrap)
}
