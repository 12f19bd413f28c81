//! OSCLI: `*` commands.

use log::{debug, warn};

use super::{addr, CallContext, ERR_BAD_COMMAND};
use crate::console::HostConsole;
use crate::guest::{read_cr_string, write_bytes, Memory};
use crate::traps::{Flow, Personality};

pub(super) fn oscli<C: HostConsole>(ctx: &mut CallContext<'_, C>, personality: Personality) -> Flow {
    if personality.runs_host_commands() {
        let command = read_cr_string(ctx.memory, ctx.regs.yx(), true);
        debug!("[MOS] OSCLI to host: '{}'", command);
        ctx.console.flush();
        ctx.console.run_command(&command);
        return Flow::Return;
    }

    // A second processor never gets to run host commands; the client sees
    // an ordinary MOS error through its own BRK handler.
    let command = read_cr_string(ctx.memory, ctx.regs.yx(), false);
    warn!("OSCLI not supported: '{}'", command);
    write_error(ctx.memory, ERR_BAD_COMMAND, "Bad command");
    Flow::Jump(addr::ERROR_BLOCK)
}

/// Build a MOS error block at 0x0100: BRK, error number, message, NUL.
///
/// Resuming at 0x0100 executes the BRK and enters the guest's error
/// handler with the block in place.
pub fn write_error(memory: &mut Memory, number: u8, message: &str) {
    let block = addr::ERROR_BLOCK;
    memory[block as usize] = 0x00;
    memory[block as usize + 1] = number;
    write_bytes(memory, block + 2, message.as_bytes());
    memory[block as usize + 2 + message.len()] = 0x00;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mos::test_support::Rig;
    use crate::traps::Service;

    fn rig_with_command(text: &[u8]) -> Rig {
        let mut rig = Rig::new();
        write_bytes(&mut rig.memory, 0x0700, text);
        rig.point_at(0x0700);
        rig
    }

    #[test]
    fn test_tube_reports_bad_command() {
        let mut rig = rig_with_command(b"*BASIC\r");

        let flow = rig.call(Service::CommandExec(Personality::Tube));

        assert_eq!(flow, Flow::Jump(0x0100));
        assert_eq!(rig.memory[0x100], 0x00);
        assert_eq!(rig.memory[0x101], 254);
        assert_eq!(&rig.memory[0x102..0x10E], b"Bad command\0");
        assert!(rig.console.commands().is_empty());
    }

    #[test]
    fn test_standalone_runs_host_command() {
        let mut rig = rig_with_command(b"*BASIC\r");

        let flow = rig.call(Service::CommandExec(Personality::Standalone));

        assert_eq!(flow, Flow::Return);
        assert_eq!(rig.console.commands(), ["BASIC"]);
    }

    #[test]
    fn test_standalone_strips_stars_and_spaces() {
        let mut rig = rig_with_command(b" * *  ls -l\r");
        rig.call(Service::CommandExec(Personality::Standalone));
        assert_eq!(rig.console.commands(), ["ls -l"]);
    }
}
