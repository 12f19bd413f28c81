//! Character I/O: OSWRCH, OSRDCH and the getchar/putchar debug traps.

use super::CallContext;
use crate::console::HostConsole;
use crate::traps::Flow;
use crate::ExitReason;

/// VDU 12 (CLS) becomes an ANSI clear-screen and home.
pub const CLEAR_SCREEN: &[u8] = b"\x1b[2J\x1b[H";

const VDU_CLS: u8 = 0x0C;

pub(super) fn oswrch<C: HostConsole>(ctx: &mut CallContext<'_, C>) -> Flow {
    match ctx.regs.a {
        VDU_CLS => ctx.console.write_all(CLEAR_SCREEN),
        ch => ctx.console.write(ch),
    }
    ctx.console.flush();
    Flow::Return
}

pub(super) fn osrdch<C: HostConsole>(ctx: &mut CallContext<'_, C>) -> Flow {
    match ctx.console.read_char() {
        Some(ch) => {
            ctx.regs.a = ch;
            Flow::Return
        }
        None => Flow::Exit(ExitReason::EndOfInput),
    }
}

pub(super) fn get_char<C: HostConsole>(ctx: &mut CallContext<'_, C>) -> Flow {
    ctx.regs.a = ctx.console.read_char().unwrap_or(0xFF);
    Flow::Return
}

pub(super) fn put_char<C: HostConsole>(ctx: &mut CallContext<'_, C>) -> Flow {
    ctx.console.write(ctx.regs.a);
    ctx.console.flush();
    Flow::Return
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mos::test_support::Rig;
    use crate::traps::Service;

    #[test]
    fn test_oswrch_passes_bytes_through() {
        let mut rig = Rig::new();
        for &ch in b"HI\r\n\x07" {
            rig.regs.a = ch;
            assert_eq!(rig.call(Service::ConsoleOut), Flow::Return);
        }
        assert_eq!(rig.console.output(), b"HI\r\n\x07");
        assert_eq!(rig.console.flushes(), 5);
    }

    #[test]
    fn test_oswrch_clear_screen() {
        let mut rig = Rig::new();
        rig.regs.a = 0x0C;
        rig.call(Service::ConsoleOut);
        assert_eq!(rig.console.output(), b"\x1b[2J\x1b[H");
    }

    #[test]
    fn test_osrdch() {
        let mut rig = Rig::with_input(b"Y");
        assert_eq!(rig.call(Service::ConsoleIn), Flow::Return);
        assert_eq!(rig.regs.a, b'Y');
        assert_eq!(
            rig.call(Service::ConsoleIn),
            Flow::Exit(ExitReason::EndOfInput)
        );
    }

    #[test]
    fn test_debug_get_and_put() {
        let mut rig = Rig::with_input(b"k");
        rig.call(Service::HostGetChar);
        assert_eq!(rig.regs.a, b'k');
        rig.call(Service::HostGetChar);
        assert_eq!(rig.regs.a, 0xFF);

        rig.regs.a = b'!';
        rig.call(Service::HostPutChar);
        assert_eq!(rig.console.output(), b"!");
    }
}
