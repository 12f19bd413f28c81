//! OSWORD: only A=0, read a line into a guest buffer.

use log::{error, warn};

use super::CallContext;
use crate::console::HostConsole;
use crate::guest::{read_word, write_bytes, CR};
use crate::traps::{Fallback, Flow, Personality};
use crate::ExitReason;

/// The Escape key.
pub const ESCAPE: u8 = 0x1B;

pub(super) fn osword<C: HostConsole>(ctx: &mut CallContext<'_, C>, personality: Personality) -> Flow {
    if ctx.regs.a == 0 {
        return read_line(ctx);
    }

    match personality.fallback() {
        Fallback::Abort => {
            let message = format!("Unsupported OSWORD &{:02X}: {}", ctx.regs.a, ctx.regs.dump());
            error!("{}", message);
            Flow::Exit(ExitReason::Fault(message))
        }
        Fallback::Report => {
            warn!("Unsupported OSWORD &{:02X}: {}", ctx.regs.a, ctx.regs.dump());
            Flow::Return
        }
    }
}

/// OSWORD 0.
///
/// Parameter block at XY: buffer address (2 bytes), maximum length,
/// lowest and highest acceptable character. On exit Y is the number of
/// characters accepted, the buffer holds them followed by CR, and carry
/// is set if Escape ended the input.
fn read_line<C: HostConsole>(ctx: &mut CallContext<'_, C>) -> Flow {
    let block = ctx.regs.yx();
    let buffer = read_word(ctx.memory, block);
    let max_len = ctx.memory[block.wrapping_add(2) as usize];
    let min_char = ctx.memory[block.wrapping_add(3) as usize];
    let max_char = ctx.memory[block.wrapping_add(4) as usize];

    // one byte of the buffer is reserved for the terminator
    let Some(line) = ctx.console.read_line(max_len.saturating_sub(1) as usize) else {
        ctx.console.write(b'\n');
        ctx.console.flush();
        return Flow::Exit(ExitReason::EndOfInput);
    };

    // NUL-terminated like fgets, then judged on what the guest now holds
    write_bytes(ctx.memory, buffer, &line);
    ctx.memory[buffer.wrapping_add(line.len() as u16) as usize] = 0;
    let held: Vec<u8> = (0..max_len as u16)
        .map(|i| ctx.memory[buffer.wrapping_add(i) as usize])
        .collect();
    let (count, escaped) = scan_line(&held, max_len, min_char, max_char);
    ctx.memory[buffer.wrapping_add(count as u16) as usize] = CR;
    ctx.regs.y = count;
    ctx.regs.set_carry(escaped);
    Flow::Return
}

/// Find how much of `line` OSWORD 0 accepts.
///
/// Checks run in a fixed order for each position: Escape first (stops with
/// the escape flag), then the character range and newline (stop), then the
/// length limit. Positions past the end of `line` read as NUL. Returns the
/// accepted count and whether Escape stopped the scan.
pub fn scan_line(line: &[u8], max_len: u8, min_char: u8, max_char: u8) -> (u8, bool) {
    let mut count: u8 = 0;
    while count < max_len {
        let b = line.get(count as usize).copied().unwrap_or(0);
        if b == ESCAPE {
            return (count, true);
        }
        if b < min_char || b > max_char || b == b'\n' {
            break;
        }
        count += 1;
    }
    (count, false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mos::test_support::Rig;
    use crate::traps::Service;

    const BLOCK: u16 = 0x0037;
    const BUFFER: u16 = 0x0700;

    fn rig(input: &[u8], max_len: u8, min_char: u8, max_char: u8) -> Rig {
        let mut rig = Rig::with_input(input);
        write_bytes(
            &mut rig.memory,
            BLOCK,
            &[BUFFER as u8, (BUFFER >> 8) as u8, max_len, min_char, max_char],
        );
        rig.point_at(BLOCK);
        rig.regs.a = 0;
        rig
    }

    #[test]
    fn test_reads_line_into_buffer() {
        let mut rig = rig(b"PRINT 1\n", 0xEE, 0x20, 0xFF);
        rig.regs.set_carry(true);

        let flow = rig.call(Service::LineInput(Personality::Standalone));

        assert_eq!(flow, Flow::Return);
        assert_eq!(rig.regs.y, 7);
        assert!(!rig.regs.carry());
        assert_eq!(&rig.memory[0x700..0x708], b"PRINT 1\r");
    }

    #[test]
    fn test_escape_sets_carry() {
        let mut rig = rig(b"AB\x1bCD\n", 40, 0x20, 0x7E);
        rig.call(Service::LineInput(Personality::Tube));
        assert!(rig.regs.carry());
        assert_eq!(rig.regs.y, 2);
        assert_eq!(&rig.memory[0x700..0x703], b"AB\r");
    }

    #[test]
    fn test_out_of_range_stops_without_carry() {
        let mut rig = rig(b"abcDEF\n", 40, b'a', b'z');
        rig.call(Service::LineInput(Personality::Tube));
        assert!(!rig.regs.carry());
        assert_eq!(rig.regs.y, 3);
        assert_eq!(rig.memory[0x703], CR);
    }

    #[test]
    fn test_long_line_is_cut_at_buffer_size() {
        let mut rig = rig(b"ABCDEFGH\n", 5, 0x20, 0x7E);
        rig.call(Service::LineInput(Personality::Standalone));
        assert_eq!(rig.regs.y, 4);
        assert_eq!(&rig.memory[0x700..0x705], b"ABCD\r");
        // the rest of the line waits for the next read
        assert_eq!(rig.console.pending_input(), 5);
    }

    #[test]
    fn test_stale_buffer_bytes_are_scanned_after_terminator() {
        let mut rig = rig(b"X", 10, 0x00, 0xFF);
        write_bytes(&mut rig.memory, BUFFER, b"ABC\x1bDEF\n");

        rig.call(Service::LineInput(Personality::Standalone));

        // "X", the NUL terminator and the old 'C' pass; the old escape stops it
        assert_eq!(rig.regs.y, 3);
        assert!(rig.regs.carry());
        assert_eq!(&rig.memory[0x700..0x704], b"X\0C\r");
        let accepted = &rig.memory[0x700..0x700 + rig.regs.y as usize];
        assert!(!accepted.contains(&ESCAPE));
        assert!(!accepted.contains(&b'\n'));
    }

    #[test]
    fn test_terminator_stops_scan_when_nul_is_out_of_range() {
        let mut rig = rig(b"HI", 10, 0x20, 0x7E);
        write_bytes(&mut rig.memory, BUFFER, b"OLDTEXT");

        rig.call(Service::LineInput(Personality::Tube));

        assert_eq!(rig.regs.y, 2);
        assert!(!rig.regs.carry());
        assert_eq!(&rig.memory[0x700..0x703], b"HI\r");
    }

    #[test]
    fn test_end_of_input_exits_cleanly() {
        let mut rig = rig(b"", 40, 0x20, 0x7E);
        let flow = rig.call(Service::LineInput(Personality::Standalone));
        assert_eq!(flow, Flow::Exit(ExitReason::EndOfInput));
        assert_eq!(rig.console.output(), b"\n");
    }

    #[test]
    fn test_other_osword_aborts_standalone() {
        let mut rig = rig(b"", 40, 0x20, 0x7E);
        rig.regs.a = 1;
        let flow = rig.call(Service::LineInput(Personality::Standalone));
        assert!(matches!(flow, Flow::Exit(ExitReason::Fault(msg)) if msg.contains("OSWORD &01")));
    }

    #[test]
    fn test_other_osword_is_reported_in_tube() {
        let mut rig = rig(b"X\n", 40, 0x20, 0x7E);
        rig.regs.a = 7;
        let before = rig.regs;
        let flow = rig.call(Service::LineInput(Personality::Tube));
        assert_eq!(flow, Flow::Return);
        assert_eq!(rig.regs, before);
        assert_eq!(rig.console.pending_input(), 2);
    }

    #[test]
    fn test_scan_order_escape_beats_length() {
        // escape exactly at the last permitted position still counts
        assert_eq!(scan_line(b"AB\x1b", 3, 0x20, 0x7E), (2, true));
        // escape beyond the limit is never seen
        assert_eq!(scan_line(b"ABC\x1b", 3, 0x20, 0x7E), (3, false));
    }

    #[test]
    fn test_scan_escape_beats_range() {
        // escape is below the minimum but is still reported as escape
        assert_eq!(scan_line(b"\x1b", 10, 0x20, 0x7E), (0, true));
        // a range violation before the escape stops first
        assert_eq!(scan_line(b"A\x01\x1b", 10, 0x20, 0x7E), (1, false));
    }

    #[test]
    fn test_scan_properties() {
        let lines: [&[u8]; 6] = [
            b"HELLO\n",
            b"\n",
            b"lower UPPER\n",
            b"tab\there\n",
            b"\xff\xfe\n",
            b"a\x1bb\n",
        ];
        for line in lines {
            for max_len in [0u8, 1, 3, 10, 255] {
                for (lo, hi) in [(0x20, 0x7E), (b'A', b'Z'), (0, 0xFF)] {
                    let (count, escaped) = scan_line(line, max_len, lo, hi);
                    assert!(count <= max_len);
                    let accepted = &line[..(count as usize).min(line.len())];
                    assert!(accepted.iter().all(|&b| b >= lo && b <= hi));
                    assert!(!accepted.contains(&ESCAPE));
                    assert!(!accepted.contains(&b'\n'));
                    assert!(!accepted.contains(&CR) || (lo..=hi).contains(&CR));
                    if escaped {
                        assert_eq!(line.get(count as usize), Some(&ESCAPE));
                    }
                }
            }
        }
    }
}
