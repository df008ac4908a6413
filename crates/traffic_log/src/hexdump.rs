//! Canonical hexdump rendering, shared by the hexdump sink and the status display.

use chrono::{DateTime, Local};
use contracts::PeerAddr;
use std::fmt::Write;

const BYTES_PER_LINE: usize = 16;

/// Render one chunk as a header line followed by tab-indented hexdump lines.
///
/// ```text
/// 2024-01-31 12:00:00.123 127.0.0.1:5000:
/// 	00000000  68 65 6c 6c 6f                                    |hello|
/// ```
pub fn format_block(time: DateTime<Local>, peer: &PeerAddr, data: &[u8]) -> String {
    let mut out = format!("{} {}:\n", time.format("%Y-%m-%d %H:%M:%S%.3f"), peer);
    for line in hexdump_lines(data) {
        out.push('\t');
        out.push_str(&line);
        out.push('\n');
    }
    out
}

/// `hexdump -C` style lines: offset, sixteen hex bytes split in two groups, ASCII gutter
pub fn hexdump_lines(data: &[u8]) -> Vec<String> {
    data.chunks(BYTES_PER_LINE)
        .enumerate()
        .map(|(idx, chunk)| format_line(idx * BYTES_PER_LINE, chunk))
        .collect()
}

fn format_line(offset: usize, chunk: &[u8]) -> String {
    let mut line = String::with_capacity(80);
    let _ = write!(line, "{offset:08x}  ");

    for slot in 0..BYTES_PER_LINE {
        match chunk.get(slot) {
            Some(byte) => {
                let _ = write!(line, "{byte:02x} ");
            }
            None => line.push_str("   "),
        }
        if slot == 7 {
            line.push(' ');
        }
    }

    line.push_str(" |");
    line.extend(chunk.iter().map(|&b| {
        if b.is_ascii_graphic() || b == b' ' {
            b as char
        } else {
            '.'
        }
    }));
    line.push('|');
    line
}
