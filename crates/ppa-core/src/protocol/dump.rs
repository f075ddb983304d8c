//! Hex dump rendering for captured datagrams.

use std::fmt::Write;

const BYTES_PER_LINE: usize = 16;

/// Render `data` as offset, hex bytes and printable ASCII, 16 bytes per line.
///
/// ```text
/// 00000000  00 01 01 00 00 00 00 00  01 00 ff 00              |............|
/// ```
pub fn hexdump(data: &[u8]) -> String {
    let mut out = String::with_capacity(data.len() * 4 + 16);

    for (line, chunk) in data.chunks(BYTES_PER_LINE).enumerate() {
        let _ = write!(out, "{:08x}  ", line * BYTES_PER_LINE);

        for i in 0..BYTES_PER_LINE {
            match chunk.get(i) {
                Some(b) => {
                    let _ = write!(out, "{:02x} ", b);
                }
                None => out.push_str("   "),
            }
            if i == 7 {
                out.push(' ');
            }
        }

        out.push_str(" |");
        out.extend(chunk.iter().map(|&b| {
            if b.is_ascii_graphic() || b == b' ' {
                b as char
            } else {
                '.'
            }
        }));
        out.push_str("|\n");
    }

    out
}
