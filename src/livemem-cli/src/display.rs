//! Address parsing and hex dump formatting

use anyhow::{Context, Result};
use std::fmt::Write;

/// Parse a hex or decimal address string
pub fn parse_address(address: &str) -> Result<u64> {
    if let Some(hex) = address
        .strip_prefix("0x")
        .or_else(|| address.strip_prefix("0X"))
    {
        u64::from_str_radix(hex, 16)
            .with_context(|| format!("Invalid hex address: {}", address))
    } else {
        address
            .parse::<u64>()
            .with_context(|| format!("Invalid address: {}", address))
    }
}

/// Format bytes as a 16-column hex dump with an ASCII gutter
pub fn hex_dump(address: u64, data: &[u8]) -> String {
    let mut out = String::new();

    for (i, chunk) in data.chunks(16).enumerate() {
        let _ = write!(out, "{:08x}  ", address.wrapping_add(i as u64 * 16));
        for j in 0..16 {
            match chunk.get(j) {
                Some(byte) => {
                    let _ = write!(out, "{:02x} ", byte);
                }
                // Pad if last line is short
                None => out.push_str("   "),
            }
            if j == 7 {
                out.push(' ');
            }
        }
        out.push_str(" |");
        for byte in chunk {
            let c = *byte as char;
            if c.is_ascii_graphic() || c == ' ' {
                out.push(c);
            } else {
                out.push('.');
            }
        }
        out.push_str("|\n");
    }

    out
}
