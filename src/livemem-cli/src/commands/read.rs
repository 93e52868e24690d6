//! One-shot memory read

use crate::display::{hex_dump, parse_address};
use anyhow::{Context, Result};
use livemem::RemoteReader;

/// Handle the Read command
///
/// Reads bytes straight from the target and displays them as a hex dump.
pub fn handle(source: &dyn RemoteReader, address: &str, size: usize) -> Result<()> {
    print!("{}", render(source, address, size)?);
    Ok(())
}

fn render(source: &dyn RemoteReader, address: &str, size: usize) -> Result<String> {
    let addr = parse_address(address)?;
    let data = source
        .read_bytes(addr, size)
        .with_context(|| format!("Failed to read {} bytes at {:#x}", size, addr))?;

    Ok(format!(
        "Reading {} bytes at {:#x}:\n{}",
        size,
        addr,
        hex_dump(addr, &data)
    ))
}
