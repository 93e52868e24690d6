//! Live block watcher
//!
//! Registers one block per address, lets the background loop keep them fresh, and redraws
//! them on every display tick.

use crate::display::hex_dump;
use anyhow::{Context, Result};
use livemem::{LiveMemory, LiveMemoryConfig, RemoteReader};
use std::fmt::Write;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct WatchOptions {
    pub addresses: Vec<u64>,
    pub size: usize,
    /// 0 = run until killed
    pub ticks: u64,
    pub display_interval: Duration,
    pub json: bool,
}

/// Handle the Watch command
pub fn handle(
    source: Arc<dyn RemoteReader>,
    cache: LiveMemoryConfig,
    options: &WatchOptions,
) -> Result<()> {
    let live = LiveMemory::new(source, cache).context("Invalid cache configuration")?;
    for &address in &options.addresses {
        live.get_or_create(address, options.size)
            .with_context(|| format!("Failed to register block at {:#x}", address))?;
    }

    live.start_background_refresh()
        .context("Failed to start refresh loop")?;
    tracing::info!(
        "Watching {} block(s) of {} bytes",
        options.addresses.len(),
        options.size
    );

    let mut tick = 0;
    while options.ticks == 0 || tick < options.ticks {
        thread::sleep(options.display_interval);
        print!("{}", render_tick(&live, options)?);
        tick += 1;
    }

    live.stop_background_refresh();
    let stats = live.stats();
    eprintln!(
        "{} refresh cycles, {} block reads, {} failed ({} timed out)",
        stats.cycles, stats.refreshed, stats.failed, stats.timed_out
    );

    Ok(())
}

/// Render every watched block once
fn render_tick(live: &LiveMemory, options: &WatchOptions) -> Result<String> {
    let mut out = String::new();

    for &address in &options.addresses {
        let Some(snapshot) = live.peek(address) else {
            // Evicted by the retention policy between ticks
            live.get_or_create(address, options.size)?;
            writeln!(out, "{:#x}: re-registered", address)?;
            continue;
        };

        if options.json {
            writeln!(out, "{}", serde_json::to_string(&snapshot)?)?;
        } else {
            let status = live.describe(address).unwrap_or_default();
            writeln!(out, "{:#x} ({})", address, status)?;
            out.push_str(&hex_dump(address, &snapshot.data));
        }
    }

    Ok(out)
}
