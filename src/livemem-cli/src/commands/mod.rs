//! Command handlers for livemem CLI

pub mod configure;
pub mod read;
pub mod watch;

use crate::cli::TargetArgs;
use crate::config::Config;
use anyhow::{bail, Context, Result};
use livemem::ProcessSource;

/// Attach to the process named by `--pid`, `--name`, or the configured default
pub fn attach(target: &TargetArgs, config: &Config) -> Result<ProcessSource> {
    if let Some(pid) = target.pid {
        return ProcessSource::attach(pid)
            .with_context(|| format!("Failed to attach to PID {}. Try running with sudo.", pid));
    }

    let Some(name) = target.name.as_deref().or(config.get_default_process()) else {
        bail!("No target process. Pass --pid or --name, or run `livemem configure --process NAME`");
    };

    let source = ProcessSource::attach_by_name(name)
        .with_context(|| format!("Failed to attach to process {:?}", name))?;
    eprintln!("Attached to {} (PID {})", name, source.pid());
    Ok(source)
}
