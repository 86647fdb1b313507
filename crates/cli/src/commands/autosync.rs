//! Auto-sync settings.

use anyhow::{bail, Result};

use super::{style, CliContext};

pub fn run_auto_sync(
    ctx: &CliContext,
    id: i64,
    interval: Option<u32>,
    disable: bool,
) -> Result<()> {
    let repo = ctx.require_repository(id)?;

    if disable {
        ctx.db.set_auto_sync(id, false, repo.sync_interval_minutes)?;
        println!("{}", style::success(&format!("Auto-sync disabled for '{}'", repo.name)));
        return Ok(());
    }

    let Some(minutes) = interval else {
        bail!("pass --interval <minutes> to enable auto-sync, or --disable to turn it off");
    };
    if minutes == 0 {
        bail!("interval must be at least 1 minute");
    }

    ctx.db.set_auto_sync(id, true, minutes)?;
    println!(
        "{}",
        style::success(&format!(
            "Auto-sync for '{}' every {} min (picked up by the daemon)",
            repo.name, minutes
        ))
    );
    Ok(())
}
