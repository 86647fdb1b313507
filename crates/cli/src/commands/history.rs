//! Formatted sync history for one vault.

use anyhow::Result;

use super::{format_last_sync, style, CliContext};

pub fn run_history(ctx: &CliContext, id: i64) -> Result<()> {
    let repo = ctx.require_repository(id)?;
    let records = ctx.db.recent_sync_records(id)?;

    if records.is_empty() {
        println!("No sync history for '{}'.", repo.name);
        return Ok(());
    }

    println!();
    println!("{}", style::header(&format!("Sync history for '{}'", repo.name)));
    println!();

    for record in &records {
        println!(
            "  {}  {:<5}  {:>6}  {}",
            style::dim(&format_last_sync(record.timestamp)),
            style::action_label(&record.action.to_string()),
            style::outcome_marker(record.success),
            record.message
        );
    }

    println!();
    Ok(())
}
