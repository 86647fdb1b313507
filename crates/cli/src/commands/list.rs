//! Tabular listing of registered vaults.

use anyhow::Result;
use comfy_table::{presets::UTF8_FULL, Cell, Table};

use super::{format_last_sync, CliContext};

pub fn run_list(ctx: &CliContext) -> Result<()> {
    let repos = ctx.db.list_repositories()?;
    if repos.is_empty() {
        println!("No repositories registered. Use `vaultsync clone` to add one.");
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(["ID", "Name", "Provider", "Path", "Auto", "Interval", "Last sync"]);
    for repo in &repos {
        table.add_row([
            Cell::new(repo.id),
            Cell::new(&repo.name),
            Cell::new(repo.provider),
            Cell::new(repo.local_path.display()),
            Cell::new(if repo.auto_sync { "on" } else { "off" }),
            Cell::new(format!("{} min", repo.sync_interval_minutes)),
            Cell::new(format_last_sync(repo.last_sync_at)),
        ]);
    }
    println!("{table}");
    Ok(())
}
