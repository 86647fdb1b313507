//! Remove a vault's configuration.

use anyhow::{Context, Result};
use dialoguer::Confirm;

use super::{style, CliContext};

pub fn run_remove(ctx: &CliContext, id: i64, yes: bool) -> Result<()> {
    let repo = ctx.require_repository(id)?;

    if !yes {
        let confirmed = Confirm::new()
            .with_prompt(format!(
                "Remove repository {} ('{}')? Local files at {} are kept.",
                repo.id,
                repo.name,
                repo.local_path.display()
            ))
            .default(false)
            .interact()
            .context("failed to read confirmation")?;
        if !confirmed {
            println!("Aborted.");
            return Ok(());
        }
    }

    ctx.db.delete_repository(id)?;
    ctx.tokens.delete_token(id)?;

    println!(
        "{}",
        style::success(&format!("Removed '{}' from VaultSync", repo.name))
    );
    println!("  local files at {} were left in place", repo.local_path.display());
    Ok(())
}
