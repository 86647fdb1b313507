//! Manual sync, pull, and push commands.

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};

use super::{style, CliContext};

fn spinner(message: String) -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    bar.set_style(ProgressStyle::with_template("{spinner} {msg}").unwrap());
    bar.set_message(message);
    bar.enable_steady_tick(std::time::Duration::from_millis(100));
    bar
}

pub async fn run_sync(ctx: &CliContext, id: i64) -> Result<()> {
    let repo = ctx.require_repository(id)?;
    let bar = spinner(format!("Syncing '{}'...", repo.name));
    let result = ctx.manager.sync_repository(id).await;
    bar.finish_and_clear();

    let outcome = result.context("sync failed")?;
    println!("{}", style::success(&format!("Synced '{}'", repo.name)));
    if !outcome.pull_message.is_empty() {
        println!("  pull: {}", outcome.pull_message);
    } else {
        println!("  pull: {}", style::warn("failed (push went through)"));
    }
    Ok(())
}

pub async fn run_pull(ctx: &CliContext, id: i64) -> Result<()> {
    let repo = ctx.require_repository(id)?;
    let bar = spinner(format!("Pulling '{}'...", repo.name));
    let result = ctx.manager.pull_repository(id).await;
    bar.finish_and_clear();

    let summary = result.context("pull failed")?;
    println!("{}", style::success(&summary));
    Ok(())
}

pub async fn run_push(ctx: &CliContext, id: i64) -> Result<()> {
    let repo = ctx.require_repository(id)?;
    let bar = spinner(format!("Pushing '{}'...", repo.name));
    let result = ctx.manager.push_repository(id).await;
    bar.finish_and_clear();

    result.context("push failed")?;
    println!("{}", style::success(&format!("Pushed '{}'", repo.name)));
    Ok(())
}
