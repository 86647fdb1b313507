//! Stored-token management.

use anyhow::{Context, Result};
use dialoguer::Password;

use vaultsync_core::provider::ProviderClient;

use super::{style, CliContext};

pub fn run_token_set(ctx: &CliContext, id: i64) -> Result<()> {
    let repo = ctx.require_repository(id)?;
    let token = Password::new()
        .with_prompt(format!("New access token for '{}'", repo.name))
        .interact()
        .context("failed to read token")?;
    ctx.tokens.put_token(id, token)?;
    println!("{}", style::success(&format!("Token stored for '{}'", repo.name)));
    Ok(())
}

pub async fn run_token_check(ctx: &CliContext, id: i64) -> Result<()> {
    let repo = ctx.require_repository(id)?;
    let token = ctx
        .tokens
        .get_token(id)?
        .with_context(|| format!("no token stored for repository {id}"))?;

    let client = ProviderClient::new(repo.provider, token);
    if client.validate_token().await? {
        println!("{}", style::success("Token accepted by the provider"));
    } else {
        println!("{}", style::error("Token rejected by the provider"));
    }
    Ok(())
}
