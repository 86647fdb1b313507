//! Provider REST queries: remote repository listing and identity.

use anyhow::{bail, Context, Result};
use comfy_table::{presets::UTF8_FULL, Cell, Table};
use dialoguer::Password;

use vaultsync_core::provider::{Provider, ProviderClient};

use super::{parse_provider, style, CliContext};

/// Resolve a provider/token pair from a registered repository id or a
/// bare provider tag (prompting for the token).
fn resolve_client(
    ctx: &CliContext,
    id: Option<i64>,
    provider_tag: Option<&str>,
) -> Result<ProviderClient> {
    match (id, provider_tag) {
        (Some(id), _) => {
            let repo = ctx.require_repository(id)?;
            let token = ctx
                .tokens
                .get_token(id)?
                .with_context(|| format!("no token stored for repository {id}"))?;
            Ok(ProviderClient::new(repo.provider, token))
        }
        (None, Some(tag)) => {
            let provider = parse_provider(tag)?;
            let token = Password::new()
                .with_prompt(format!("Access token for {provider}"))
                .interact()
                .context("failed to read token")?;
            Ok(ProviderClient::new(provider, token))
        }
        (None, None) => bail!("pass --id <repo id> or --provider <github|gitee>"),
    }
}

pub async fn run_repos(
    ctx: &CliContext,
    id: Option<i64>,
    provider_tag: Option<&str>,
) -> Result<()> {
    let client = resolve_client(ctx, id, provider_tag)?;
    let repos = client
        .list_repos()
        .await
        .context("failed to list remote repositories")?;

    if repos.is_empty() {
        println!("No remote repositories visible to this token.");
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(["Repository", "Visibility", "Clone URL", "Description"]);
    for repo in &repos {
        table.add_row([
            Cell::new(&repo.full_name),
            Cell::new(if repo.private { "private" } else { "public" }),
            Cell::new(&repo.clone_url),
            Cell::new(repo.description.as_deref().unwrap_or("")),
        ]);
    }
    println!("{table}");
    Ok(())
}

pub async fn run_whoami(ctx: &CliContext, id: i64) -> Result<()> {
    let repo = ctx.require_repository(id)?;
    let token = ctx
        .tokens
        .get_token(id)?
        .with_context(|| format!("no token stored for repository {id}"))?;

    let client = ProviderClient::new(repo.provider, token);
    let user = client.get_user().await.context("identity lookup failed")?;

    println!(
        "{}",
        style::success(&format!(
            "{} authenticates as '{}'{}",
            provider_label(repo.provider),
            user.login,
            user.name
                .map(|n| format!(" ({n})"))
                .unwrap_or_default()
        ))
    );
    Ok(())
}

fn provider_label(provider: Provider) -> String {
    format!("token for {provider}")
}
