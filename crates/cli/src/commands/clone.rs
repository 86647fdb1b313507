//! Clone a remote vault and register it for syncing.

use std::path::Path;

use anyhow::{bail, Context, Result};
use dialoguer::Password;
use indicatif::{ProgressBar, ProgressStyle};

use vaultsync_core::exclusions::ExclusionPolicy;
use vaultsync_core::git::{GitAuth, GitClient};
use vaultsync_core::models::NewRepository;

use super::{parse_provider, style, CliContext};

#[allow(clippy::too_many_arguments)]
pub async fn run_clone(
    ctx: &CliContext,
    url: &str,
    path: &Path,
    provider_tag: &str,
    name: Option<String>,
    branch: Option<&str>,
    interval: Option<u32>,
    exclude_patterns: Vec<String>,
) -> Result<()> {
    let provider = parse_provider(provider_tag)?;

    // Local-path uniqueness is the caller's invariant, enforced here.
    if let Some(existing) = ctx.db.get_repository_by_path(path)? {
        bail!(
            "'{}' is already registered as repository {} ({})",
            path.display(),
            existing.id,
            existing.name
        );
    }

    let token = Password::new()
        .with_prompt(format!("Access token for {provider}"))
        .interact()
        .context("failed to read token")?;
    let auth = GitAuth {
        username: provider.credential_username().to_string(),
        token: token.clone(),
    };

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::with_template("{spinner} {msg}").unwrap());
    spinner.set_message(format!("Cloning {url}..."));
    spinner.enable_steady_tick(std::time::Duration::from_millis(100));

    let clone_result = GitClient::clone_vault(
        url,
        path,
        Some(&auth),
        branch,
        ExclusionPolicy::new(exclude_patterns.clone()),
        ctx.config.commit_identity(),
    );
    spinner.finish_and_clear();
    let client = clone_result.context("clone failed")?;

    let display_name = name.unwrap_or_else(|| {
        path.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "vault".to_string())
    });

    let repo = ctx.db.insert_repository(&NewRepository {
        name: display_name,
        remote_url: url.to_string(),
        local_path: path.to_path_buf(),
        provider,
        auto_sync: interval.is_some(),
        sync_interval_minutes: interval.unwrap_or(30),
        exclude_patterns,
    })?;
    ctx.tokens.put_token(repo.id, token)?;

    println!(
        "{}",
        style::success(&format!(
            "Cloned '{}' (branch {}) as repository {}",
            repo.name,
            client.current_branch()?,
            repo.id
        ))
    );
    if repo.auto_sync {
        println!(
            "  auto-sync every {} min (picked up by the daemon)",
            repo.sync_interval_minutes
        );
    }
    Ok(())
}
