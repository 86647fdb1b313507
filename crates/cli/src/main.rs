//! VaultSync command-line management tool.
//!
//! Provides subcommands for cloning vaults, running sync/pull/push,
//! inspecting status and history, editing auto-sync settings, listing
//! remote repositories, and managing access tokens.

mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use commands::{style, CliContext};

// ---------------------------------------------------------------------------
// CLI argument definitions
// ---------------------------------------------------------------------------

/// VaultSync command-line management tool.
#[derive(Parser, Debug)]
#[command(
    name = "vaultsync",
    version,
    about = "Synchronize local note vaults with Git hosting providers"
)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Clone a remote vault and register it for syncing.
    Clone {
        /// Remote repository URL.
        url: String,

        /// Local directory for the vault (must not exist yet).
        path: PathBuf,

        /// Hosting provider: github or gitee.
        #[arg(long)]
        provider: String,

        /// Display name (defaults to the directory name).
        #[arg(long)]
        name: Option<String>,

        /// Preferred branch to check out first.
        #[arg(long)]
        branch: Option<String>,

        /// Auto-sync interval in minutes (enables auto-sync).
        #[arg(long)]
        interval: Option<u32>,

        /// Glob patterns excluded from syncing (repeatable).
        #[arg(long = "exclude")]
        exclude_patterns: Vec<String>,
    },

    /// List registered vaults.
    List,

    /// Show working-tree status of a vault.
    Status {
        /// Repository id.
        id: i64,
    },

    /// Pull then push one vault.
    Sync {
        /// Repository id.
        id: i64,
    },

    /// Pull remote changes only.
    Pull {
        /// Repository id.
        id: i64,
    },

    /// Commit and push local changes only.
    Push {
        /// Repository id.
        id: i64,
    },

    /// Show the recent sync history of a vault.
    History {
        /// Repository id.
        id: i64,
    },

    /// Enable, change, or disable recurring background sync.
    AutoSync {
        /// Repository id.
        id: i64,

        /// Interval in minutes (enables auto-sync).
        #[arg(long, conflicts_with = "disable")]
        interval: Option<u32>,

        /// Disable auto-sync for this vault.
        #[arg(long)]
        disable: bool,
    },

    /// Remove a vault's configuration. Local files are never deleted.
    Remove {
        /// Repository id.
        id: i64,

        /// Skip the confirmation prompt.
        #[arg(short, long)]
        yes: bool,
    },

    /// List remote repositories visible to a token.
    Repos {
        /// Use the provider and token of a registered repository.
        #[arg(long, conflicts_with = "provider")]
        id: Option<i64>,

        /// Provider to query (prompts for a token): github or gitee.
        #[arg(long)]
        provider: Option<String>,
    },

    /// Show the user a vault's token authenticates as.
    Whoami {
        /// Repository id.
        id: i64,
    },

    /// Manage stored access tokens.
    Token {
        #[command(subcommand)]
        action: TokenAction,
    },
}

#[derive(Subcommand, Debug)]
enum TokenAction {
    /// Store (or replace) the token for a repository.
    Set {
        /// Repository id.
        id: i64,
    },
    /// Validate the stored token against the provider API.
    Check {
        /// Repository id.
        id: i64,
    },
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> ExitCode {
    // Minimal logging for the CLI; the daemon carries the full setup.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new("warn"))
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", style::error(&format!("{e:#}")));
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let ctx = CliContext::build(cli.config.as_deref())?;

    match cli.command {
        Commands::Clone {
            url,
            path,
            provider,
            name,
            branch,
            interval,
            exclude_patterns,
        } => {
            commands::clone::run_clone(
                &ctx,
                &url,
                &path,
                &provider,
                name,
                branch.as_deref(),
                interval,
                exclude_patterns,
            )
            .await
        }
        Commands::List => commands::list::run_list(&ctx),
        Commands::Status { id } => commands::status::run_status(&ctx, id),
        Commands::Sync { id } => commands::sync::run_sync(&ctx, id).await,
        Commands::Pull { id } => commands::sync::run_pull(&ctx, id).await,
        Commands::Push { id } => commands::sync::run_push(&ctx, id).await,
        Commands::History { id } => commands::history::run_history(&ctx, id),
        Commands::AutoSync {
            id,
            interval,
            disable,
        } => commands::autosync::run_auto_sync(&ctx, id, interval, disable),
        Commands::Remove { id, yes } => commands::remove::run_remove(&ctx, id, yes),
        Commands::Repos { id, provider } => {
            commands::remote::run_repos(&ctx, id, provider.as_deref()).await
        }
        Commands::Whoami { id } => commands::remote::run_whoami(&ctx, id).await,
        Commands::Token { action } => match action {
            TokenAction::Set { id } => commands::token::run_token_set(&ctx, id),
            TokenAction::Check { id } => commands::token::run_token_check(&ctx, id).await,
        },
    }
}
