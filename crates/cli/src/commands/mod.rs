//! CLI command implementations.

pub mod autosync;
pub mod clone;
pub mod history;
pub mod list;
pub mod remote;
pub mod remove;
pub mod status;
pub mod style;
pub mod sync;
pub mod token;

use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::TimeZone;

use vaultsync_core::config::AppConfig;
use vaultsync_core::db::Database;
use vaultsync_core::keystore::TokenStore;
use vaultsync_core::models::RepositoryConfig;
use vaultsync_core::provider::Provider;
use vaultsync_core::sync::SyncManager;

/// Shared handles every command needs.
pub struct CliContext {
    pub config: AppConfig,
    pub db: Arc<Database>,
    pub tokens: Arc<TokenStore>,
    pub manager: SyncManager,
}

impl CliContext {
    /// Open the store and keystore from the config (or defaults).
    pub fn build(config_path: Option<&Path>) -> Result<Self> {
        let config =
            AppConfig::load_or_default(config_path).context("failed to load configuration")?;
        config.validate().context("configuration validation failed")?;

        std::fs::create_dir_all(&config.app.data_dir)
            .context("failed to create data directory")?;
        let db = Arc::new(Database::new(config.db_path()).context("failed to open database")?);
        db.initialize().context("failed to initialize database")?;
        let tokens =
            Arc::new(TokenStore::open(&config.app.data_dir).context("failed to open keystore")?);
        let manager = SyncManager::new(db.clone(), tokens.clone(), &config);

        Ok(Self {
            config,
            db,
            tokens,
            manager,
        })
    }

    /// Look up a repository or fail with a user-facing message.
    pub fn require_repository(&self, id: i64) -> Result<RepositoryConfig> {
        match self.db.get_repository(id)? {
            Some(repo) => Ok(repo),
            None => bail!("no repository with id {id}; run `vaultsync list`"),
        }
    }
}

/// Parse a provider tag given on the command line.
pub fn parse_provider(tag: &str) -> Result<Provider> {
    match Provider::from_str_val(&tag.to_lowercase()) {
        Some(provider) => Ok(provider),
        None => bail!("unknown provider '{tag}' (expected: github, gitee)"),
    }
}

/// Human-readable last-sync column value.
pub fn format_last_sync(millis: i64) -> String {
    if millis == 0 {
        return "never".to_string();
    }
    match chrono::Utc.timestamp_millis_opt(millis).single() {
        Some(ts) => ts.format("%Y-%m-%d %H:%M:%S").to_string(),
        None => "invalid".to_string(),
    }
}
