//! VaultSync core library.
//!
//! Provides the foundational components for note-vault Git synchronization:
//! configuration, SQLite persistence, the encrypted token keystore, the
//! provider capability set and REST client, the git client, and the sync
//! orchestration layer.

pub mod config;
pub mod db;
pub mod errors;
pub mod exclusions;
pub mod git;
pub mod keystore;
pub mod models;
pub mod provider;
pub mod sync;

// Re-exports for convenience.
pub use config::AppConfig;
pub use db::Database;
pub use keystore::TokenStore;
pub use provider::{Provider, ProviderClient};
pub use sync::{SyncManager, SyncOrchestrator};
