//! Git operations for VaultSync.

pub mod client;

pub use client::{GitAuth, GitClient};
