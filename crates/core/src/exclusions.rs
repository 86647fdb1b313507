//! Path-exclusion policy for sync operations.
//!
//! Each repository carries a list of glob patterns; matching paths are
//! neither staged for commit nor reported by status. Patterns are matched
//! against the path relative to the vault root, forward-slash separated.

use tracing::debug;

/// Evaluates candidate paths against a repository's exclusion patterns.
///
/// Cheap to clone (owned strings only).
#[derive(Debug, Clone, Default)]
pub struct ExclusionPolicy {
    patterns: Vec<String>,
}

impl ExclusionPolicy {
    /// Create a policy from config patterns.
    pub fn new(patterns: Vec<String>) -> Self {
        Self { patterns }
    }

    /// A policy that excludes nothing.
    pub fn allow_all() -> Self {
        Self::default()
    }

    /// `true` if `rel_path` matches any exclusion pattern.
    ///
    /// Supports the usual glob forms: `*.ext`, `dir/**`, `**/*.tmp`.
    pub fn is_excluded(&self, rel_path: &str) -> bool {
        let path = rel_path.replace('\\', "/");
        for pattern in &self.patterns {
            let pat = pattern.replace('\\', "/");
            if glob_match::glob_match(&pat, &path) {
                debug!(path = rel_path, pattern = pattern.as_str(), "path excluded");
                return true;
            }
        }
        false
    }

    /// Whether any patterns are configured.
    pub fn has_patterns(&self) -> bool {
        !self.patterns.is_empty()
    }

    /// The configured patterns (for display).
    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }
}
