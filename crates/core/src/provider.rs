//! Hosting-provider capability set and REST API client.
//!
//! [`Provider`] is a closed enum: all per-provider behavior (API base URL,
//! auth header format, endpoints, git credential username) is selected here
//! at construction, never by string comparison at call sites.

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::errors::ProviderError;
use crate::models::{ProviderUser, RemoteRepo};

// ---------------------------------------------------------------------------
// Provider capability enum
// ---------------------------------------------------------------------------

/// A supported Git hosting provider.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    GitHub,
    Gitee,
}

impl Provider {
    /// REST API base URL, without trailing slash.
    pub fn api_base_url(&self) -> &'static str {
        match self {
            Self::GitHub => "https://api.github.com",
            Self::Gitee => "https://gitee.com/api/v5",
        }
    }

    /// `Authorization` header value carrying the bearer token.
    pub fn auth_header(&self, token: &str) -> String {
        match self {
            Self::GitHub => format!("Bearer {token}"),
            Self::Gitee => format!("token {token}"),
        }
    }

    /// Endpoint listing the authenticated user's repositories.
    pub fn repo_list_endpoint(&self) -> &'static str {
        "/user/repos"
    }

    /// Endpoint returning the authenticated user.
    pub fn user_endpoint(&self) -> &'static str {
        "/user"
    }

    /// Username paired with the token for git-over-HTTPS credentials.
    pub fn credential_username(&self) -> &'static str {
        match self {
            Self::GitHub => "x-access-token",
            Self::Gitee => "oauth2",
        }
    }

    /// Stable lowercase tag as stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GitHub => "github",
            Self::Gitee => "gitee",
        }
    }

    /// Parse a stored tag. Unknown tags are rejected, keeping the set closed.
    pub fn from_str_val(s: &str) -> Option<Self> {
        match s {
            "github" => Some(Self::GitHub),
            "gitee" => Some(Self::Gitee),
            _ => None,
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// REST client
// ---------------------------------------------------------------------------

/// Asynchronous provider REST API client.
///
/// Consumed for display purposes only (listing remote repositories,
/// identifying the token's user); never part of the sync path.
#[derive(Clone)]
pub struct ProviderClient {
    http: reqwest::Client,
    provider: Provider,
    api_url: String,
    token: String,
}

impl ProviderClient {
    pub fn new(provider: Provider, token: impl Into<String>) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(USER_AGENT, HeaderValue::from_static("vaultsync/0.1"));
        let http = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .unwrap_or_default();
        info!(provider = %provider, "created ProviderClient");
        Self {
            http,
            provider,
            api_url: provider.api_base_url().to_string(),
            token: token.into(),
        }
    }

    pub fn provider(&self) -> Provider {
        self.provider
    }

    /// List the authenticated user's repositories.
    #[instrument(skip(self))]
    pub async fn list_repos(&self) -> Result<Vec<RemoteRepo>, ProviderError> {
        let url = format!("{}{}", self.api_url, self.provider.repo_list_endpoint());
        let resp = self
            .http
            .get(&url)
            .header("Authorization", self.provider.auth_header(&self.token))
            .query(&[("per_page", "100"), ("sort", "updated")])
            .send()
            .await?;
        let resp = Self::check_status(resp).await?;
        let repos: Vec<RemoteRepo> = resp
            .json()
            .await
            .map_err(|e| ProviderError::ParseError(e.to_string()))?;
        debug!(count = repos.len(), "listed remote repositories");
        Ok(repos)
    }

    /// Fetch the authenticated user.
    #[instrument(skip(self))]
    pub async fn get_user(&self) -> Result<ProviderUser, ProviderError> {
        let url = format!("{}{}", self.api_url, self.provider.user_endpoint());
        let resp = self
            .http
            .get(&url)
            .header("Authorization", self.provider.auth_header(&self.token))
            .send()
            .await?;
        let resp = Self::check_status(resp).await?;
        resp.json()
            .await
            .map_err(|e| ProviderError::ParseError(e.to_string()))
    }

    /// Check whether the token is accepted by the user endpoint.
    pub async fn validate_token(&self) -> Result<bool, ProviderError> {
        match self.get_user().await {
            Ok(_) => Ok(true),
            Err(ProviderError::AuthenticationFailed(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, ProviderError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err(ProviderError::AuthenticationFailed(body));
        }
        Err(ProviderError::ApiError {
            status: status.as_u16(),
            body,
        })
    }
}
