// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-command token resolution with on-demand and proactive refresh.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use chrono::Utc;
use tracing::debug;

use crate::auth::store::{self, CredentialRecord};
use crate::auth::token;
use crate::error::AuthError;
use crate::http::build_client;

/// Tokens closer than this to expiry are refreshed before use.
pub const REFRESH_WINDOW: Duration = Duration::from_secs(30);

/// Window used by the post-command proactive refresh.
pub const PROACTIVE_WINDOW: Duration = Duration::from_secs(60);

/// Upper bound on the post-command proactive refresh.
pub const PROACTIVE_DEADLINE: Duration = Duration::from_secs(3);

/// How the resolved token is presented to an API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthScheme {
    /// OAuth2 access token from the credential store.
    Bearer,
    /// Pre-shared token from the environment.
    Token,
}

impl AuthScheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bearer => "Bearer",
            Self::Token => "Token",
        }
    }
}

impl fmt::Display for AuthScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedToken {
    pub token: String,
    pub scheme: AuthScheme,
}

/// Outcome of a proactive refresh attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProactiveOutcome {
    Refreshed,
    /// Nothing to do: static token, no session, no expiry, already
    /// expired, outside the window, or no refresh metadata.
    Skipped,
}

/// Resolves the credential to send with an API call.
#[derive(Debug, Clone)]
pub struct TokenResolver {
    config_dir: PathBuf,
    static_token: Option<String>,
    http_timeout: Duration,
}

impl TokenResolver {
    /// `static_token` wins over anything on disk when set and non-empty.
    pub fn new(config_dir: PathBuf, static_token: Option<String>, http_timeout: Duration) -> Self {
        let static_token = static_token.filter(|t| !t.is_empty());
        Self { config_dir, static_token, http_timeout }
    }

    pub fn config_dir(&self) -> &std::path::Path {
        &self.config_dir
    }

    pub fn has_static_token(&self) -> bool {
        self.static_token.is_some()
    }

    /// Return a usable token, refreshing it first if it is about to expire.
    pub async fn resolve(&self) -> Result<ResolvedToken, AuthError> {
        if let Some(token) = &self.static_token {
            return Ok(ResolvedToken { token: token.clone(), scheme: AuthScheme::Token });
        }

        let record = match store::read(&self.config_dir)? {
            Some(record) if !record.access_token.is_empty() => record,
            _ => return Err(AuthError::NotLoggedIn),
        };

        let window = chrono_window(REFRESH_WINDOW);
        match record.time_to_expiry(Utc::now()) {
            None => return Ok(bearer(record)),
            Some(remaining) if remaining > window => return Ok(bearer(record)),
            Some(_) => {}
        }

        if record.refresh_params().is_none() {
            return Err(AuthError::SessionExpired);
        }

        let refreshed = match self.refresh(&record).await {
            Ok(refreshed) => refreshed,
            Err(e) if e.is_storage_error() => return Err(e),
            Err(e) => {
                debug!("on-demand refresh failed: {e}");
                return Err(AuthError::RefreshFailed);
            }
        };
        Ok(bearer(refreshed))
    }

    /// Refresh a still-valid token that expires within `window`.
    pub async fn proactive_refresh(
        &self,
        window: Duration,
    ) -> Result<ProactiveOutcome, AuthError> {
        if self.static_token.is_some() {
            return Ok(ProactiveOutcome::Skipped);
        }
        let Some(record) = store::read(&self.config_dir)? else {
            return Ok(ProactiveOutcome::Skipped);
        };
        let Some(remaining) = record.time_to_expiry(Utc::now()) else {
            return Ok(ProactiveOutcome::Skipped);
        };
        if remaining <= chrono::Duration::zero() || remaining > chrono_window(window) {
            return Ok(ProactiveOutcome::Skipped);
        }
        if record.refresh_params().is_none() {
            return Ok(ProactiveOutcome::Skipped);
        }

        self.refresh(&record).await?;
        Ok(ProactiveOutcome::Refreshed)
    }

    /// Exchange the stored refresh token and persist the merged record.
    async fn refresh(&self, record: &CredentialRecord) -> Result<CredentialRecord, AuthError> {
        let params = record.refresh_params().ok_or(AuthError::SessionExpired)?;
        let client = build_client(self.http_timeout)?;
        let resp = token::refresh(&client, params).await?;
        let rotated = resp.refresh_token.as_deref().is_some_and(|t| !t.is_empty());
        let updated = token::rotate(record, resp, Utc::now());
        store::write(&self.config_dir, &updated)?;
        debug!(rotated, expiry = ?updated.expiry, "token refreshed");
        Ok(updated)
    }
}

/// Best-effort refresh after a command, bounded by `deadline`.
///
/// Never fails and never prints: the outcome only reaches the debug log.
pub async fn run_proactive_refresh(
    resolver: &TokenResolver,
    window: Duration,
    deadline: Duration,
) {
    match tokio::time::timeout(deadline, resolver.proactive_refresh(window)).await {
        Ok(Ok(outcome)) => debug!(?outcome, "proactive refresh finished"),
        Ok(Err(e)) => debug!("proactive refresh failed, discarding: {e}"),
        Err(_) => debug!(?deadline, "proactive refresh timed out, discarding"),
    }
}

fn bearer(record: CredentialRecord) -> ResolvedToken {
    ResolvedToken { token: record.access_token, scheme: AuthScheme::Bearer }
}

fn chrono_window(window: Duration) -> chrono::Duration {
    chrono::Duration::from_std(window).unwrap_or(chrono::Duration::MAX)
}

#[cfg(test)]
#[path = "resolver_tests.rs"]
mod tests;
