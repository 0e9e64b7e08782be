// SPDX-License-Identifier: BUSL-1.1
// Copyright 2025 Alfred Jean LLC

use std::path::PathBuf;

/// Every failure the authentication subsystem can report.
///
/// Variants are grouped the way callers need to react to them: setup
/// failures abort a login, protocol/security failures abort without
/// persisting anything, state failures tell the user to log in again, and
/// storage failures point at the filesystem instead.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    // -- Setup ----------------------------------------------------------------
    #[error("unable to find an available port for the callback listener (tried {ports:?})")]
    NoAvailablePort { ports: Vec<u16> },

    #[error("failed to query OIDC provider {issuer:?}: {reason}")]
    Discovery { issuer: String, reason: String },

    #[error("unable to open browser: {0}")]
    Browser(#[source] std::io::Error),

    #[error("canceled by user")]
    Canceled,

    #[error("secure random source unavailable: {0}")]
    Entropy(String),

    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("invalid URL {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("invalid configuration: {0}")]
    Config(String),

    // -- Protocol / security --------------------------------------------------
    #[error("unexpected callback method: {0}")]
    MethodNotAllowed(String),

    #[error("authorization denied: {code}: {description}")]
    Denied { code: String, description: String },

    #[error("state mismatch")]
    StateMismatch,

    #[error("missing authorization code")]
    MissingCode,

    #[error("callback server failed: {0}")]
    CallbackServer(String),

    #[error("missing id_token in token response")]
    MissingIdToken,

    #[error("id token verification failed: {0}")]
    IdTokenVerification(String),

    #[error("nonce mismatch")]
    NonceMismatch,

    // -- Transport ------------------------------------------------------------
    #[error("token exchange failed: {0}")]
    TokenExchange(String),

    #[error("token revocation failed: {0}")]
    Revocation(String),

    // -- State ----------------------------------------------------------------
    #[error("not logged in: run 'skiff auth login' first")]
    NotLoggedIn,

    #[error("session expired: run 'skiff auth login' to re-authenticate")]
    SessionExpired,

    #[error("session expired (refresh failed): run 'skiff auth login' to re-authenticate")]
    RefreshFailed,

    // -- Storage --------------------------------------------------------------
    #[error("cannot access credentials at {}: {source} (check file permissions)", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(
        "credentials file {} is corrupt: {source}; run 'skiff auth login' to re-authenticate",
        path.display()
    )]
    CorruptRecord {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("cannot encode credentials for {}: {source}", path.display())]
    EncodeRecord {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl AuthError {
    /// Errors the user fixes by logging in again.
    pub fn is_state_error(&self) -> bool {
        matches!(self, Self::NotLoggedIn | Self::SessionExpired | Self::RefreshFailed)
    }

    /// Errors rooted in the local credential file rather than the session.
    pub fn is_storage_error(&self) -> bool {
        matches!(self, Self::Io { .. } | Self::CorruptRecord { .. } | Self::EncodeRecord { .. })
    }

    /// Process exit code for this error when it reaches the command layer.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) => 2,
            _ => 1,
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
