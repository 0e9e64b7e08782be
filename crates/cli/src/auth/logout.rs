// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Logout: delete local credentials first, then revoke best-effort.

use std::path::PathBuf;
use std::time::Duration;

use tracing::{debug, warn};
use url::Url;

use crate::auth::store;
use crate::error::AuthError;
use crate::http::build_client;

/// Appended to the issuer's path to form the revocation endpoint.
pub const REVOCATION_PATH: &str = "/oauth2/revoke";

pub const REVOCATION_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct LogoutOptions {
    pub issuer: String,
    pub client_id: String,
    pub config_dir: PathBuf,
}

/// What a successful logout did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogoutOutcome {
    /// A credential record existed and was removed.
    pub had_session: bool,
    /// The provider acknowledged revocation of the refresh token.
    pub revoked: bool,
}

/// Delete the stored credentials, then revoke the refresh token if there
/// was one.
///
/// Only a failure to delete is an error. Revocation problems are logged
/// and swallowed since the local record is already gone.
pub async fn logout(opts: &LogoutOptions) -> Result<LogoutOutcome, AuthError> {
    let record = match store::read(&opts.config_dir) {
        Ok(record) => record,
        Err(e) => {
            debug!("ignoring unreadable credentials during logout: {e}");
            None
        }
    };

    store::delete(&opts.config_dir)?;

    let Some(record) = record else {
        return Ok(LogoutOutcome { had_session: false, revoked: false });
    };
    let Some(refresh_token) = record.refresh_token.as_deref().filter(|t| !t.is_empty()) else {
        return Ok(LogoutOutcome { had_session: true, revoked: false });
    };

    let client_id =
        record.client_id.as_deref().filter(|c| !c.is_empty()).unwrap_or(&opts.client_id);
    let revoked = match revoke(&opts.issuer, client_id, refresh_token).await {
        Ok(()) => {
            debug!("refresh token revoked");
            true
        }
        Err(e) => {
            warn!("refresh token revocation failed: {e}");
            false
        }
    };
    Ok(LogoutOutcome { had_session: true, revoked })
}

/// `<issuer>/oauth2/revoke`, keeping any path the issuer already has.
pub fn revocation_url(issuer: &str) -> Result<Url, AuthError> {
    let mut url = Url::parse(issuer)
        .map_err(|e| AuthError::InvalidUrl { url: issuer.to_owned(), reason: e.to_string() })?;
    let path = format!("{}{REVOCATION_PATH}", url.path().trim_end_matches('/'));
    url.set_path(&path);
    Ok(url)
}

/// POST the token to the revocation endpoint. Only HTTP 200 counts.
async fn revoke(issuer: &str, client_id: &str, token: &str) -> Result<(), AuthError> {
    let url = revocation_url(issuer)?;
    let client = build_client(REVOCATION_TIMEOUT)?;
    let resp = client
        .post(url)
        .form(&[("token", token), ("client_id", client_id)])
        .send()
        .await
        .map_err(|e| AuthError::Revocation(e.to_string()))?;

    if resp.status() != reqwest::StatusCode::OK {
        return Err(AuthError::Revocation(format!("HTTP {}", resp.status().as_u16())));
    }
    Ok(())
}

#[cfg(test)]
#[path = "logout_tests.rs"]
mod tests;
