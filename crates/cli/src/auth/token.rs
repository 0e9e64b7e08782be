// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Token endpoint calls: authorization-code exchange and refresh.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};

use crate::auth::store::{CredentialRecord, RefreshParams};
use crate::error::AuthError;

const DEFAULT_TOKEN_TYPE: &str = "Bearer";

/// Standard OAuth2 token response, plus the OIDC `id_token`.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Seconds until the access token expires. Absent, non-positive or
    /// unrepresentable means the provider gave no expiry. Some providers
    /// send it as a quoted number.
    #[serde(default, deserialize_with = "seconds_or_string")]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub id_token: Option<String>,
}

/// RFC 6749 §5.2 error body.
#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

impl TokenResponse {
    pub fn expiry(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.expires_in
            .filter(|secs| *secs > 0)
            .and_then(chrono::Duration::try_seconds)
            .and_then(|lifetime| now.checked_add_signed(lifetime))
    }

    /// Build the record persisted after a fresh login.
    pub fn into_record(
        self,
        client_id: &str,
        token_endpoint: &str,
        now: DateTime<Utc>,
    ) -> CredentialRecord {
        let expiry = self.expiry(now);
        CredentialRecord {
            access_token: self.access_token,
            token_type: non_empty(self.token_type).unwrap_or_else(|| DEFAULT_TOKEN_TYPE.to_owned()),
            refresh_token: non_empty(self.refresh_token),
            expiry,
            client_id: Some(client_id.to_owned()),
            token_endpoint: Some(token_endpoint.to_owned()),
        }
    }
}

/// Inputs for the authorization-code grant with PKCE.
#[derive(Debug, Clone, Copy)]
pub struct CodeExchange<'a> {
    pub token_endpoint: &'a str,
    pub client_id: &'a str,
    pub code: &'a str,
    pub redirect_uri: &'a str,
    pub code_verifier: &'a str,
}

/// Exchange an authorization code for tokens.
pub async fn exchange_code(
    client: &reqwest::Client,
    req: &CodeExchange<'_>,
) -> Result<TokenResponse, AuthError> {
    post_token_form(
        client,
        req.token_endpoint,
        &[
            ("grant_type", "authorization_code"),
            ("code", req.code),
            ("redirect_uri", req.redirect_uri),
            ("client_id", req.client_id),
            ("code_verifier", req.code_verifier),
        ],
    )
    .await
}

/// Perform a single refresh-token grant.
pub async fn refresh(
    client: &reqwest::Client,
    params: RefreshParams<'_>,
) -> Result<TokenResponse, AuthError> {
    post_token_form(
        client,
        params.token_endpoint,
        &[
            ("grant_type", "refresh_token"),
            ("refresh_token", params.refresh_token),
            ("client_id", params.client_id),
        ],
    )
    .await
}

/// Merge a refresh response into the record it refreshed.
///
/// A rotated refresh token replaces the old one; when the provider omits
/// it the old one stays valid and is kept.
pub fn rotate(old: &CredentialRecord, resp: TokenResponse, now: DateTime<Utc>) -> CredentialRecord {
    let expiry = resp.expiry(now);
    let token_type = non_empty(resp.token_type)
        .or_else(|| Some(old.token_type.clone()).filter(|t| !t.is_empty()))
        .unwrap_or_else(|| DEFAULT_TOKEN_TYPE.to_owned());
    CredentialRecord {
        access_token: resp.access_token,
        token_type,
        refresh_token: non_empty(resp.refresh_token).or_else(|| old.refresh_token.clone()),
        expiry,
        client_id: old.client_id.clone(),
        token_endpoint: old.token_endpoint.clone(),
    }
}

async fn post_token_form(
    client: &reqwest::Client,
    endpoint: &str,
    form: &[(&str, &str)],
) -> Result<TokenResponse, AuthError> {
    let resp = client
        .post(endpoint)
        .form(form)
        .send()
        .await
        .map_err(|e| AuthError::TokenExchange(e.to_string()))?;

    let status = resp.status();
    if !status.is_success() {
        let text = resp.text().await.unwrap_or_default();
        return Err(AuthError::TokenExchange(describe_error(status, &text)));
    }

    let token: TokenResponse = resp
        .json()
        .await
        .map_err(|e| AuthError::TokenExchange(format!("invalid token response: {e}")))?;
    if token.access_token.is_empty() {
        return Err(AuthError::TokenExchange("token response has no access_token".to_owned()));
    }
    Ok(token)
}

fn describe_error(status: reqwest::StatusCode, body: &str) -> String {
    match serde_json::from_str::<ErrorResponse>(body) {
        Ok(ErrorResponse { error, error_description: Some(desc) }) if !desc.is_empty() => {
            format!("{status}: {error}: {desc}")
        }
        Ok(ErrorResponse { error, .. }) => format!("{status}: {error}"),
        Err(_) if body.trim().is_empty() => status.to_string(),
        Err(_) => format!("{status}: {}", body.trim()),
    }
}

/// Accepts `3600`, `"3600"` or `null`.
fn seconds_or_string<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Seconds {
        Number(i64),
        Text(String),
    }

    match Option::<Seconds>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Seconds::Number(secs)) => Ok(Some(secs)),
        Some(Seconds::Text(text)) => text
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| serde::de::Error::custom(format!("invalid expires_in: {text:?}"))),
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

#[cfg(test)]
#[path = "token_tests.rs"]
mod tests;
