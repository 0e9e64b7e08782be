// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! OpenID Connect discovery (`/.well-known/openid-configuration`).

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::AuthError;

pub const WELL_KNOWN_PATH: &str = "/.well-known/openid-configuration";

/// The subset of provider metadata the login flow uses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderMetadata {
    pub issuer: String,
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    pub jwks_uri: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_token_signing_alg_values_supported: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revocation_endpoint: Option<String>,
}

/// URL of the discovery document for `issuer`.
pub fn discovery_url(issuer: &str) -> String {
    format!("{}{WELL_KNOWN_PATH}", issuer.trim_end_matches('/'))
}

/// Fetch and validate the provider metadata for `issuer`.
///
/// The document's `issuer` must equal the configured issuer exactly
/// (OpenID Connect Discovery §4.3).
pub async fn discover(
    client: &reqwest::Client,
    issuer: &str,
) -> Result<ProviderMetadata, AuthError> {
    let fail = |reason: String| AuthError::Discovery { issuer: issuer.to_owned(), reason };

    let url = discovery_url(issuer);
    debug!(%url, "fetching provider metadata");
    let resp = client.get(&url).send().await.map_err(|e| fail(e.to_string()))?;

    if !resp.status().is_success() {
        let status = resp.status();
        let text = resp.text().await.unwrap_or_default();
        return Err(fail(format!("discovery returned {status}: {}", text.trim())));
    }

    let metadata: ProviderMetadata =
        resp.json().await.map_err(|e| fail(format!("invalid discovery document: {e}")))?;

    if metadata.issuer != issuer {
        return Err(fail(format!(
            "issuer mismatch: discovery document reports {:?}",
            metadata.issuer
        )));
    }
    Ok(metadata)
}

#[cfg(test)]
#[path = "discovery_tests.rs"]
mod tests;
