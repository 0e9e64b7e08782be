// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! ID token signature and claim verification against the provider's JWKS.

use std::str::FromStr;

use jsonwebtoken::jwk::{Jwk, JwkSet};
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::debug;

use crate::auth::discovery::ProviderMetadata;
use crate::error::AuthError;

/// Clock skew tolerated on `exp`/`nbf`/`iat`.
pub const LEEWAY_SECS: u64 = 60;

/// Claims the login flow reads from a verified ID token.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct IdTokenClaims {
    pub sub: String,
    #[serde(default)]
    pub nonce: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

/// Verifies ID tokens for one issuer/client pair.
///
/// The key set is fetched on first use and refetched once when a token
/// names a `kid` the cached set does not contain.
pub struct IdTokenVerifier {
    client: reqwest::Client,
    jwks_uri: String,
    issuer: String,
    client_id: String,
    algorithms: Vec<Algorithm>,
    keys: Mutex<Option<JwkSet>>,
}

impl IdTokenVerifier {
    pub fn new(client: reqwest::Client, metadata: &ProviderMetadata, client_id: &str) -> Self {
        Self {
            client,
            jwks_uri: metadata.jwks_uri.clone(),
            issuer: metadata.issuer.clone(),
            client_id: client_id.to_owned(),
            algorithms: accepted_algorithms(
                metadata.id_token_signing_alg_values_supported.as_deref(),
            ),
            keys: Mutex::new(None),
        }
    }

    /// Check signature, issuer, audience and expiry, returning the claims.
    pub async fn verify(&self, raw: &str) -> Result<IdTokenClaims, AuthError> {
        let header = decode_header(raw).map_err(|e| fail(format!("malformed token: {e}")))?;
        if !self.algorithms.contains(&header.alg) {
            return Err(fail(format!("signing algorithm {:?} is not accepted", header.alg)));
        }

        let jwk = self.find_key(header.kid.as_deref()).await?;
        let key = DecodingKey::from_jwk(&jwk).map_err(|e| fail(format!("unusable key: {e}")))?;

        let mut validation = Validation::new(header.alg);
        validation.leeway = LEEWAY_SECS;
        validation.set_issuer(&[&self.issuer]);
        validation.set_audience(&[&self.client_id]);
        validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);

        let data =
            decode::<IdTokenClaims>(raw, &key, &validation).map_err(|e| fail(e.to_string()))?;
        Ok(data.claims)
    }

    async fn find_key(&self, kid: Option<&str>) -> Result<Jwk, AuthError> {
        let mut cache = self.keys.lock().await;
        if let Some(jwk) = cache.as_ref().and_then(|set| select_key(set, kid)) {
            return Ok(jwk.clone());
        }

        let set = self.fetch_keys().await?;
        let found = select_key(&set, kid).cloned();
        *cache = Some(set);
        found.ok_or_else(|| fail(format!("no signing key matches kid {kid:?}")))
    }

    async fn fetch_keys(&self) -> Result<JwkSet, AuthError> {
        debug!(jwks_uri = %self.jwks_uri, "fetching signing keys");
        let resp = self
            .client
            .get(&self.jwks_uri)
            .send()
            .await
            .map_err(|e| fail(format!("fetching keys: {e}")))?;
        if !resp.status().is_success() {
            return Err(fail(format!("fetching keys: {}", resp.status())));
        }
        resp.json().await.map_err(|e| fail(format!("invalid key set: {e}")))
    }
}

/// A token without `kid` is only accepted when the set has exactly one key.
fn select_key<'a>(set: &'a JwkSet, kid: Option<&str>) -> Option<&'a Jwk> {
    match kid {
        Some(kid) => set.find(kid),
        None => match set.keys.as_slice() {
            [only] => Some(only),
            _ => None,
        },
    }
}

/// Algorithms from discovery that can verify a public client's ID token.
/// HMAC algorithms are never accepted; without an advertised list the
/// OpenID Connect default `RS256` applies.
fn accepted_algorithms(advertised: Option<&[String]>) -> Vec<Algorithm> {
    let advertised = match advertised {
        Some(list) if !list.is_empty() => list,
        _ => return vec![Algorithm::RS256],
    };
    advertised
        .iter()
        .filter_map(|name| Algorithm::from_str(name).ok())
        .filter(|alg| !matches!(alg, Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512))
        .collect()
}

fn fail(reason: String) -> AuthError {
    AuthError::IdTokenVerification(reason)
}

#[cfg(test)]
#[path = "id_token_tests.rs"]
mod tests;
