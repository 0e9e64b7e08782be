// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! OAuth authorization code + PKCE (RFC 7636) helpers.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use sha2::{Digest, Sha256};
use url::Url;

use crate::auth::random::{self, DEFAULT_ENTROPY_BYTES};
use crate::error::AuthError;

/// PKCE verifier and its S256 challenge.
#[derive(Debug, Clone)]
pub struct PkceChallenge {
    /// Secret kept client-side and sent only to the token endpoint.
    pub verifier: String,
    /// `base64url_nopad(sha256(verifier))`, sent with the authorization request.
    pub challenge: String,
}

impl PkceChallenge {
    /// Generate a fresh verifier (32 bytes → 43 chars) and derive its challenge.
    pub fn generate() -> Result<Self, AuthError> {
        Ok(Self::from_verifier(random::generate(DEFAULT_ENTROPY_BYTES)?))
    }

    pub fn from_verifier(verifier: String) -> Self {
        let challenge = compute_code_challenge(&verifier);
        Self { verifier, challenge }
    }
}

/// Compute code_challenge = base64url_nopad(sha256(verifier)).
pub fn compute_code_challenge(verifier: &str) -> String {
    let hash = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hash)
}

/// Everything that goes into the browser-facing authorization URL.
#[derive(Debug, Clone)]
pub struct AuthorizationRequest<'a> {
    pub authorization_endpoint: &'a str,
    pub client_id: &'a str,
    pub redirect_uri: &'a str,
    pub scopes: &'a [String],
    pub state: &'a str,
    pub nonce: &'a str,
    pub code_challenge: &'a str,
}

impl AuthorizationRequest<'_> {
    /// Build the full authorization URL, preserving any query the provider
    /// already put on its endpoint.
    pub fn to_url(&self) -> Result<Url, AuthError> {
        let mut url = Url::parse(self.authorization_endpoint).map_err(|e| AuthError::InvalidUrl {
            url: self.authorization_endpoint.to_owned(),
            reason: e.to_string(),
        })?;
        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", self.client_id)
            .append_pair("redirect_uri", self.redirect_uri)
            .append_pair("scope", &self.scopes.join(" "))
            .append_pair("state", self.state)
            .append_pair("nonce", self.nonce)
            .append_pair("code_challenge", self.code_challenge)
            .append_pair("code_challenge_method", "S256")
            .append_pair("access_type", "offline");
        Ok(url)
    }
}

#[cfg(test)]
#[path = "pkce_tests.rs"]
mod tests;
