// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Dedicated HTTP clients for identity-provider traffic.

use std::sync::Once;
use std::time::Duration;

use crate::error::AuthError;

/// User-Agent sent on every request to the identity provider.
pub const USER_AGENT: &str = concat!("skiff/", env!("CARGO_PKG_VERSION"));

static CRYPTO_INIT: Once = Once::new();

/// Install the ring crypto provider for reqwest/rustls. Only the first call
/// has any effect.
pub fn ensure_crypto() {
    CRYPTO_INIT.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}

/// Build a client with an explicit overall request timeout.
pub fn build_client(timeout: Duration) -> Result<reqwest::Client, AuthError> {
    ensure_crypto();
    let client = reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(10)))
        .build()?;
    Ok(client)
}
