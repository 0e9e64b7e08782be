// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Opaque random values for `state` and `nonce`.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::rngs::OsRng;
use rand::TryRngCore;

use crate::error::AuthError;

/// Number of random bytes behind every `state`, `nonce` and PKCE verifier.
pub const DEFAULT_ENTROPY_BYTES: usize = 32;

/// Return `n` bytes from the operating system's CSPRNG, encoded as unpadded
/// URL-safe base64.
///
/// Reads straight from the OS source. If it is unavailable the error is
/// returned; there is no fallback generator.
pub fn generate(n: usize) -> Result<String, AuthError> {
    let mut bytes = vec![0u8; n];
    OsRng.try_fill_bytes(&mut bytes).map_err(|e| AuthError::Entropy(e.to_string()))?;
    Ok(URL_SAFE_NO_PAD.encode(bytes))
}

#[cfg(test)]
#[path = "random_tests.rs"]
mod tests;
