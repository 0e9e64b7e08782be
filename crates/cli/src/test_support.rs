// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test infrastructure: mock endpoints, signing keys, and helpers.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Form, Json, Router};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use parking_lot::Mutex;
use ring::signature::{Ed25519KeyPair, KeyPair};
use serde::Serialize;

/// Extension trait to convert any `Display` error into `anyhow::Error`.
/// Replaces `.map_err(|e| anyhow::anyhow!("{e}"))` with `.anyhow()`.
pub trait AnyhowExt<T> {
    fn anyhow(self) -> anyhow::Result<T>;
}

impl<T, E: std::fmt::Display> AnyhowExt<T> for Result<T, E> {
    fn anyhow(self) -> anyhow::Result<T> {
        self.map_err(|e| anyhow::anyhow!("{e}"))
    }
}

/// Serve `router` on an ephemeral loopback port and return its base URL.
pub async fn spawn_http(router: Router) -> anyhow::Result<String> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    Ok(format!("http://{addr}"))
}

#[derive(Clone)]
struct TokenEndpointState {
    status: StatusCode,
    body: serde_json::Value,
    calls: Arc<AtomicU32>,
    last_form: Arc<Mutex<Option<HashMap<String, String>>>>,
}

/// A token endpoint that answers every POST with a fixed status and body,
/// counting calls and keeping the last form it received.
pub struct MockTokenEndpoint {
    pub url: String,
    calls: Arc<AtomicU32>,
    last_form: Arc<Mutex<Option<HashMap<String, String>>>>,
}

impl MockTokenEndpoint {
    pub async fn start(status: StatusCode, body: serde_json::Value) -> anyhow::Result<Self> {
        let state = TokenEndpointState {
            status,
            body,
            calls: Arc::new(AtomicU32::new(0)),
            last_form: Arc::new(Mutex::new(None)),
        };
        let calls = Arc::clone(&state.calls);
        let last_form = Arc::clone(&state.last_form);

        let router = Router::new().route("/token", post(token_handler)).with_state(state);
        let base = spawn_http(router).await?;
        Ok(Self { url: format!("{base}/token"), calls, last_form })
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::Relaxed)
    }

    pub fn last_form(&self) -> Option<HashMap<String, String>> {
        self.last_form.lock().clone()
    }
}

async fn token_handler(
    State(state): State<TokenEndpointState>,
    Form(form): Form<HashMap<String, String>>,
) -> (StatusCode, Json<serde_json::Value>) {
    state.calls.fetch_add(1, Ordering::Relaxed);
    *state.last_form.lock() = Some(form);
    (state.status, Json(state.body.clone()))
}

/// An Ed25519 signing key published as a one-entry JWKS.
pub struct TestSigner {
    pub kid: String,
    pkcs8: Vec<u8>,
    public_key: Vec<u8>,
}

impl TestSigner {
    pub fn generate(kid: &str) -> anyhow::Result<Self> {
        let rng = ring::rand::SystemRandom::new();
        let doc = Ed25519KeyPair::generate_pkcs8(&rng).anyhow()?;
        let pair = Ed25519KeyPair::from_pkcs8(doc.as_ref()).anyhow()?;
        Ok(Self {
            kid: kid.to_owned(),
            pkcs8: doc.as_ref().to_vec(),
            public_key: pair.public_key().as_ref().to_vec(),
        })
    }

    pub fn jwks(&self) -> serde_json::Value {
        serde_json::json!({
            "keys": [{
                "kty": "OKP",
                "crv": "Ed25519",
                "alg": "EdDSA",
                "use": "sig",
                "kid": self.kid,
                "x": URL_SAFE_NO_PAD.encode(&self.public_key),
            }]
        })
    }

    /// Sign `claims` as a compact JWT with this key's `kid`.
    pub fn sign<T: Serialize>(&self, claims: &T) -> anyhow::Result<String> {
        let mut header = Header::new(Algorithm::EdDSA);
        header.kid = Some(self.kid.clone());
        let key = EncodingKey::from_ed_der(&self.pkcs8);
        Ok(jsonwebtoken::encode(&header, claims, &key)?)
    }
}

/// Assert that `$expr` is `Err` and its message contains `$substr`.
#[macro_export]
macro_rules! assert_err_contains {
    ($expr:expr, $substr:expr) => {{
        let result = $expr;
        assert!(result.is_err(), concat!("expected Err for: ", stringify!($expr)));
        if let Err(err) = result {
            let msg = err.to_string();
            assert!(msg.contains($substr), "expected error containing {:?}, got: {msg:?}", $substr);
        }
    }};
}
