// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Browser-based OIDC login: authorization code + PKCE over a loopback
//! redirect.
//!
//! The flow is linear with no retries. Every failure is terminal and
//! nothing is persisted until the ID token (including its nonce) has been
//! verified. Every network step races the cancellation token, and the
//! browser is never opened once it has fired.

use std::path::PathBuf;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::auth::callback::CallbackListener;
use crate::auth::discovery;
use crate::auth::id_token::IdTokenVerifier;
use crate::auth::pages::CallbackPages;
use crate::auth::pkce::{AuthorizationRequest, PkceChallenge};
use crate::auth::random;
use crate::auth::store::{self, CredentialRecord};
use crate::auth::token::{self, CodeExchange};
use crate::auth::until_canceled;
use crate::error::AuthError;
use crate::http::build_client;

/// Inputs for one login attempt.
#[derive(Debug, Clone)]
pub struct LoginOptions {
    pub issuer: String,
    pub client_id: String,
    pub scopes: Vec<String>,
    pub config_dir: PathBuf,
    pub callback_ports: Vec<u16>,
    pub http_timeout: Duration,
}

/// Opens the authorization URL for the user.
pub trait BrowserOpener: Send + Sync {
    fn open(&self, url: &str) -> std::io::Result<()>;
}

/// The platform's default browser.
pub struct SystemBrowser;

impl BrowserOpener for SystemBrowser {
    fn open(&self, url: &str) -> std::io::Result<()> {
        open::that(url)
    }
}

/// Run the full login flow and persist the resulting credentials.
pub async fn login(
    opts: &LoginOptions,
    browser: &dyn BrowserOpener,
    cancel: CancellationToken,
) -> Result<CredentialRecord, AuthError> {
    if cancel.is_cancelled() {
        return Err(AuthError::Canceled);
    }

    let listener = CallbackListener::bind(&opts.callback_ports).await?;
    let redirect_uri = listener.redirect_uri();

    let client = build_client(opts.http_timeout)?;
    let metadata = until_canceled(&cancel, discovery::discover(&client, &opts.issuer)).await?;
    debug!(
        authorization_endpoint = %metadata.authorization_endpoint,
        token_endpoint = %metadata.token_endpoint,
        revocation_endpoint = ?metadata.revocation_endpoint,
        "provider discovered"
    );

    let state = random::generate(random::DEFAULT_ENTROPY_BYTES)?;
    let nonce = random::generate(random::DEFAULT_ENTROPY_BYTES)?;
    let pkce = PkceChallenge::generate()?;

    let auth_url = AuthorizationRequest {
        authorization_endpoint: &metadata.authorization_endpoint,
        client_id: &opts.client_id,
        redirect_uri: &redirect_uri,
        scopes: &opts.scopes,
        state: &state,
        nonce: &nonce,
        code_challenge: &pkce.challenge,
    }
    .to_url()?;

    let mut running = listener.serve(state, CallbackPages::load()?);
    if cancel.is_cancelled() {
        running.shutdown().await;
        return Err(AuthError::Canceled);
    }

    info!(url = %auth_url, "opening browser for login");
    if let Err(e) = browser.open(auth_url.as_str()) {
        running.shutdown().await;
        return Err(AuthError::Browser(e));
    }

    let outcome = running.wait(&cancel).await;
    running.shutdown().await;
    let code = outcome?;

    let exchange = CodeExchange {
        token_endpoint: &metadata.token_endpoint,
        client_id: &opts.client_id,
        code: &code,
        redirect_uri: &redirect_uri,
        code_verifier: &pkce.verifier,
    };
    let tokens = until_canceled(&cancel, token::exchange_code(&client, &exchange)).await?;

    let raw_id_token = tokens.id_token.as_deref().ok_or(AuthError::MissingIdToken)?;
    let verifier = IdTokenVerifier::new(client.clone(), &metadata, &opts.client_id);
    let claims = until_canceled(&cancel, verifier.verify(raw_id_token)).await?;
    if claims.nonce.as_deref() != Some(nonce.as_str()) {
        return Err(AuthError::NonceMismatch);
    }

    let record = tokens.into_record(&opts.client_id, &metadata.token_endpoint, chrono::Utc::now());
    store::write(&opts.config_dir, &record)?;
    info!(subject = %claims.sub, "login complete");
    Ok(record)
}
