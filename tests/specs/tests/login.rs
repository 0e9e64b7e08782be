// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::Path;
use std::time::{Duration, Instant};

use chrono::Utc;
use skiff::auth::store;
use skiff::auth::{login, LoginOptions};
use skiff::error::AuthError;
use skiff_specs::{
    next_visit, BrokenBrowser, CountingBrowser, HeadlessBrowser, IdleBrowser, MockIdp, NonceMode,
    CLIENT_ID, HTTP_TIMEOUT,
};
use tokio_util::sync::CancellationToken;

fn options(issuer: &str, dir: &Path) -> LoginOptions {
    LoginOptions {
        issuer: issuer.to_owned(),
        client_id: CLIENT_ID.to_owned(),
        scopes: vec!["openid".into(), "offline_access".into()],
        config_dir: dir.to_path_buf(),
        callback_ports: vec![0],
        http_timeout: HTTP_TIMEOUT,
    }
}

#[tokio::test]
async fn browser_login_persists_verified_tokens() -> anyhow::Result<()> {
    let idp = MockIdp::start().await?;
    let dir = tempfile::tempdir()?;
    let (browser, mut visits) = HeadlessBrowser::new()?;

    let opts = options(&idp.issuer, dir.path());
    let record = login(&opts, &browser, CancellationToken::new()).await?;
    assert_eq!(record.access_token, "AT1");
    assert_eq!(record.refresh_token.as_deref(), Some("RT1"));
    assert_eq!(record.token_type, "Bearer");
    assert_eq!(record.client_id.as_deref(), Some(CLIENT_ID));
    assert_eq!(record.token_endpoint, Some(idp.token_endpoint()));
    let remaining = record.time_to_expiry(Utc::now()).ok_or_else(|| anyhow::anyhow!("expiry"))?;
    assert!(remaining > chrono::Duration::minutes(59), "{remaining}");

    assert_eq!(store::read(dir.path())?, Some(record));

    let visit = next_visit(&mut visits).await?;
    assert_eq!(visit.status, 200, "{}", visit.body);
    assert!(visit.body.contains("Authentication successful"));
    assert!(visit.final_url.starts_with("http://localhost:"), "{}", visit.final_url);
    Ok(())
}

#[tokio::test]
async fn authorization_request_carries_pkce_state_and_nonce() -> anyhow::Result<()> {
    let idp = MockIdp::start().await?;
    let dir = tempfile::tempdir()?;
    let (browser, _visits) = HeadlessBrowser::new()?;

    login(&options(&idp.issuer, dir.path()), &browser, CancellationToken::new()).await?;

    let auths = idp.authorizations();
    assert_eq!(auths.len(), 1);
    let params = &auths[0];
    let get = |k: &str| params.get(k).map(String::as_str).unwrap_or_default();
    assert_eq!(get("response_type"), "code");
    assert_eq!(get("client_id"), CLIENT_ID);
    assert_eq!(get("scope"), "openid offline_access");
    assert_eq!(get("code_challenge_method"), "S256");
    assert_eq!(get("code_challenge").len(), 43);
    assert_eq!(get("state").len(), 43);
    assert_eq!(get("nonce").len(), 43);
    assert_ne!(get("state"), get("nonce"));
    assert!(get("redirect_uri").starts_with("http://localhost:"));
    assert!(get("redirect_uri").ends_with("/callback"));

    let tokens = idp.token_requests();
    assert_eq!(tokens.len(), 1);
    let form = &tokens[0];
    assert_eq!(form.get("grant_type").map(String::as_str), Some("authorization_code"));
    assert_eq!(form.get("redirect_uri").map(String::as_str), Some(get("redirect_uri")));
    assert_eq!(form.get("code_verifier").map(String::len), Some(43));
    Ok(())
}

#[tokio::test]
async fn token_without_expiry_never_expires() -> anyhow::Result<()> {
    let idp = MockIdp::build().expires_in(None).start().await?;
    let dir = tempfile::tempdir()?;
    let (browser, _visits) = HeadlessBrowser::new()?;

    let opts = options(&idp.issuer, dir.path());
    let record = login(&opts, &browser, CancellationToken::new()).await?;
    assert_eq!(record.expiry, None);
    Ok(())
}

#[tokio::test]
async fn nonce_mismatch_persists_nothing() -> anyhow::Result<()> {
    let idp = MockIdp::build().nonce(NonceMode::Fixed("replayed".into())).start().await?;
    let dir = tempfile::tempdir()?;
    let (browser, _visits) = HeadlessBrowser::new()?;

    let result = login(&options(&idp.issuer, dir.path()), &browser, CancellationToken::new()).await;
    assert!(matches!(result, Err(AuthError::NonceMismatch)), "{result:?}");
    assert!(!store::credentials_path(dir.path()).exists());
    Ok(())
}

#[tokio::test]
async fn missing_nonce_claim_is_a_mismatch() -> anyhow::Result<()> {
    let idp = MockIdp::build().nonce(NonceMode::Omit).start().await?;
    let dir = tempfile::tempdir()?;
    let (browser, _visits) = HeadlessBrowser::new()?;

    let result = login(&options(&idp.issuer, dir.path()), &browser, CancellationToken::new()).await;
    assert!(matches!(result, Err(AuthError::NonceMismatch)), "{result:?}");
    assert!(!store::credentials_path(dir.path()).exists());
    Ok(())
}

#[tokio::test]
async fn missing_id_token_persists_nothing() -> anyhow::Result<()> {
    let idp = MockIdp::build().without_id_token().start().await?;
    let dir = tempfile::tempdir()?;
    let (browser, _visits) = HeadlessBrowser::new()?;

    let result = login(&options(&idp.issuer, dir.path()), &browser, CancellationToken::new()).await;
    assert!(matches!(result, Err(AuthError::MissingIdToken)), "{result:?}");
    assert!(!store::credentials_path(dir.path()).exists());
    Ok(())
}

#[tokio::test]
async fn denied_consent_surfaces_provider_error() -> anyhow::Result<()> {
    let idp = MockIdp::build().deny("access_denied", "User said no").start().await?;
    let dir = tempfile::tempdir()?;
    let (browser, mut visits) = HeadlessBrowser::new()?;

    let result = login(&options(&idp.issuer, dir.path()), &browser, CancellationToken::new()).await;
    match result {
        Err(AuthError::Denied { code, description }) => {
            assert_eq!(code, "access_denied");
            assert_eq!(description, "User said no");
        }
        other => anyhow::bail!("expected Denied, got {other:?}"),
    }
    assert!(idp.token_requests().is_empty());
    assert!(!store::credentials_path(dir.path()).exists());

    let visit = next_visit(&mut visits).await?;
    assert_eq!(visit.status, 400);
    assert!(visit.body.contains("User said no"), "{}", visit.body);
    Ok(())
}

#[tokio::test]
async fn browser_launch_failure_is_terminal() -> anyhow::Result<()> {
    let idp = MockIdp::start().await?;
    let dir = tempfile::tempdir()?;

    let result =
        login(&options(&idp.issuer, dir.path()), &BrokenBrowser, CancellationToken::new()).await;
    assert!(matches!(result, Err(AuthError::Browser(_))), "{result:?}");
    assert!(idp.token_requests().is_empty());
    Ok(())
}

#[tokio::test]
async fn cancellation_aborts_waiting_login() -> anyhow::Result<()> {
    let idp = MockIdp::start().await?;
    let dir = tempfile::tempdir()?;
    let cancel = CancellationToken::new();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        trigger.cancel();
    });

    let result = login(&options(&idp.issuer, dir.path()), &IdleBrowser, cancel).await;
    assert!(matches!(result, Err(AuthError::Canceled)), "{result:?}");
    assert!(!store::credentials_path(dir.path()).exists());
    Ok(())
}

#[tokio::test]
async fn login_canceled_before_browser_step_never_opens_browser() -> anyhow::Result<()> {
    let idp = MockIdp::start().await?;
    let dir = tempfile::tempdir()?;
    let browser = CountingBrowser::default();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let result = login(&options(&idp.issuer, dir.path()), &browser, cancel).await;
    assert!(matches!(result, Err(AuthError::Canceled)), "{result:?}");
    assert_eq!(browser.opens(), 0);
    assert!(idp.authorizations().is_empty());
    assert!(idp.token_requests().is_empty());
    assert!(!store::credentials_path(dir.path()).exists());
    Ok(())
}

#[tokio::test]
async fn cancellation_interrupts_slow_discovery() -> anyhow::Result<()> {
    let idp = MockIdp::build().discovery_delay(Duration::from_secs(4)).start().await?;
    let dir = tempfile::tempdir()?;
    let browser = CountingBrowser::default();
    let cancel = CancellationToken::new();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.cancel();
    });

    let start = Instant::now();
    let result = login(&options(&idp.issuer, dir.path()), &browser, cancel).await;
    assert!(matches!(result, Err(AuthError::Canceled)), "{result:?}");
    assert!(start.elapsed() < Duration::from_secs(2), "{:?}", start.elapsed());
    assert_eq!(browser.opens(), 0);
    Ok(())
}

#[tokio::test]
async fn unreachable_issuer_fails_discovery() -> anyhow::Result<()> {
    let port = std::net::TcpListener::bind("127.0.0.1:0")?.local_addr()?.port();
    let dir = tempfile::tempdir()?;

    let issuer = format!("http://127.0.0.1:{port}");
    let result = login(&options(&issuer, dir.path()), &IdleBrowser, CancellationToken::new()).await;
    assert!(matches!(result, Err(AuthError::Discovery { .. })), "{result:?}");
    Ok(())
}

#[tokio::test]
async fn occupied_callback_port_is_skipped() -> anyhow::Result<()> {
    let idp = MockIdp::start().await?;
    let dir = tempfile::tempdir()?;
    let (browser, _visits) = HeadlessBrowser::new()?;

    let busy = std::net::TcpListener::bind("127.0.0.1:0")?;
    let busy_port = busy.local_addr()?.port();
    let mut opts = options(&idp.issuer, dir.path());
    opts.callback_ports = vec![busy_port, 0];

    login(&opts, &browser, CancellationToken::new()).await?;
    let auths = idp.authorizations();
    let redirect = auths[0].get("redirect_uri").cloned().unwrap_or_default();
    assert!(!redirect.contains(&format!(":{busy_port}/")), "{redirect}");
    Ok(())
}
