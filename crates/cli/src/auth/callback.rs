// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Loopback listener that completes exactly one OAuth redirect.
//!
//! The listener binds `127.0.0.1` on the first free port from a
//! pre-registered candidate list, but the redirect URI it advertises uses
//! `localhost` since that is what identity providers allow-list (RFC 8252
//! §7.3 / §8.3). The first request to `/callback` claims the result slot.
//!
//! The handler signals its result before axum writes the HTML response, so
//! [`RunningCallback::wait`] can return while that response is still in
//! flight. The browser-before-exchange ordering comes from
//! [`RunningCallback::shutdown`]: it drains in-flight responses (bounded by
//! [`SHUTDOWN_GRACE`]) and callers must await it before exchanging the code.

use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{RawQuery, State};
use axum::http::{Method, StatusCode};
use axum::response::Response;
use axum::routing::any;
use axum::Router;
use parking_lot::Mutex;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::debug;

use crate::auth::pages::CallbackPages;
use crate::error::AuthError;

/// Route the identity provider redirects the browser to.
pub const CALLBACK_PATH: &str = "/callback";

/// How long an in-flight response gets to finish before the listener is
/// force-closed.
pub const SHUTDOWN_GRACE: Duration = Duration::from_millis(500);

/// Callback ports registered as redirect URIs on the default identity
/// provider. Changing this list breaks login unless the provider's
/// allow-list changes with it.
pub const DEFAULT_CALLBACK_PORTS: [u16; 8] = [1597, 2584, 4181, 6765, 10946, 17711, 28657, 46368];

/// The authorization code on success, or the classified failure.
pub type CallbackResult = Result<String, AuthError>;

/// A bound, not yet serving, callback listener.
pub struct CallbackListener {
    listener: TcpListener,
    port: u16,
}

impl CallbackListener {
    /// Bind the first available port from `ports`, in order.
    ///
    /// A port of `0` asks the OS for an ephemeral port; the advertised
    /// redirect URI always reflects the port actually bound.
    pub async fn bind(ports: &[u16]) -> Result<Self, AuthError> {
        for &candidate in ports {
            match TcpListener::bind((Ipv4Addr::LOCALHOST, candidate)).await {
                Ok(listener) => {
                    let port = match listener.local_addr() {
                        Ok(addr) => addr.port(),
                        Err(e) => {
                            debug!(port = candidate, "bound callback port has no address: {e}");
                            continue;
                        }
                    };
                    debug!(port, "callback listener bound");
                    return Ok(Self { listener, port });
                }
                Err(e) => debug!(port = candidate, "callback port unavailable: {e}"),
            }
        }
        Err(AuthError::NoAvailablePort { ports: ports.to_vec() })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// `http://localhost:<port>/callback`
    pub fn redirect_uri(&self) -> String {
        format!("http://localhost:{}{CALLBACK_PATH}", self.port)
    }

    /// Start serving in the background, expecting `expected_state` back.
    pub fn serve(self, expected_state: String, pages: CallbackPages) -> RunningCallback {
        let (state, result_rx) = CallbackState::new(expected_state, pages);
        let router = callback_router(Arc::clone(&state));
        let shutdown = CancellationToken::new();
        let sd = shutdown.clone();
        let listener = self.listener;

        let task = tokio::spawn(async move {
            let result =
                axum::serve(listener, router).with_graceful_shutdown(sd.cancelled_owned()).await;
            if let Err(e) = result {
                state.signal(Err(AuthError::CallbackServer(e.to_string())));
            }
        });

        RunningCallback { result_rx, shutdown, task }
    }
}

/// A serving listener plus the receiving end of its one-shot result slot.
pub struct RunningCallback {
    result_rx: oneshot::Receiver<CallbackResult>,
    shutdown: CancellationToken,
    task: JoinHandle<()>,
}

impl RunningCallback {
    /// Wait for the callback result or for `cancel` to fire.
    ///
    /// Does not stop the listener; call [`shutdown`](Self::shutdown)
    /// afterwards on every path.
    pub async fn wait(&mut self, cancel: &CancellationToken) -> CallbackResult {
        tokio::select! {
            _ = cancel.cancelled() => Err(AuthError::Canceled),
            result = &mut self.result_rx => match result {
                Ok(result) => result,
                Err(_) => Err(AuthError::CallbackServer(
                    "listener stopped without producing a result".to_owned(),
                )),
            },
        }
    }

    /// Stop accepting, give in-flight responses [`SHUTDOWN_GRACE`] to
    /// finish, then force-close.
    pub async fn shutdown(mut self) {
        self.shutdown.cancel();
        if tokio::time::timeout(SHUTDOWN_GRACE, &mut self.task).await.is_err() {
            debug!("callback listener did not drain in time, aborting");
            self.task.abort();
        }
    }
}

/// State shared by the handler and the server task.
pub(crate) struct CallbackState {
    expected_state: String,
    pages: CallbackPages,
    result_tx: Mutex<Option<oneshot::Sender<CallbackResult>>>,
}

impl CallbackState {
    pub(crate) fn new(
        expected_state: String,
        pages: CallbackPages,
    ) -> (Arc<Self>, oneshot::Receiver<CallbackResult>) {
        let (tx, rx) = oneshot::channel();
        let state = Arc::new(Self { expected_state, pages, result_tx: Mutex::new(Some(tx)) });
        (state, rx)
    }

    /// Take the sender, if nobody has yet.
    fn claim(&self) -> Option<oneshot::Sender<CallbackResult>> {
        self.result_tx.lock().take()
    }

    /// Deliver `result` unless a result was already delivered. Returns
    /// whether this call won.
    fn signal(&self, result: CallbackResult) -> bool {
        match self.claim() {
            Some(tx) => {
                let _ = tx.send(result);
                true
            }
            None => false,
        }
    }
}

pub(crate) fn callback_router(state: Arc<CallbackState>) -> Router {
    Router::new()
        .route(CALLBACK_PATH, any(handle_callback))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn handle_callback(
    State(state): State<Arc<CallbackState>>,
    method: Method,
    RawQuery(query): RawQuery,
) -> Response {
    if method != Method::GET {
        let resp = state.pages.error(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed.");
        state.signal(Err(AuthError::MethodNotAllowed(method.to_string())));
        return resp;
    }

    let Some(tx) = state.claim() else {
        return state
            .pages
            .error(StatusCode::BAD_REQUEST, "This login attempt has already completed.");
    };

    let params = CallbackParams::parse(query.as_deref().unwrap_or_default());
    let (resp, result) = evaluate(&state, &params);
    // Sent before `resp` is written; `shutdown` drains it.
    let _ = tx.send(result);
    resp
}

/// Build the browser response and the orchestrator-facing result for one
/// redirect.
fn evaluate(state: &CallbackState, params: &CallbackParams) -> (Response, CallbackResult) {
    if let Some(code) = params.error.as_deref() {
        let description = params.error_description.clone().unwrap_or_default();
        let resp = state
            .pages
            .error(StatusCode::BAD_REQUEST, &format!("Authorization failed: {description}"));
        return (resp, Err(AuthError::Denied { code: code.to_owned(), description }));
    }

    let received = params.state.as_deref().unwrap_or_default();
    if !constant_time_eq(received.as_bytes(), state.expected_state.as_bytes()) {
        let resp = state
            .pages
            .error(StatusCode::BAD_REQUEST, "State mismatch. Please try logging in again.");
        return (resp, Err(AuthError::StateMismatch));
    }

    match params.code.as_deref() {
        Some(code) => (state.pages.success(), Ok(code.to_owned())),
        None => {
            let resp = state.pages.error(StatusCode::BAD_REQUEST, "Missing authorization code.");
            (resp, Err(AuthError::MissingCode))
        }
    }
}

/// Query parameters of a redirect. Empty values count as absent and the
/// first occurrence of a repeated key wins.
#[derive(Debug, Default)]
struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

impl CallbackParams {
    fn parse(query: &str) -> Self {
        let mut params = Self::default();
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            if value.is_empty() {
                continue;
            }
            let slot = match key.as_ref() {
                "code" => &mut params.code,
                "state" => &mut params.state,
                "error" => &mut params.error,
                "error_description" => &mut params.error_description,
                _ => continue,
            };
            if slot.is_none() {
                *slot = Some(value.into_owned());
            }
        }
        params
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
#[path = "callback_tests.rs"]
mod tests;
