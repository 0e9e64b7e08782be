// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! OIDC login, credential storage, and token resolution.

pub mod callback;
pub mod discovery;
pub mod id_token;
pub mod login;
pub mod logout;
pub mod pages;
pub mod pkce;
pub mod random;
pub mod resolver;
pub mod store;
pub mod token;

pub use login::{login, BrowserOpener, LoginOptions, SystemBrowser};
pub use logout::{logout, LogoutOptions, LogoutOutcome};
pub use resolver::{run_proactive_refresh, AuthScheme, ResolvedToken, TokenResolver};
pub use store::CredentialRecord;

use std::future::Future;

use tokio_util::sync::CancellationToken;

use crate::error::AuthError;

/// Drive `work` to completion unless `cancel` fires first, in which case
/// `work` is dropped and [`AuthError::Canceled`] is returned.
pub async fn until_canceled<T>(
    cancel: &CancellationToken,
    work: impl Future<Output = Result<T, AuthError>>,
) -> Result<T, AuthError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(AuthError::Canceled),
        result = work => result,
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
