// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `skiff auth`: log in, log out, and inspect the stored session.

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

use crate::auth::{self, store, until_canceled, BrowserOpener, SystemBrowser};
use crate::config::{AuthSettings, TOKEN_ENV};
use crate::error::AuthError;

/// CLI arguments for `skiff auth`.
#[derive(Debug, clap::Args)]
pub struct AuthArgs {
    #[command(subcommand)]
    pub command: AuthCommand,
}

#[derive(Debug, clap::Subcommand)]
pub enum AuthCommand {
    /// Log in through the browser.
    Login,
    /// Remove stored credentials and revoke the refresh token.
    Logout,
    /// Show the local authentication state.
    Status,
    /// Print an access token, refreshing it if needed.
    Token,
}

/// Run the `skiff auth` subcommand. Network-bound subcommands stop with
/// [`AuthError::Canceled`] as soon as `cancel` fires.
pub async fn run(
    args: &AuthArgs,
    settings: &AuthSettings,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    match args.command {
        AuthCommand::Login => {
            auth::login(&settings.login_options(), &AnnouncingBrowser(SystemBrowser), cancel)
                .await?;
            println!("Successfully logged in.");
        }
        AuthCommand::Logout => {
            until_canceled(&cancel, auth::logout(&settings.logout_options())).await?;
            println!("Successfully logged out.");
        }
        AuthCommand::Status => {
            println!("{}", status(settings, Utc::now())?);
        }
        AuthCommand::Token => {
            let resolver = settings.resolver();
            let resolved = until_canceled(&cancel, resolver.resolve()).await?;
            println!("{}", resolved.token);
        }
    }
    Ok(())
}

/// Tells the user which URL is being opened, so they can open it by hand
/// from another machine.
struct AnnouncingBrowser<B>(B);

impl<B: BrowserOpener> BrowserOpener for AnnouncingBrowser<B> {
    fn open(&self, url: &str) -> std::io::Result<()> {
        eprintln!("Opening your browser to log in. If it does not open, visit:\n\n  {url}\n");
        self.0.open(url)
    }
}

/// What `skiff auth status` reports. Computed from local state only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthStatus {
    /// A pre-shared token from the environment overrides stored credentials.
    StaticToken,
    LoggedOut,
    Session { path: PathBuf, expires_in: Option<chrono::Duration>, can_refresh: bool },
}

pub fn status(settings: &AuthSettings, now: DateTime<Utc>) -> Result<AuthStatus, AuthError> {
    if settings.static_token.is_some() {
        return Ok(AuthStatus::StaticToken);
    }
    match store::read(&settings.config_dir)? {
        Some(record) if !record.access_token.is_empty() => Ok(AuthStatus::Session {
            path: store::credentials_path(&settings.config_dir),
            expires_in: record.time_to_expiry(now),
            can_refresh: record.refresh_params().is_some(),
        }),
        _ => Ok(AuthStatus::LoggedOut),
    }
}

impl fmt::Display for AuthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StaticToken => write!(f, "Using the token from {TOKEN_ENV}"),
            Self::LoggedOut => f.write_str("Not logged in. Run 'skiff auth login' to log in."),
            Self::Session { path, expires_in, can_refresh } => {
                writeln!(f, "Logged in")?;
                writeln!(f, "Token expires in {}", format_expires_in(*expires_in))?;
                let refresh = if *can_refresh { "available" } else { "not available" };
                writeln!(f, "Silent refresh {refresh}")?;
                write!(f, "Credentials stored in {}", path.display())
            }
        }
    }
}

/// Compact human form of the time left on a token.
pub fn format_expires_in(remaining: Option<chrono::Duration>) -> String {
    let Some(d) = remaining else {
        return "never".to_owned();
    };
    if d <= chrono::Duration::zero() {
        return "expired".to_owned();
    }
    let hours = d.num_milliseconds() as f64 / 3_600_000.0;
    if d < chrono::Duration::minutes(1) {
        format!("{}s", d.num_seconds())
    } else if d < chrono::Duration::hours(1) {
        format!("{}m", d.num_minutes())
    } else if d < chrono::Duration::hours(24) {
        format!("{hours:.1}h")
    } else {
        format!("{:.1}d", hours / 24.0)
    }
}

#[cfg(test)]
#[path = "auth_tests.rs"]
mod tests;
