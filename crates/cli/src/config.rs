// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;
use tracing::warn;

use crate::auth::callback::DEFAULT_CALLBACK_PORTS;
use crate::auth::{LoginOptions, LogoutOptions, TokenResolver};
use crate::command::Command;
use crate::error::AuthError;

/// Application directory name under the user's config root.
pub const APP_DIR: &str = "skiff";

/// Pre-shared token that bypasses the credential store.
pub const TOKEN_ENV: &str = "SKIFF_TOKEN";

pub const DEFAULT_ISSUER: &str = "https://auth.skiff.dev";
pub const DEFAULT_CLIENT_ID: &str = "skiff-cli";

/// Command-line client for the Skiff platform.
#[derive(Debug, Parser)]
#[command(name = "skiff", version, about)]
pub struct Config {
    /// Configuration directory (default: $XDG_CONFIG_HOME/skiff).
    #[arg(long, global = true, env = "SKIFF_CONFIG_DIR")]
    pub config_dir: Option<PathBuf>,

    /// OIDC issuer URL.
    #[arg(long, global = true, hide = true, env = "SKIFF_ISSUER", default_value = DEFAULT_ISSUER)]
    pub issuer: String,

    /// OAuth2 client identifier.
    #[arg(
        long,
        global = true,
        hide = true,
        env = "SKIFF_CLIENT_ID",
        default_value = DEFAULT_CLIENT_ID
    )]
    pub client_id: String,

    /// Scopes requested at login.
    #[arg(
        long,
        global = true,
        hide = true,
        value_delimiter = ',',
        default_values = ["openid", "offline_access"]
    )]
    pub scopes: Vec<String>,

    /// Loopback ports tried in order for the login callback.
    #[arg(
        long,
        global = true,
        hide = true,
        env = "SKIFF_CALLBACK_PORTS",
        value_delimiter = ',',
        default_values_t = DEFAULT_CALLBACK_PORTS
    )]
    pub callback_ports: Vec<u16>,

    /// Timeout for each identity provider request, in seconds.
    #[arg(long, global = true, env = "SKIFF_HTTP_TIMEOUT_SECS", default_value = "30")]
    pub http_timeout_secs: u64,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, env = "SKIFF_LOG_LEVEL", default_value = "warn")]
    pub log_level: String,

    /// Log format (text or json).
    #[arg(long, global = true, env = "SKIFF_LOG_FORMAT", default_value = "text")]
    pub log_format: String,

    /// Enable debug logging.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Config {
    /// Validate the configuration after parsing.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.callback_ports.is_empty() {
            anyhow::bail!("--callback-ports must list at least one port");
        }
        if !self.scopes.iter().any(|s| s == "openid") {
            anyhow::bail!("--scopes must include openid");
        }
        if !matches!(self.log_format.as_str(), "text" | "json") {
            anyhow::bail!("invalid log format: {} (expected text or json)", self.log_format);
        }
        if self.http_timeout_secs == 0 {
            anyhow::bail!("--http-timeout-secs must be greater than zero");
        }
        if self.issuer.trim().is_empty() {
            anyhow::bail!("--issuer must not be empty");
        }
        if !self.scopes.iter().any(|s| s == "offline_access") {
            warn!("scopes omit offline_access; the provider may not issue a refresh token");
        }
        Ok(())
    }

    /// Effective tracing filter, `-v` forcing debug.
    pub fn log_filter(&self) -> &str {
        if self.verbose {
            "debug"
        } else {
            &self.log_level
        }
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

/// Pick the config directory: explicit flag, then `$XDG_CONFIG_HOME/skiff`,
/// then `~/.config/skiff`.
pub fn resolve_config_dir(
    explicit: Option<&Path>,
    xdg_config_home: Option<OsString>,
    home: Option<PathBuf>,
) -> Result<PathBuf, AuthError> {
    if let Some(dir) = explicit.filter(|d| !d.as_os_str().is_empty()) {
        return Ok(dir.to_path_buf());
    }
    if let Some(xdg) = xdg_config_home.filter(|x| !x.is_empty()) {
        return Ok(PathBuf::from(xdg).join(APP_DIR));
    }
    match home {
        Some(home) => Ok(home.join(".config").join(APP_DIR)),
        None => Err(AuthError::Config(
            "cannot determine config directory: set --config-dir or SKIFF_CONFIG_DIR".to_owned(),
        )),
    }
}

/// Everything the auth entry points need, resolved once per process.
#[derive(Debug, Clone)]
pub struct AuthSettings {
    pub config_dir: PathBuf,
    pub issuer: String,
    pub client_id: String,
    pub scopes: Vec<String>,
    pub callback_ports: Vec<u16>,
    pub http_timeout: Duration,
    pub static_token: Option<String>,
}

impl AuthSettings {
    /// Resolve settings from parsed flags and the process environment.
    pub fn from_config(config: &Config) -> Result<Self, AuthError> {
        let config_dir = resolve_config_dir(
            config.config_dir.as_deref(),
            std::env::var_os("XDG_CONFIG_HOME"),
            dirs::home_dir(),
        )?;
        let static_token = std::env::var(TOKEN_ENV).ok();
        Ok(Self::new(config, config_dir, static_token))
    }

    pub fn new(config: &Config, config_dir: PathBuf, static_token: Option<String>) -> Self {
        Self {
            config_dir,
            issuer: config.issuer.clone(),
            client_id: config.client_id.clone(),
            scopes: config.scopes.clone(),
            callback_ports: config.callback_ports.clone(),
            http_timeout: config.http_timeout(),
            static_token: static_token.filter(|t| !t.is_empty()),
        }
    }

    pub fn login_options(&self) -> LoginOptions {
        LoginOptions {
            issuer: self.issuer.clone(),
            client_id: self.client_id.clone(),
            scopes: self.scopes.clone(),
            config_dir: self.config_dir.clone(),
            callback_ports: self.callback_ports.clone(),
            http_timeout: self.http_timeout,
        }
    }

    pub fn logout_options(&self) -> LogoutOptions {
        LogoutOptions {
            issuer: self.issuer.clone(),
            client_id: self.client_id.clone(),
            config_dir: self.config_dir.clone(),
        }
    }

    pub fn resolver(&self) -> TokenResolver {
        TokenResolver::new(self.config_dir.clone(), self.static_token.clone(), self.http_timeout)
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
