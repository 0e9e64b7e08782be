// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! CLI subcommands.

pub mod auth;

use tokio_util::sync::CancellationToken;

use crate::config::AuthSettings;

#[derive(Debug, clap::Subcommand)]
pub enum Command {
    /// Authenticate with the Skiff platform.
    Auth(auth::AuthArgs),
}

impl Command {
    pub async fn run(
        &self,
        settings: &AuthSettings,
        cancel: CancellationToken,
    ) -> anyhow::Result<()> {
        match self {
            Self::Auth(args) => auth::run(args, settings, cancel).await,
        }
    }
}
