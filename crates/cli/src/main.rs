// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use skiff::auth::resolver::{run_proactive_refresh, PROACTIVE_DEADLINE, PROACTIVE_WINDOW};
use skiff::config::{AuthSettings, Config};
use skiff::error::AuthError;

#[tokio::main]
async fn main() {
    let config = Config::parse();

    init_tracing(&config);

    if let Err(e) = config.validate() {
        eprintln!("error: {e}");
        std::process::exit(2);
    }

    skiff::http::ensure_crypto();

    if let Err(e) = run(config).await {
        eprintln!("Error: {e:#}");
        let code = e.downcast_ref::<AuthError>().map_or(1, AuthError::exit_code);
        std::process::exit(code);
    }
}

fn init_tracing(config: &Config) {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_new(config.log_filter()).unwrap_or_else(|_| EnvFilter::new("warn"));

    match config.log_format.as_str() {
        "json" => {
            fmt::fmt().with_env_filter(filter).with_writer(std::io::stderr).json().init();
        }
        _ => {
            fmt::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
        }
    }
}

async fn run(config: Config) -> anyhow::Result<()> {
    let settings = AuthSettings::from_config(&config)?;
    debug!(
        config_dir = %settings.config_dir.display(),
        issuer = %settings.issuer,
        "settings resolved"
    );

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            debug!("interrupt received");
            on_signal.cancel();
        }
    });

    config.command.run(&settings, cancel).await?;

    run_proactive_refresh(&settings.resolver(), PROACTIVE_WINDOW, PROACTIVE_DEADLINE).await;
    Ok(())
}
