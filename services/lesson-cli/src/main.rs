//! Lesson platform command-line client
//!
//! Single-binary client that:
//! 1. Loads configuration and the persisted credential pair
//! 2. Runs one command through the authenticated session
//! 3. Refreshes expired access tokens transparently
//! 4. Tells the user to sign in again when the session cannot be renewed

mod app;
mod cli;
mod config;
mod error;
mod metrics;
mod navigation;

use anyhow::{Context, Result};
use clap::Parser;
use common::Secret;
use lesson_auth::FileTokenStore;
use session::Session;
use std::io::BufRead;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use transport::ReqwestTransport;

use crate::cli::{Cli, Command};
use crate::config::Config;

/// How long to wait for the navigation task to flush after the command.
const NAVIGATION_DRAIN: Duration = Duration::from_secs(1);

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and LOG_LEVEL / RUST_LOG support.
    // Logs go to stderr; stdout carries the command output.
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr),
        )
        .init();

    let cli = Cli::parse();

    // Install the recorder before any session counter is touched
    let prometheus = if cli.metrics {
        Some(metrics::install_recorder()?)
    } else {
        None
    };

    let (config_path, explicit) = Config::resolve_path(cli.config_path.as_deref());
    let config = if explicit || config_path.exists() {
        info!(path = %config_path.display(), "loading configuration");
        Config::load(&config_path)
            .with_context(|| format!("failed to load config from {}", config_path.display()))?
    } else {
        info!("no configuration file, using defaults");
        Config::defaults().context("invalid default configuration")?
    };

    info!(
        base_url = %config.api.base_url,
        timeout_secs = config.api.timeout_secs,
        token_file = %config.storage.token_file.display(),
        "configuration loaded"
    );

    let store = FileTokenStore::load(config.storage.token_file.clone())
        .await
        .with_context(|| {
            format!(
                "failed to open token store {}",
                config.storage.token_file.display()
            )
        })?;

    let client = reqwest::Client::builder()
        .build()
        .context("failed to build HTTP client")?;
    let transport = ReqwestTransport::new(client, Duration::from_secs(config.api.timeout_secs));

    let session = Session::open(config.session_config(), Arc::new(transport), Arc::new(store)).await;
    let navigation = tokio::spawn(navigation::follow(session.subscribe(), std::io::stderr()));

    let password = match &cli.command {
        Command::Login { .. } => Some(read_password()?),
        _ => None,
    };

    let result = app::run(&session, cli.command, password).await;

    // Dropping the last handle closes the event channel and ends navigation
    drop(session);
    if tokio::time::timeout(NAVIGATION_DRAIN, navigation).await.is_err() {
        warn!("navigation task did not finish");
    }

    if let Some(handle) = prometheus {
        eprintln!("{}", handle.render());
    }

    let output = result?;
    println!("{output}");
    Ok(())
}

/// Password from `LESSON_PASSWORD`, or the first line of stdin.
fn read_password() -> Result<Secret<String>> {
    if let Ok(password) = std::env::var("LESSON_PASSWORD") {
        return Ok(Secret::new(password));
    }

    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .context("failed to read password from stdin")?;
    let len = line.trim_end_matches(['\r', '\n']).len();
    line.truncate(len);
    let password = Secret::new(line);

    if password.expose().is_empty() {
        return Err(error::Error::MissingPassword.into());
    }
    Ok(password)
}
