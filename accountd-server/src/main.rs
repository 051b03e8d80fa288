//! accountd server binary

use accountd_core::{AccountService, PasswordHasher, TokenIssuer};
use accountd_engine::StorageEngine;
use accountd_server::{AccountServer, LogFormat, ServerConfig};
use anyhow::Context;
use clap::Parser;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServerConfig::parse();
    init_tracing(config.log_format);

    info!("Starting accountd server");
    info!("Data directory: {}", config.data_dir.display());
    info!("Bind address: {}", config.bind);

    if !config.data_dir.exists() {
        std::fs::create_dir_all(&config.data_dir)
            .with_context(|| format!("Failed to create data directory {}", config.data_dir.display()))?;
        info!("Created data directory: {}", config.data_dir.display());
    }

    let engine = StorageEngine::new(&config.data_dir).context("Failed to initialize storage engine")?;
    let store = engine.credential_store().context("Failed to open credential store")?;
    info!("Storage engine initialized");

    let issuer = match config.jwt_secret.as_deref() {
        Some(secret) => TokenIssuer::new(secret.as_bytes(), config.token_config()).context("Invalid --jwt-secret")?,
        None => {
            warn!("No signing secret configured; using an ephemeral key, sessions will not survive a restart");
            TokenIssuer::ephemeral(config.token_config())?
        }
    };

    let service = AccountService::new(Arc::new(store), PasswordHasher::new()?, issuer);

    if let Some(admin) = config.bootstrap_admin() {
        match service.ensure_admin(admin).context("Failed to bootstrap admin account")? {
            Some(user) => info!("Created bootstrap admin {}", user.email),
            None => info!("Bootstrap admin email already registered, leaving it unchanged"),
        }
    }

    let listener = TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind))?;

    AccountServer::new(service).serve(listener, shutdown_signal()).await?;

    engine.persist().context("Failed to flush storage on shutdown")?;
    info!("Server shutdown gracefully");
    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);

    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
