// src/main.rs
use anyhow::{Context, Result};
use axum::Router;
use axum_server::tls_rustls::RustlsConfig;
use clap::Parser;
use std::{net::SocketAddr, path::PathBuf};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod access;
mod calendar;
mod config;
mod error;
mod holidays;
mod hours_entry;
mod models;
mod payroll;
mod persistence;
mod routes;
mod settings;
mod store;
mod users;

#[cfg(test)]
mod persistence_tests;
#[cfg(test)]
mod routes_tests;

use config::{AppConfig, Cli};
use error::AppError;
use persistence::load_data_file;
use routes::{build_router, AppState};
use settings::SettingsSlot;
use store::InMemoryStore;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::from_env()
        .map_err(AppError::Config)
        .context("Failed to load configuration from environment")?
        .with_overrides(&cli);

    // RUST_LOG wins over LOG_LEVEL
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Load State ---
    let (store, settings) = match &config.data_file {
        Some(path) => load_data_file(path)
            .map_err(AppError::from)
            .with_context(|| format!("Failed to load data file {}", path.display()))?,
        None => {
            warn!("No DATA_FILE configured, state will not survive a restart.");
            (InMemoryStore::new(), SettingsSlot::new())
        }
    };
    let payroll_settings = settings.get_or_create().map_err(AppError::from)?;
    info!(
        "Payroll settings ready: minimum_wage={}",
        payroll_settings.minimum_wage
    );

    if let Some(email) = &config.bootstrap_superuser_email {
        users::ensure_bootstrap_superuser(&store, email)
            .map_err(AppError::from)
            .with_context(|| format!("Failed to seed superuser {}", email))?;
    }

    let state = AppState::new(store, settings, config.data_file.clone());
    // Persist the seeded superuser and settings right away
    if let Some(path) = &config.data_file {
        persistence::save_data_file(path, &state.store, &state.settings)
            .map_err(AppError::from)
            .with_context(|| format!("Failed to write data file {}", path.display()))?;
    }
    info!("Application state initialized.");

    let app = build_router(state);
    let addr: SocketAddr = config
        .bind_address()
        .parse()
        .with_context(|| format!("Invalid bind address {}", config.bind_address()))?;

    if let Err(e) = serve(app, addr, &config).await {
        error!("Server stopped with error: {}", e);
        return Err(e.into());
    }
    Ok(())
}

async fn serve(app: Router, addr: SocketAddr, config: &AppConfig) -> Result<(), AppError> {
    match config.tls_paths() {
        Some((cert_path, key_path)) => {
            let tls_config =
                RustlsConfig::from_pem_file(PathBuf::from(cert_path), PathBuf::from(key_path))
                    .await
                    .map_err(|e| {
                        AppError::TlsConfig(format!("Failed to load TLS cert/key: {}", e))
                    })?;
            info!(
                "TLS configuration loaded successfully from {} and {}",
                cert_path, key_path
            );
            info!("Starting server on https://{}", addr);
            axum_server::bind_rustls(addr, tls_config)
                .serve(app.into_make_service())
                .await?;
        }
        None => {
            info!("Starting server on http://{}", addr);
            let listener = tokio::net::TcpListener::bind(addr).await?;
            axum::serve(listener, app).await?;
        }
    }
    Ok(())
}
