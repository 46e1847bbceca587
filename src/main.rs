use anyhow::Result;
use axum::Router;
use std::{io::ErrorKind, sync::Arc};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

mod config;
mod errors;
mod handlers;
mod middleware;
mod models;
mod routes;
mod services;
mod state;

use config::{AppConfig, Command};
use services::{
    bucket_service::BucketService,
    credential_store::{self, CredentialStore, StaticCredentialStore},
    local_provider::LocalProvider,
    token_service::TokenService,
};

#[tokio::main]
async fn main() -> Result<()> {
    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // --- Parse config + command ---
    let (cfg, command) = AppConfig::from_env_and_args()?;

    if let Command::HashPassword(password) = &command {
        println!("{}", credential_store::hash_password(password)?);
        return Ok(());
    }

    tracing::info!("Starting bucket-gate with config: {:?}", cfg);

    // --- Storage provider ---
    let provider =
        LocalProvider::connect(&cfg.database_url, &cfg.storage_dir, &cfg.account_id).await?;
    provider.migrate().await?;

    // --- Handle migration mode ---
    if command == Command::Migrate {
        tracing::info!("Database migration complete.");
        return Ok(()); // exit after migration
    }

    // --- Credentials + tokens ---
    let credentials: Arc<dyn CredentialStore> = match &cfg.credentials_file {
        Some(path) => {
            let store = StaticCredentialStore::from_json_file(path)?;
            tracing::info!("Loaded {} credential(s) from {}", store.len(), path.display());
            Arc::new(store)
        }
        None => Arc::new(StaticCredentialStore::with_demo_user()?),
    };
    let tokens = TokenService::new(credentials, &cfg.jwt_secret, cfg.token_ttl);

    // --- Bucket facade ---
    let buckets = BucketService::new(Arc::new(provider), cfg.default_region.clone())
        .with_rollback_on_folder_failure(cfg.rollback_on_folder_failure);

    // --- Build router ---
    let app: Router = routes::routes::routes(state::AppState::new(tokens, buckets));

    // --- Start server ---
    let addr = cfg.addr();
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err)
            if err.kind() == ErrorKind::PermissionDenied
                && matches!(cfg.host.as_str(), "0.0.0.0" | "::") =>
        {
            let fallback_addr = format!("127.0.0.1:{}", cfg.port);
            tracing::warn!(
                "Permission denied binding to {} ({}). Falling back to {}",
                addr,
                err,
                fallback_addr
            );
            TcpListener::bind(&fallback_addr).await?
        }
        Err(err) => return Err(err.into()),
    };

    tracing::info!("Server listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for shutdown signal: {}", err);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
