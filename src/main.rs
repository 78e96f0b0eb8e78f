use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use google_cloud_storage::client::{Client, ClientConfig};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod adapters;
mod cache;
mod config;
mod errors;
mod model;
mod proxy;
mod server;
mod util;

use crate::{
    adapters::gcs::GcsStore, cache::ObjectCache, config::Config, errors::ErrorCatalog,
    model::error::ProxyError, proxy::StorageProxy, server::Server,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::parse();
    config.validate()?;
    info!(
        host = %config.host,
        port = config.port,
        tls = config.tls,
        cache = !config.no_cache,
        "args"
    );

    // rendered before serving so a bad payload fails startup, not a request
    let errors = ErrorCatalog::new().context("failed to render error payloads")?;

    let client_config = ClientConfig::default()
        .with_auth()
        .await
        .context("failed to load google cloud credentials")?;
    let project = config
        .project
        .clone()
        .or_else(|| client_config.project_id.clone())
        .ok_or_else(|| ProxyError::Config("no project id configured or discoverable".to_string()))?;
    info!(project = %project, "resolved project");

    let store = GcsStore::new(Client::new(client_config), &project);
    let mut proxy = StorageProxy::new(Arc::new(store), errors);
    if !config.no_cache {
        proxy = proxy.with_cache(Arc::new(ObjectCache::new()), config.cache_max_object_bytes);
    }

    let mut server = Server::bind(config.listen_addr()?, Arc::new(proxy))
        .await?
        .with_shutdown_timeout(config.shutdown_timeout());
    if let Some(paths) = config.tls_paths()? {
        server = server.with_tls(server::load_tls(&paths)?);
    }

    server.run(shutdown_signal()).await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            error!(error_message=%err, error_group="signal");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Err(err) => {
                error!(error_message=%err, error_group="signal");
                std::future::pending::<()>().await;
            }
            Ok(mut sig) => {
                sig.recv().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!(signal = "SIGINT", "initiating graceful server shutdown"),
        _ = terminate => info!(signal = "SIGTERM", "initiating graceful server shutdown"),
    }
}
