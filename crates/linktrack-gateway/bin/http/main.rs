use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use linktrack_core::{ClickRepository, Repository};
use linktrack_gateway::config::StorageBackendArg;
use linktrack_gateway::{telemetry, App, AppState, Config};
use linktrack_generator::{Generator, RandomGenerator};
use linktrack_storage::{InMemoryRepository, MySqlRepository, SqliteRepository};
use tokio::net::TcpListener;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();
    telemetry::init(config.log_format).context("failed to initialise logging")?;

    info!(
        listen_addr = %config.listen_addr,
        public_base_url = %config.public_base_url,
        storage_backend = %config.storage,
        "starting linktrack"
    );

    match config.storage {
        StorageBackendArg::InMemory => run_server(&config, InMemoryRepository::new()).await,
        StorageBackendArg::Sqlite => {
            let repository = SqliteRepository::connect(config.database_url())
                .await
                .context("failed to open sqlite database")?;
            run_server(&config, repository).await
        }
        StorageBackendArg::Mysql => {
            let repository = MySqlRepository::connect(config.database_url())
                .await
                .context("failed to connect to mysql")?;
            run_server(&config, repository).await
        }
    }
}

async fn run_server<R: Repository + ClickRepository>(
    config: &Config,
    repository: R,
) -> anyhow::Result<()> {
    let generator = RandomGenerator::new(config.generator_settings())
        .context("invalid short code generator settings")?;
    info!(
        code_length = generator.length(),
        space_size = ?generator.space_size(),
        max_attempts = config.max_allocation_attempts,
        "short code generator ready"
    );
    let state = AppState::new(Arc::new(repository), generator, config.state_options());

    let listener = TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.listen_addr))?;
    info!(listen_addr = %config.listen_addr, "listening");

    axum::serve(
        listener,
        App::router(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("server terminated unexpectedly")?;

    info!("shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
