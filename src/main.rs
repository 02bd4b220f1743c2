use todo_pool::{
    application::todo_service::TodoServiceImpl,
    config::AppConfig,
    domain::repository::KeyValueStore,
    http::routing::{self, files, todos},
    infrastructure::sqlite_kv::{prepare_sqlite_file, SqliteKeyValueStore},
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env()?;
    prepare_sqlite_file(&config.database_url)?;
    let store = SqliteKeyValueStore::connect(&config.database_url).await?;
    store.init().await?;
    let service = TodoServiceImpl::load(store).await;

    let state = todos::AppState { service };
    let router = routing::app(todos::router(state.clone()).merge(files::router(state)));

    tracing::info!(addr = %config.bind_addr, database_url = %config.database_url, "listening");
    axum::serve(tokio::net::TcpListener::bind(config.bind_addr).await?, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    use tokio::signal::ctrl_c;
    let _ = ctrl_c().await;
    tracing::info!("shutdown");
}
