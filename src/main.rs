//! Service entry point: configuration, tracing, component wiring, serving.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};

use babelgate::auth::StaticTokenProvider;
use babelgate::config::Config;
use babelgate::history::HistoryStore;
use babelgate::{api, translate, AppContext};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "babelgate=debug,tower_http=info".parse().expect("default filter")),
        )
        .with_target(true)
        .init();

    info!("babelgate starting");

    let config = Config::from_env();
    if config.text_hash_secret.is_none() {
        warn!("TEXT_HASH_SALT is not set; /translate will refuse requests until it is configured");
    }

    let translator = translate::from_config(&config).map_err(|e| anyhow::anyhow!(e))?;
    let identity = Arc::new(StaticTokenProvider::from_token_list(&config.auth_tokens));
    let history = HistoryStore::open(&config.history_db_path).map_err(|e| anyhow::anyhow!(e))?;

    let addr = SocketAddr::from((config.host, config.port));
    let ctx = Arc::new(AppContext::new(config, translator, identity, history));
    let app = api::router(ctx);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("failed to bind listen address")?;
    info!(%addr, "listening");

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
