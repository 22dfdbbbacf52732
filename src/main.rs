use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::net::TcpListener;

use banking_service::{
    config::Config,
    http::{self, AppState, auth::QueryPassword},
    logging, store,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env is fine; the process environment and flags still apply.
    dotenvy::dotenv().ok();
    let config = Config::parse();
    logging::init_logging(&config);

    let store = store::connect(&config.store_url)
        .await
        .context("failed to connect to account store")?;
    store
        .ping()
        .await
        .context("account store did not answer ping")?;
    tracing::info!("account store connection successful");

    let state = Arc::new(AppState::new(store, config.transfer_timeout()));
    let gate = Arc::new(QueryPassword::new(config.password.clone()));
    let app = http::router(state, gate);

    let addr = config.bind_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    http::serve(listener, app).await?;
    Ok(())
}
