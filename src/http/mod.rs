pub mod auth;
pub mod error;
pub mod handlers;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    middleware::from_fn_with_state,
    routing::{get, post},
};
use tokio::net::TcpListener;

use crate::domain::AccountStore;
use crate::engine::TransferEngine;
use crate::service::AccountService;
use auth::{Gate, require_gate};

/// Shared by every request handler.
pub struct AppState {
    pub accounts: AccountService<dyn AccountStore>,
    pub transfers: TransferEngine<dyn AccountStore>,
}

impl AppState {
    pub fn new(store: Arc<dyn AccountStore>, transfer_timeout: Duration) -> Self {
        Self {
            accounts: AccountService::new(store.clone()),
            transfers: TransferEngine::new(store, transfer_timeout),
        }
    }
}

pub fn router(state: Arc<AppState>, gate: Arc<dyn Gate>) -> Router {
    Router::new()
        .route("/account", post(handlers::create_account))
        .route(
            "/accounts",
            get(handlers::list_accounts).delete(handlers::delete_all_accounts),
        )
        .route(
            "/account/{id}",
            get(handlers::get_account).delete(handlers::delete_account),
        )
        .route("/payments", post(handlers::create_payment))
        .layer(from_fn_with_state(gate, require_gate))
        .with_state(state)
}

/// Serves until Ctrl-C.
pub async fn serve(listener: TcpListener, app: Router) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        tracing::info!(%addr, "listening");
    }
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for shutdown signal");
                std::future::pending::<()>().await;
            }
            tracing::info!("shutting down");
        })
        .await
}
