pub mod memory;
pub mod postgres;

use std::sync::Arc;

use anyhow::bail;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use crate::domain::AccountStore;

/// Picks the backend from the url scheme: `memory://` keeps accounts in
/// process, `postgres://` / `postgresql://` use a PostgreSQL database.
pub async fn connect(url: &str) -> anyhow::Result<Arc<dyn AccountStore>> {
    if url.starts_with("memory://") {
        tracing::warn!("using in-memory account store; data is lost on exit");
        return Ok(Arc::new(MemoryStore::new()));
    }
    if url.starts_with("postgres://") || url.starts_with("postgresql://") {
        return Ok(Arc::new(PgStore::connect(url).await?));
    }

    let scheme = url.split("://").next().unwrap_or(url);
    bail!("unsupported store url scheme: {}", scheme)
}
