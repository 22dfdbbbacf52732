use std::time::Duration;

use clap::Parser;

/// Runtime settings. Every flag can also come from the environment.
#[derive(Debug, Clone, Parser)]
#[command(name = "banking_service", version, about = "Account and payment HTTP service")]
pub struct Config {
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    #[arg(long, env = "PORT", default_value_t = 8080)]
    pub port: u16,

    /// Shared secret expected in the `password` query parameter
    #[arg(long, env = "PASSWORD", hide_env_values = true)]
    pub password: String,

    /// `memory://` or a `postgres://` connection string
    #[arg(long, env = "STORE_URL", hide_env_values = true)]
    pub store_url: String,

    /// Upper bound on a single transfer before it is rolled back
    #[arg(
        long,
        env = "TRANSFER_TIMEOUT_MS",
        default_value_t = 5000,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub transfer_timeout_ms: u64,

    /// Default filter when RUST_LOG is unset
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    #[arg(long, env = "LOG_JSON")]
    pub log_json: bool,
}

impl Config {
    pub fn transfer_timeout(&self) -> Duration {
        Duration::from_millis(self.transfer_timeout_ms)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
