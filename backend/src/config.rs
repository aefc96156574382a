use std::time::Duration;

use anyhow::Context;

#[derive(Debug, Clone)]
pub struct Config {
    /// Only the `serve` and `sync` commands need a database.
    pub database_url: Option<String>,
    pub host: String,
    pub port: u16,
    pub db_max_connections: u32,
    pub catalog_base_url: String,
    pub catalog_timeout: Duration,
    pub health_timeout: Duration,
    pub sync_page_size: u32,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            database_url: std::env::var("DATABASE_URL").ok(),
            host: std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: env_or("PORT", "3000")
                .parse()
                .context("PORT must be a valid number")?,
            db_max_connections: env_or("DB_MAX_CONNECTIONS", "10")
                .parse()
                .context("DB_MAX_CONNECTIONS must be a valid number")?,
            catalog_base_url: env_or("CATALOG_BASE_URL", "https://dummyjson.com")
                .trim_end_matches('/')
                .to_string(),
            catalog_timeout: Duration::from_secs(
                env_or("CATALOG_TIMEOUT_SECS", "30")
                    .parse()
                    .context("CATALOG_TIMEOUT_SECS must be a number of seconds")?,
            ),
            health_timeout: Duration::from_secs(
                env_or("HEALTH_TIMEOUT_SECS", "10")
                    .parse()
                    .context("HEALTH_TIMEOUT_SECS must be a number of seconds")?,
            ),
            sync_page_size: env_or("SYNC_PAGE_SIZE", "100")
                .parse()
                .context("SYNC_PAGE_SIZE must be a valid number")?,
        })
    }

    pub fn database_url(&self) -> anyhow::Result<&str> {
        self.database_url
            .as_deref()
            .context("DATABASE_URL must be set")
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
