//! Database connection settings

use std::env;
use std::time::Duration;

use serde::Deserialize;
use sqlx::AnyPool;
use sqlx::any::AnyPoolOptions;

use crate::constants::{DEFAULT_ACQUIRE_TIMEOUT_SECS, DEFAULT_DATABASE_URL, DEFAULT_MAX_CONNECTIONS};
use crate::context::Context;
use crate::handle::PoolHandle;
use crate::services::db::attach;
use crate::services::error::Result;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DbConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_acquire_timeout_secs")]
    pub acquire_timeout_secs: u64,
}

fn default_max_connections() -> u32 {
    DEFAULT_MAX_CONNECTIONS
}

fn default_acquire_timeout_secs() -> u64 {
    DEFAULT_ACQUIRE_TIMEOUT_SECS
}

impl DbConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            acquire_timeout_secs: DEFAULT_ACQUIRE_TIMEOUT_SECS,
        }
    }

    /// Read `DATABASE_URL`, `DATABASE_MAX_CONNECTIONS` and
    /// `DATABASE_ACQUIRE_TIMEOUT_SECS`, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let url = lookup("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string());

        let max_connections = lookup("DATABASE_MAX_CONNECTIONS")
            .and_then(|s| s.parse().ok())
            .filter(|v| *v > 0)
            .unwrap_or(DEFAULT_MAX_CONNECTIONS);

        let acquire_timeout_secs = lookup("DATABASE_ACQUIRE_TIMEOUT_SECS")
            .and_then(|s| s.parse().ok())
            .filter(|v| *v > 0)
            .unwrap_or(DEFAULT_ACQUIRE_TIMEOUT_SECS);

        Self {
            url,
            max_connections,
            acquire_timeout_secs,
        }
    }

    /// Open a pool. The scheme of `url` picks the driver.
    pub async fn connect(&self) -> Result<AnyPool> {
        sqlx::any::install_default_drivers();

        let pool = AnyPoolOptions::new()
            .max_connections(self.max_connections)
            .acquire_timeout(Duration::from_secs(self.acquire_timeout_secs))
            .connect(&self.url)
            .await?;

        log::debug!("connected pool (max_connections={})", self.max_connections);
        Ok(pool)
    }

    /// Open a pool and attach it to a fresh root context.
    pub async fn connect_context(&self) -> Result<Context> {
        let pool = self.connect().await?;
        Ok(attach(&Context::new(), PoolHandle::new(pool)))
    }
}
