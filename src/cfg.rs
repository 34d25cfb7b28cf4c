// SPDX-License-Identifier: MIT

use std::net::SocketAddr;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// The full set of options recognized by the relay, loaded once at startup.
///
/// Precedence (lowest to highest): compiled-in [`Default`], `config.toml` in the
/// working directory if present, then `RELAY_*` environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Configuration {
    pub poll_interval_secs: u64,
    pub max_retries: u32,
    pub retry_ladder_secs: Vec<u64>,
    pub http_timeout_secs: u64,
    pub fast_path_enabled: bool,
    pub database_url: String,
    pub redis_dsn: Option<String>,
    pub bind_address: SocketAddr,
    pub worker_count: usize,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            poll_interval_secs: 5,
            max_retries: 5,
            retry_ladder_secs: vec![60, 300, 900, 3600, 21600],
            http_timeout_secs: 30,
            fast_path_enabled: true,
            database_url: "sqlite::memory:".to_owned(),
            redis_dsn: None,
            bind_address: "0.0.0.0:8071".parse().expect("valid default bind address"),
            worker_count: 1,
        }
    }
}

impl Configuration {
    pub fn poll_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.poll_interval_secs)
    }

    pub fn http_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.http_timeout_secs)
    }
}

/// Load configuration from the environment, optionally merging a local `config.toml`.
/// Missing `.env`/`config.toml` files are not an error -- only malformed ones are.
pub fn load() -> Result<Configuration> {
    dotenvy::dotenv().ok();

    let cfg = Figment::from(Serialized::defaults(Configuration::default()))
        .merge(Toml::file("config.toml"))
        .merge(Env::prefixed("RELAY_"))
        .extract()?;

    Ok(cfg)
}
