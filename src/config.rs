// src/config.rs
use crate::error::ConfigError;
use ::config::{Config as Layered, Environment, Map};
use serde::Deserialize;
use std::net::{IpAddr, SocketAddr};

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 5000;
pub const DEFAULT_SCYLLA_URI: &str = "127.0.0.1:9042";
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:5000/api/portfolio";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    Memory,
    Scylla { uri: String },
}

/// Flat settings as read from the environment (`HOST`, `PORT`,
/// `STORE_BACKEND`, `SCYLLA_URI`, `API_BASE_URL`).
#[derive(Debug, Deserialize)]
struct Settings {
    host: IpAddr,
    port: u16,
    store_backend: String,
    scylla_uri: String,
    api_base_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub host: IpAddr,
    pub port: u16,
    pub store: StoreBackend,
    pub api_base_url: String,
}

impl Config {
    /// Reads the process environment. Call `dotenvy::dotenv()` first to pick
    /// up a `.env` file.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load(Environment::default())
    }

    /// Same as `from_env`, but reads variables from `vars` instead of the
    /// process environment.
    pub fn from_vars(vars: Map<String, String>) -> Result<Self, ConfigError> {
        Self::load(Environment::default().source(Some(vars)))
    }

    fn load(env: Environment) -> Result<Self, ConfigError> {
        let settings: Settings = Layered::builder()
            .set_default("host", DEFAULT_HOST)?
            .set_default("port", i64::from(DEFAULT_PORT))?
            .set_default("store_backend", "memory")?
            .set_default("scylla_uri", DEFAULT_SCYLLA_URI)?
            .set_default("api_base_url", DEFAULT_API_BASE_URL)?
            .add_source(env.try_parsing(true))
            .build()?
            .try_deserialize()?;

        let store = match settings.store_backend.to_lowercase().as_str() {
            "memory" => StoreBackend::Memory,
            "scylla" => StoreBackend::Scylla {
                uri: settings.scylla_uri,
            },
            _ => {
                return Err(ConfigError::Invalid {
                    name: "STORE_BACKEND",
                    value: settings.store_backend,
                    reason: "expected `memory` or `scylla`".to_string(),
                })
            }
        };

        Ok(Config {
            host: settings.host,
            port: settings.port,
            store,
            api_base_url: settings.api_base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}
