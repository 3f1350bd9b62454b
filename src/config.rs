// src/config.rs

use std::env;
use std::net::SocketAddr;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing environment variable: {0}")]
    MissingEnvVar(&'static str),
    #[error("invalid value for {name}: {value}")]
    InvalidValue { name: &'static str, value: String },
}

/// Which `TimesheetStore` implementation backs the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    /// In-process store, for local runs and demos.
    Memory,
    /// The HRMS REST backend.
    Hrms,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: SocketAddr,
    pub backend: StoreBackend,
    pub hrms_base_url: Option<String>,
    pub hrms_api_token: Option<String>,
}

impl Config {
    /// Read configuration from the environment. `.env` files are loaded by
    /// the caller before this runs.
    pub fn from_env() -> Result<Config, ConfigError> {
        let bind_addr = env::var("TIMESHEET_BIND_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:3000".to_string());
        let bind_addr: SocketAddr =
            bind_addr
                .parse()
                .map_err(|_| ConfigError::InvalidValue {
                    name: "TIMESHEET_BIND_ADDR",
                    value: bind_addr.clone(),
                })?;

        let backend = match env::var("TIMESHEET_BACKEND")
            .unwrap_or_else(|_| "hrms".to_string())
            .to_ascii_lowercase()
            .as_str()
        {
            "memory" => StoreBackend::Memory,
            "hrms" => StoreBackend::Hrms,
            other => {
                return Err(ConfigError::InvalidValue {
                    name: "TIMESHEET_BACKEND",
                    value: other.to_string(),
                })
            }
        };

        let hrms_base_url = env::var("HRMS_BASE_URL").ok();
        if backend == StoreBackend::Hrms && hrms_base_url.is_none() {
            return Err(ConfigError::MissingEnvVar("HRMS_BASE_URL"));
        }

        Ok(Config {
            bind_addr,
            backend,
            hrms_base_url,
            hrms_api_token: env::var("HRMS_API_TOKEN").ok(),
        })
    }
}
