//! fwmp-tf specific configuration

use crate::error::{Error, Result};
use fwmp_common::config::resolve_setting;

pub const DEFAULT_PORT: u16 = 5920;
pub const DEFAULT_BACKEND_URL: &str = "http://127.0.0.1:9400";

/// Task Fulfillment service configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub backend_url: String,
    pub api_token: Option<String>,
}

impl Config {
    /// Resolve configuration with the standard priority order
    /// (CLI > environment > TOML file > compiled default).
    pub fn resolve(
        cli_port: Option<u16>,
        cli_backend_url: Option<&str>,
        cli_api_token: Option<&str>,
    ) -> Result<Self> {
        let port = match resolve_setting(
            cli_port.map(|p| p.to_string()).as_deref(),
            "FWMP_TF_PORT",
            "port",
        ) {
            Some(raw) => raw
                .parse::<u16>()
                .map_err(|_| Error::Config(format!("invalid port: {}", raw)))?,
            None => DEFAULT_PORT,
        };

        let backend_url = resolve_setting(cli_backend_url, "FWMP_BACKEND_URL", "backend_url")
            .unwrap_or_else(|| DEFAULT_BACKEND_URL.to_string());

        let api_token = resolve_setting(cli_api_token, "FWMP_API_TOKEN", "api_token");

        Ok(Self {
            port,
            backend_url,
            api_token,
        })
    }
}
