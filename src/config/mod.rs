//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;

/// Port used when neither `PORT` nor `SERVER_ADDR` is set
pub const DEFAULT_PORT: u16 = 3001;

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Allowed client origins for CORS, `*` for any
    pub client_origin: String,
    /// Leave every joined match when a connection drops
    pub auto_leave_on_disconnect: bool,
    /// Match result hook settings
    pub settlement: SettlementConfig,
}

/// Settlement contract details. Only forwarded with match results; the
/// server never calls the contract itself.
#[derive(Clone, Debug)]
pub struct SettlementConfig {
    pub contract_address: String,
    pub rpc_url: String,
    /// Where to POST match results, if anywhere
    pub webhook_url: Option<String>,
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self {
            contract_address: "0x7228FC125EF5b4598315CEc74c37C16Fb2100447".to_string(),
            rpc_url: "https://polygon-rpc.com".to_string(),
            webhook_url: None,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            log_level: "info".to_string(),
            client_origin: "*".to_string(),
            auto_leave_on_disconnect: false,
            settlement: SettlementConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        // Hosting platforms provide PORT; fall back to SERVER_ADDR or the default
        let server_addr = match lookup("PORT") {
            Some(port) => {
                let port: u16 = port
                    .trim()
                    .parse()
                    .map_err(|_| ConfigError::InvalidPort(port.clone()))?;
                SocketAddr::from(([0, 0, 0, 0], port))
            }
            None => match lookup("SERVER_ADDR") {
                Some(addr) => addr.parse().map_err(|_| ConfigError::InvalidAddress)?,
                None => defaults.server_addr,
            },
        };

        let auto_leave_on_disconnect = match lookup("AUTO_LEAVE_ON_DISCONNECT") {
            Some(value) => parse_bool(&value)
                .ok_or(ConfigError::InvalidBool("AUTO_LEAVE_ON_DISCONNECT", value))?,
            None => defaults.auto_leave_on_disconnect,
        };

        let settlement = SettlementConfig {
            contract_address: lookup("CONTRACT_ADDRESS")
                .unwrap_or(defaults.settlement.contract_address),
            rpc_url: lookup("RPC_URL").unwrap_or(defaults.settlement.rpc_url),
            webhook_url: lookup("RESULT_WEBHOOK_URL").filter(|url| !url.trim().is_empty()),
        };

        Ok(Self {
            server_addr,
            log_level: lookup("LOG_LEVEL").unwrap_or(defaults.log_level),
            client_origin: lookup("CLIENT_ORIGIN").unwrap_or(defaults.client_origin),
            auto_leave_on_disconnect,
            settlement,
        })
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid PORT value: {0}")]
    InvalidPort(String),

    #[error("Invalid server address format")]
    InvalidAddress,

    #[error("Invalid boolean for {0}: {1}")]
    InvalidBool(&'static str, String),
}
