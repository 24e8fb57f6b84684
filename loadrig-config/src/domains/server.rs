//! HTTP server configuration

use crate::error::ConfigResult;
use crate::validation::Validatable;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Server bind address
    pub bind_address: String,

    /// Server port
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1".to_string(),
            port: 8000,
        }
    }
}

impl ServerConfig {
    /// `address:port` string for binding
    pub fn socket_address(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }
}

impl Validatable for ServerConfig {
    fn validate(&self) -> ConfigResult<()> {
        self.require_text(&self.bind_address, "bind_address")?;
        self.require_port(self.port, "port")
    }

    fn domain_name(&self) -> &'static str {
        "server"
    }
}
