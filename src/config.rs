//! Configuration module

use crate::common::net::Endpoint;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::Path;

/// Default listen port
pub const DEFAULT_PORT: u16 = 9001;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Listen address
    pub listen: String,

    /// Host name used when an inbound request carries no host header
    #[serde(rename = "server-name")]
    pub server_name: String,

    /// Log level
    #[serde(rename = "log-level")]
    pub log_level: Option<String>,

    /// Static route table: logical host -> `host[:port]` to dial instead
    pub routes: HashMap<String, String>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            listen: format!("0.0.0.0:{}", DEFAULT_PORT),
            server_name: "localhost".to_string(),
            log_level: None,
            routes: HashMap::new(),
        }
    }
}

impl Config {
    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Load from string
    pub fn from_str(content: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        self.listen_addr()?;
        for (host, target) in &self.routes {
            Endpoint::parse(target, 80)
                .map_err(|e| Error::config(format!("Bad route for '{}': {}", host, e)))?;
        }
        Ok(())
    }

    /// The address to bind
    pub fn listen_addr(&self) -> Result<SocketAddr> {
        self.listen
            .parse()
            .map_err(|_| Error::config(format!("Invalid listen address: '{}'", self.listen)))
    }

    /// Override the listen port, keeping the configured interface
    pub fn set_port(&mut self, port: u16) -> Result<()> {
        let mut addr = self.listen_addr()?;
        addr.set_port(port);
        self.listen = addr.to_string();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.listen, "0.0.0.0:9001");
        assert_eq!(config.listen_addr().unwrap().port(), DEFAULT_PORT);
        assert!(config.routes.is_empty());
    }

    #[test]
    fn test_parse_yaml() {
        let config = Config::from_str(
            "listen: 127.0.0.1:8888\n\
             server-name: gateway.internal\n\
             routes:\n  web.service: 10.0.0.5:8080\n",
        )
        .unwrap();
        assert_eq!(config.listen_addr().unwrap().port(), 8888);
        assert_eq!(config.server_name, "gateway.internal");
        assert_eq!(config.routes["web.service"], "10.0.0.5:8080");
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        assert!(Config::from_str("listen: not-an-address\n").is_err());
        assert!(Config::from_str("routes:\n  a: 'b:c'\n").is_err());
    }

    #[test]
    fn test_set_port() {
        let mut config = Config::default();
        config.set_port(9002).unwrap();
        assert_eq!(config.listen, "0.0.0.0:9002");
    }
}
