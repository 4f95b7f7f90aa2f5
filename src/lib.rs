//! Relaygate - forward HTTP proxy with pluggable name resolution
//!
//! Accepts plain HTTP requests and CONNECT tunnels, resolves each logical
//! destination through a [`resolver::Resolve`] implementation, and relays
//! traffic to the resolved backend.
//!
//! # Architecture
//!
//! ```text
//! +-----------+     +---------------+     +-------------------+
//! | inbound/  | --> |    proxy/     | --> | resolver (trait)  |
//! | (accept)  |     | (translation) |     | identity | table  |
//! +-----------+     +-------+-------+     +-------------------+
//!                           |
//!              +------------+------------+
//!              |                         |
//!       +------v------+          +------v------+
//!       |  forward    |          |   tunnel    |
//!       | (plain HTTP)|          |  (CONNECT)  |
//!       +-------------+          +-------------+
//! ```

pub mod common;
pub mod config;
pub mod inbound;
pub mod proxy;
pub mod resolver;

pub use common::error::{Error, Result};
pub use config::Config;

use inbound::{HttpListener, InboundListener};
use proxy::ProxyEngine;
use resolver::{IdentityResolver, Resolve, TableResolver};
use std::io;
use std::sync::Arc;
use tracing::info;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Gateway instance wiring resolver, engine and listener together
pub struct Gateway {
    listener: Arc<HttpListener>,
}

impl Gateway {
    /// Create a new Gateway from configuration
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;

        let resolver: Arc<dyn Resolve> = if config.routes.is_empty() {
            Arc::new(IdentityResolver)
        } else {
            let table = TableResolver::from_routes(&config.routes)?;
            info!("loaded {} routes", table.len());
            Arc::new(table)
        };

        let engine = Arc::new(ProxyEngine::new(resolver, config.server_name.clone()));
        let listener = Arc::new(HttpListener::new(config.listen_addr()?, engine));

        Ok(Gateway { listener })
    }

    /// Serve until ctrl-c. A bind failure surfaces as an error.
    pub async fn run(&self) -> Result<()> {
        let listener = self.listener.clone();
        let mut serving = tokio::spawn(async move { listener.start().await });

        tokio::select! {
            res = &mut serving => match res {
                Ok(result) => result,
                Err(e) => Err(Error::Io(io::Error::new(
                    io::ErrorKind::Other,
                    format!("listener task failed: {}", e),
                ))),
            },
            _ = tokio::signal::ctrl_c() => {
                info!("received shutdown signal");
                self.listener.stop().await?;
                serving.abort();
                info!("gateway stopped");
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_gateway_from_default_config() {
        assert!(Gateway::new(Config::default()).is_ok());
    }

    #[test]
    fn test_gateway_rejects_bad_config() {
        let mut config = Config::default();
        config.listen = "nonsense".to_string();
        assert!(Gateway::new(config).is_err());
    }
}
