//! Destination resolution
//!
//! The engine asks a resolver to map the logical destination of every plain
//! request and every CONNECT tunnel to the endpoint it should actually dial.
//! The identity resolver is the default; deployments that front a service
//! directory plug in their own implementation of [`Resolve`].

use crate::common::Endpoint;
use crate::{Error, Result};
use async_trait::async_trait;
use std::collections::HashMap;

/// Maps a logical `host:port` to the endpoint to connect to
#[async_trait]
pub trait Resolve: Send + Sync {
    async fn resolve(&self, endpoint: &Endpoint) -> Result<Endpoint>;
}

/// Resolver that returns every endpoint unchanged
pub struct IdentityResolver;

#[async_trait]
impl Resolve for IdentityResolver {
    async fn resolve(&self, endpoint: &Endpoint) -> Result<Endpoint> {
        Ok(endpoint.clone())
    }
}

/// Resolver backed by a static host table from the configuration.
///
/// Hosts with a table entry are rewritten to the mapped endpoint; everything
/// else passes through unchanged so the proxy still serves arbitrary
/// destinations.
pub struct TableResolver {
    routes: HashMap<String, Endpoint>,
}

impl TableResolver {
    pub fn new(routes: HashMap<String, Endpoint>) -> Self {
        TableResolver { routes }
    }

    /// Build from the raw `host -> host[:port]` table in the config file
    pub fn from_routes(routes: &HashMap<String, String>) -> Result<Self> {
        let mut parsed = HashMap::with_capacity(routes.len());
        for (host, target) in routes {
            let endpoint = Endpoint::parse(target, 80)
                .map_err(|e| Error::config(format!("Bad route for '{}': {}", host, e)))?;
            parsed.insert(host.clone(), endpoint);
        }
        Ok(TableResolver::new(parsed))
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

#[async_trait]
impl Resolve for TableResolver {
    async fn resolve(&self, endpoint: &Endpoint) -> Result<Endpoint> {
        match self.routes.get(&endpoint.host) {
            Some(mapped) => Ok(mapped.clone()),
            None => Ok(endpoint.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_identity_resolver() {
        let ep = Endpoint::new("example.com", 443);
        let resolved = IdentityResolver.resolve(&ep).await.unwrap();
        assert_eq!(resolved, ep);
    }

    #[tokio::test]
    async fn test_table_resolver_maps_known_hosts() {
        let mut routes = HashMap::new();
        routes.insert("web.service".to_string(), "10.0.0.5:8080".to_string());
        let resolver = TableResolver::from_routes(&routes).unwrap();

        let resolved = resolver
            .resolve(&Endpoint::new("web.service", 80))
            .await
            .unwrap();
        assert_eq!(resolved, Endpoint::new("10.0.0.5", 8080));

        // Unknown hosts pass through
        let ep = Endpoint::new("example.com", 80);
        assert_eq!(resolver.resolve(&ep).await.unwrap(), ep);
    }

    #[test]
    fn test_table_resolver_rejects_bad_routes() {
        let mut routes = HashMap::new();
        routes.insert("web.service".to_string(), "10.0.0.5:not-a-port".to_string());
        assert!(TableResolver::from_routes(&routes).is_err());
    }
}
