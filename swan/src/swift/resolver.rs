//! # Access Node Resolution
//!
//! The relay talks to exactly one access node per network, and finding it
//! costs a discovery round trip. [`AccessNodeResolver`] does that once and
//! remembers the answer for the life of the process.
//!
//! ## Concurrency
//!
//! The cache is a `parking_lot::RwLock<Option<String>>`. The lock is never
//! held across the discovery call, so two requests arriving before the
//! first resolution completes will both run discovery and both write the
//! cache. Both write the same answer; resolution is safe but not
//! exactly-once.

use std::sync::Arc;

use parking_lot::RwLock;

use super::discovery::AccessNodeDiscovery;
use crate::config::network_setup_hint;
use crate::error::{Result, SwanError};

/// Lazily discovered, cached access node for one network.
pub struct AccessNodeResolver {
    network: String,
    discovery: Arc<dyn AccessNodeDiscovery>,
    cached: RwLock<Option<String>>,
}

impl AccessNodeResolver {
    pub fn new(network: &str, discovery: Arc<dyn AccessNodeDiscovery>) -> Self {
        Self {
            network: network.to_string(),
            discovery,
            cached: RwLock::new(None),
        }
    }

    pub fn network(&self) -> &str {
        &self.network
    }

    /// Currently cached host, without triggering discovery.
    pub fn cached(&self) -> Option<String> {
        self.cached.read().clone()
    }

    /// Returns the access node, discovering it if nothing is cached.
    ///
    /// Discovery that yields no host is a configuration error naming the
    /// network and the setup endpoint. A discovery error that also yields
    /// no host is reported the same way: either way the operator has to
    /// start the network.
    pub async fn resolve(&self) -> Result<String> {
        if let Some(node) = self.cached() {
            return Ok(node);
        }

        let discovered = match self.discovery.access_node(&self.network).await {
            Ok(node) => node,
            Err(e) => {
                tracing::warn!(network = %self.network, error = %e, "access node discovery failed");
                None
            }
        };

        match discovered.filter(|n| !n.is_empty()) {
            Some(node) => {
                tracing::info!(network = %self.network, access_node = %node, "access node resolved");
                *self.cached.write() = Some(node.clone());
                Ok(node)
            }
            None => Err(SwanError::Configuration(network_setup_hint(&self.network))),
        }
    }

    /// Forgets the cached node so the next call rediscovers it.
    pub fn invalidate(&self) {
        *self.cached.write() = None;
    }
}
