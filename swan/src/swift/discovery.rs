use async_trait::async_trait;

use crate::error::Result;

/// Finds the access node currently serving a network.
#[async_trait]
pub trait AccessNodeDiscovery: Send + Sync {
    /// `Ok(None)` means the network has no access node yet.
    async fn access_node(&self, network: &str) -> Result<Option<String>>;
}

/// Discovery answering from configuration.
///
/// The storage network's own election is out of reach of the relay, so
/// operators pin the access node in settings. An empty or missing host is
/// reported as "no access node".
#[derive(Debug, Clone, Default)]
pub struct StaticDiscovery {
    host: Option<String>,
}

impl StaticDiscovery {
    pub fn new(host: Option<String>) -> Self {
        let host = host
            .map(|h| h.trim().to_string())
            .filter(|h| !h.is_empty());
        Self { host }
    }
}

#[async_trait]
impl AccessNodeDiscovery for StaticDiscovery {
    async fn access_node(&self, _network: &str) -> Result<Option<String>> {
        Ok(self.host.clone())
    }
}
