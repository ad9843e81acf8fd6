//! # SWIFT Access Node Client
//!
//! The two access node operations the relay depends on, as capabilities:
//!
//! - [`Decryptor`]: turn an opaque blob back into a results payload.
//! - [`StorageOperationClient`]: start a storage operation and get the
//!   URL of its first hop.
//!
//! [`SwiftClient`] implements both over any [`HttpGet`], addressing
//! whichever access node the [`AccessNodeResolver`] currently knows about.
//! A node that cannot be reached at all is forgotten, so the next request
//! runs discovery again.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use url::Url;

use super::resolver::AccessNodeResolver;
use super::transport::HttpGet;
use crate::config::{ACCESS_KEY_PARAM, DATA_PARAM, DECRYPT_PATH};
use crate::error::{Result, SwanError};

/// Decrypts an opaque results blob.
#[async_trait]
pub trait Decryptor: Send + Sync {
    async fn decrypt(&self, data: &str) -> Result<Bytes>;
}

/// Starts a storage operation from a fully composed create URL.
#[async_trait]
pub trait StorageOperationClient: Send + Sync {
    /// Returns the response body verbatim: the URL of the next hop.
    async fn create_operation(&self, url: &Url) -> Result<String>;
}

/// Builds `{scheme}://{host}` with an empty path.
pub fn access_node_url(scheme: &str, host: &str) -> Result<Url> {
    Url::parse(&format!("{}://{}", scheme, host)).map_err(|e| {
        SwanError::Configuration(format!(
            "access node '{}' with scheme '{}' is not a valid URL: {}",
            host, scheme, e
        ))
    })
}

/// Builds the decrypt URL for `data` on `host`.
pub fn decrypt_url(scheme: &str, host: &str, data: &str, access_key: &str) -> Result<Url> {
    let mut url = access_node_url(scheme, host)?;
    url.set_path(DECRYPT_PATH);
    url.query_pairs_mut()
        .append_pair(DATA_PARAM, data)
        .append_pair(ACCESS_KEY_PARAM, access_key);
    Ok(url)
}

/// Access node client over an injected transport.
#[derive(Clone)]
pub struct SwiftClient {
    scheme: String,
    access_key: String,
    resolver: Arc<AccessNodeResolver>,
    transport: Arc<dyn HttpGet>,
}

impl SwiftClient {
    pub fn new(
        scheme: &str,
        access_key: &str,
        resolver: Arc<AccessNodeResolver>,
        transport: Arc<dyn HttpGet>,
    ) -> Self {
        Self {
            scheme: scheme.to_string(),
            access_key: access_key.to_string(),
            resolver,
            transport,
        }
    }

    async fn get(&self, url: &Url) -> Result<Bytes> {
        let outcome = self.transport.get(url).await;
        if let Err(SwanError::Network { reason, .. }) = &outcome {
            tracing::warn!(
                network = self.resolver.network(),
                %reason,
                "access node unreachable, forgetting it"
            );
            self.resolver.invalidate();
        }
        outcome
    }
}

#[async_trait]
impl Decryptor for SwiftClient {
    async fn decrypt(&self, data: &str) -> Result<Bytes> {
        let node = self.resolver.resolve().await?;
        let url = decrypt_url(&self.scheme, &node, data, &self.access_key)?;
        self.get(&url).await
    }
}

#[async_trait]
impl StorageOperationClient for SwiftClient {
    async fn create_operation(&self, url: &Url) -> Result<String> {
        let body = self.get(url).await?;
        String::from_utf8(body.to_vec()).map_err(|_| {
            SwanError::Validation(format!("'{}' returned a non UTF-8 storage URL", url))
        })
    }
}
