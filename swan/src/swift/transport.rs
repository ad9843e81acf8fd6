//! # Outbound HTTP
//!
//! Every call the relay makes to an access node is a plain GET whose body
//! we either return verbatim or decode. [`HttpGet`] is that one capability,
//! so the pipeline can run against an in-memory fake in tests and against
//! [`ReqwestTransport`] in production.
//!
//! Non-2xx answers become [`SwanError::Upstream`] with the URL, status and
//! body. Anything that prevents an answer (DNS, refused connection, TLS,
//! timeout) becomes [`SwanError::Network`].

use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;
use url::Url;

use crate::error::{Result, SwanError};

/// Issues a GET and returns the body of a successful response.
#[async_trait]
pub trait HttpGet: Send + Sync {
    async fn get(&self, url: &Url) -> Result<Bytes>;
}

/// [`HttpGet`] over a shared `reqwest` client with a bounded timeout.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Builds a transport whose calls give up after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SwanError::Configuration(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpGet for ReqwestTransport {
    async fn get(&self, url: &Url) -> Result<Bytes> {
        let started = Instant::now();
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| network_error(url, e))?;

        let status = response.status();
        let body = response.bytes().await.map_err(|e| network_error(url, e))?;

        tracing::debug!(
            host = url.host_str().unwrap_or_default(),
            path = url.path(),
            status = status.as_u16(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "access node call finished"
        );

        if !status.is_success() {
            return Err(SwanError::Upstream {
                url: url.to_string(),
                status: status.as_u16(),
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }
        Ok(body)
    }
}

fn network_error(url: &Url, err: reqwest::Error) -> SwanError {
    let reason = if err.is_timeout() {
        format!("timed out: {}", err)
    } else {
        err.to_string()
    };
    SwanError::Network {
        url: url.to_string(),
        reason,
    }
}
