//! # Access Gate
//!
//! Every SWAN endpoint is called by a publisher the operator has issued an
//! access key to. The gate runs before anything else in a handler: a
//! denied request never reaches the validator, the resolver or the network.

use std::collections::HashSet;

use async_trait::async_trait;

use crate::config::ACCESS_KEY_PARAM;
use crate::error::{Result, SwanError};
use crate::swift::QueryParams;

/// Decides whether an inbound request may use the service.
#[async_trait]
pub trait Access: Send + Sync {
    /// `Ok(false)` denies the request.
    async fn allowed(&self, params: &QueryParams) -> Result<bool>;
}

/// Runs `access` and turns a denial into [`SwanError::Authorization`].
pub async fn authorize(access: &dyn Access, params: &QueryParams) -> Result<()> {
    if access.allowed(params).await? {
        Ok(())
    } else {
        Err(SwanError::Authorization)
    }
}

/// Allow-list of access keys, read from the `accessKey` parameter.
#[derive(Debug, Clone, Default)]
pub struct AccessKeys {
    keys: HashSet<String>,
}

impl AccessKeys {
    pub fn new<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let keys = keys
            .into_iter()
            .map(Into::into)
            .map(|k: String| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .collect();
        Self { keys }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

#[async_trait]
impl Access for AccessKeys {
    async fn allowed(&self, params: &QueryParams) -> Result<bool> {
        Ok(params
            .get(ACCESS_KEY_PARAM)
            .map(|key| self.keys.contains(key))
            .unwrap_or(false))
    }
}
