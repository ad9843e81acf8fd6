use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::creator::CreatorRegistry;
use crate::config::creator_registration_hint;
use crate::error::{Result, SwanError};

/// Turns raw values into base64 OWIDs signed by the creator registered for
/// the requesting domain.
#[derive(Clone)]
pub struct OwidEncoder {
    registry: Arc<dyn CreatorRegistry>,
}

impl OwidEncoder {
    pub fn new(registry: Arc<dyn CreatorRegistry>) -> Self {
        Self { registry }
    }

    /// Signs `payload` as `domain`, dated `now`.
    ///
    /// Fails with a configuration error naming the registration endpoint
    /// when `domain` has no creator.
    pub async fn encode(&self, domain: &str, payload: Vec<u8>, now: DateTime<Utc>) -> Result<String> {
        let creator = self
            .registry
            .creator(domain)
            .await?
            .ok_or_else(|| SwanError::Configuration(creator_registration_hint(domain)))?;

        let mut owid = creator.create_owid(payload, now)?;
        creator.sign(&mut owid)?;
        owid.as_base64()
    }
}
