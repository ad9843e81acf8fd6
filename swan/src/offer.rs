//! # Offer IDs
//!
//! An offer ID records that a placement on a publisher's page was offered
//! to a given browser under given preferences. It is signed by the
//! publisher's creator like any other OWID, with a JSON payload.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, SwanError};
use crate::owid::OwidEncoder;
use crate::swift::QueryParams;

pub const PLACEMENT_PARAM: &str = "placement";
pub const PUBDOMAIN_PARAM: &str = "pubdomain";

/// Payload of an offer ID OWID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfferId {
    pub placement: String,
    pub pubdomain: String,
    pub uuid: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cbid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferences: Option<String>,
}

impl OfferId {
    /// Builds an offer from request parameters with a fresh UUID.
    ///
    /// `placement` and `pubdomain` are required; blank optional values are
    /// treated as absent.
    pub fn from_params(params: &QueryParams) -> Result<Self> {
        Ok(Self {
            placement: required(params, PLACEMENT_PARAM)?,
            pubdomain: required(params, PUBDOMAIN_PARAM)?,
            uuid: Uuid::new_v4(),
            cbid: optional(params, "cbid"),
            sid: optional(params, "sid"),
            preferences: optional(params, "preferences"),
        })
    }

    pub fn to_json(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| SwanError::Encoding(e.to_string()))
    }

    /// Signs this offer as `domain` and returns the base64 OWID.
    pub async fn sign(&self, encoder: &OwidEncoder, domain: &str, now: DateTime<Utc>) -> Result<String> {
        encoder.encode(domain, self.to_json()?, now).await
    }
}

fn required(params: &QueryParams, name: &str) -> Result<String> {
    optional(params, name).ok_or_else(|| SwanError::invalid_parameter(name, "required"))
}

fn optional(params: &QueryParams, name: &str) -> Option<String> {
    params
        .get(name)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
