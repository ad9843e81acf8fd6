//! # Decode Pipeline
//!
//! The heart of the relay. A publisher hands us a blob only the storage
//! network can read; we hand back every value inside it as an OWID the
//! publisher (and anyone downstream) can verify against our domain.
//!
//! ```text
//! data ──► Decryptor ──► decode_results ──► per pair, one pass:
//!                                             email? → sid = hash(email)
//!                                             sign as OWID for domain
//!                                             expires = now + timeout
//! ```
//!
//! `now` is read once per request, so every value in a response carries the
//! same expiry and the same OWID date.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::config::DATA_PARAM;
use crate::error::{Result, SwanError};
use crate::owid::OwidEncoder;
use crate::sid::SidHasher;
use crate::swift::{decode_results, Decryptor};

/// Field that must never leave the relay in plain text.
pub const EMAIL_FIELD: &str = "email";

/// Name the hashed email travels under.
pub const SID_FIELD: &str = "sid";

// ---------------------------------------------------------------------------
// Signed Values
// ---------------------------------------------------------------------------

/// One re-signed field, as returned to the publisher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SignedValue {
    pub key: String,
    /// Base64 OWID.
    pub value: String,
    /// RFC 3339, UTC.
    pub expires: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Expiry
// ---------------------------------------------------------------------------

/// Applies one lifetime to every value of a response.
#[derive(Debug, Clone, Copy)]
pub struct ExpiryStamper {
    timeout: Duration,
}

impl ExpiryStamper {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// `now + timeout`, or a configuration error when that falls outside
    /// the representable range.
    pub fn expires_at(&self, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
        now.checked_add_signed(self.timeout).ok_or_else(|| {
            SwanError::Configuration(format!(
                "value timeout of {}s overflows the expiry date",
                self.timeout.num_seconds()
            ))
        })
    }

    /// Overwrites every expiry with `now + timeout`.
    pub fn stamp(&self, values: &mut [SignedValue], now: DateTime<Utc>) -> Result<()> {
        let expires = self.expires_at(now)?;
        for value in values {
            value.expires = expires;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct DecodePipeline {
    decryptor: Arc<dyn Decryptor>,
    encoder: OwidEncoder,
    sid: Arc<SidHasher>,
    stamper: ExpiryStamper,
}

impl DecodePipeline {
    pub fn new(
        decryptor: Arc<dyn Decryptor>,
        encoder: OwidEncoder,
        sid: Arc<SidHasher>,
        stamper: ExpiryStamper,
    ) -> Self {
        Self {
            decryptor,
            encoder,
            sid,
            stamper,
        }
    }

    /// Decrypts `data` and re-signs every value as `domain`.
    pub async fn decode(&self, data: &str, domain: &str) -> Result<Vec<SignedValue>> {
        self.decode_at(data, domain, Utc::now()).await
    }

    /// As [`decode`](Self::decode), with the request time supplied.
    pub async fn decode_at(
        &self,
        data: &str,
        domain: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<SignedValue>> {
        if data.trim().is_empty() {
            return Err(SwanError::invalid_parameter(DATA_PARAM, "required"));
        }

        let raw = self.decryptor.decrypt(data).await?;
        let results = decode_results(&raw)?;
        let expires = self.stamper.expires_at(now)?;

        let mut values = Vec::with_capacity(results.len());
        for pair in results {
            let (key, payload) = if pair.key == EMAIL_FIELD {
                let email = std::str::from_utf8(&pair.value).map_err(|_| {
                    SwanError::Validation("email value is not valid UTF-8".into())
                })?;
                (SID_FIELD.to_string(), self.sid.hash(email).to_vec())
            } else {
                (pair.key, pair.value)
            };

            let value = self.encoder.encode(domain, payload, now).await?;
            values.push(SignedValue {
                key,
                value,
                expires,
            });
        }

        tracing::debug!(domain, count = values.len(), "decoded results re-signed");
        Ok(values)
    }
}
