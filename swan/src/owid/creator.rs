//! # Creators & the Creator Registry
//!
//! A creator is a domain plus the Ed25519 key it signs OWIDs with. The
//! relay never chooses which creator signs a value: it is always the one
//! registered for the host the request came in on.
//!
//! The registry itself is an external capability (creators are registered
//! through the OWID setup flow, not here). [`MemoryCreatorRegistry`] is the
//! in-process implementation, seeded from settings at startup.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ed25519_dalek::{Signer, SigningKey, VerifyingKey, SECRET_KEY_LENGTH};
use parking_lot::RwLock;
use rand::rngs::OsRng;

use super::token::Owid;
use crate::error::{Result, SwanError};

/// An identity that signs OWIDs for one domain.
pub struct Creator {
    domain: String,
    name: String,
    signing_key: SigningKey,
}

impl Creator {
    /// Creates a creator with a fresh key from the OS RNG.
    pub fn generate(domain: &str, name: &str) -> Self {
        Self::from_signing_key(domain, name, SigningKey::generate(&mut OsRng))
    }

    /// Creates a creator from raw secret key bytes.
    pub fn from_secret(domain: &str, name: &str, secret: &[u8; SECRET_KEY_LENGTH]) -> Self {
        Self::from_signing_key(domain, name, SigningKey::from_bytes(secret))
    }

    /// Creates a creator from a hex-encoded secret key, as found in
    /// settings files.
    pub fn from_secret_hex(domain: &str, name: &str, secret_hex: &str) -> Result<Self> {
        let bytes = hex::decode(secret_hex.trim()).map_err(|e| {
            SwanError::Configuration(format!("invalid key for creator '{}': {}", domain, e))
        })?;
        let secret: [u8; SECRET_KEY_LENGTH] = bytes.try_into().map_err(|_| {
            SwanError::Configuration(format!(
                "invalid key for creator '{}': expected {} bytes",
                domain, SECRET_KEY_LENGTH
            ))
        })?;
        Ok(Self::from_secret(domain, name, &secret))
    }

    fn from_signing_key(domain: &str, name: &str, signing_key: SigningKey) -> Self {
        Self {
            domain: domain.to_string(),
            name: name.to_string(),
            signing_key,
        }
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Public half of the signing key, for verifiers.
    pub fn public_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }

    /// Starts an unsigned OWID for this creator's domain.
    pub fn create_owid(&self, payload: Vec<u8>, date: DateTime<Utc>) -> Result<Owid> {
        Owid::new(&self.domain, date, payload)
    }

    /// Signs `owid` in place.
    pub fn sign(&self, owid: &mut Owid) -> Result<()> {
        if owid.domain() != self.domain {
            return Err(SwanError::Encoding(format!(
                "creator '{}' cannot sign an OWID for '{}'",
                self.domain,
                owid.domain()
            )));
        }
        let signature = self.signing_key.sign(&owid.signed_bytes());
        owid.attach_signature(signature.to_bytes())
    }
}

// Key material stays out of logs.
impl fmt::Debug for Creator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Creator")
            .field("domain", &self.domain)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Looks up the creator registered for a domain.
#[async_trait]
pub trait CreatorRegistry: Send + Sync {
    /// Returns `Ok(None)` when nothing is registered for `domain`.
    async fn creator(&self, domain: &str) -> Result<Option<Arc<Creator>>>;
}

/// Creator registry held in memory.
#[derive(Default)]
pub struct MemoryCreatorRegistry {
    creators: RwLock<HashMap<String, Arc<Creator>>>,
}

impl MemoryCreatorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `creator`, replacing any creator for the same domain.
    pub fn register(&self, creator: Creator) -> Arc<Creator> {
        let creator = Arc::new(creator);
        self.creators
            .write()
            .insert(creator.domain().to_ascii_lowercase(), Arc::clone(&creator));
        creator
    }

    pub fn len(&self) -> usize {
        self.creators.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.creators.read().is_empty()
    }
}

#[async_trait]
impl CreatorRegistry for MemoryCreatorRegistry {
    async fn creator(&self, domain: &str) -> Result<Option<Arc<Creator>>> {
        Ok(self
            .creators
            .read()
            .get(&domain.to_ascii_lowercase())
            .cloned())
    }
}
