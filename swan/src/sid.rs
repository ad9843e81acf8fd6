//! # SID Derivation
//!
//! A SID is the pseudonymous stand-in for an email address. It is the only
//! form in which an email ever leaves the relay: the decode pipeline swaps
//! every `email` value for its SID before signing.
//!
//! An email address is a quasi-identifier with a small, guessable input
//! space. An unkeyed hash of it can be reversed by hashing a list of
//! plausible addresses and comparing. Two algorithms are offered:
//!
//! - **BLAKE3 keyed**: the default for deployments. Reversing a SID means
//!   knowing the operator secret first.
//! - **SHA-256**: unkeyed. Only for interoperating with parties that must
//!   derive the same SID without sharing a secret.
//!
//! Both produce [`SID_LENGTH`] bytes.

use std::fmt;
use std::str::FromStr;

use sha2::{Digest, Sha256};

use crate::error::{Result, SwanError};

/// SID output length in bytes.
pub const SID_LENGTH: usize = 32;

/// A hashing algorithm for SIDs.
#[derive(Clone, PartialEq, Eq)]
pub enum SidAlgorithm {
    /// BLAKE3 in keyed mode under a 32-byte operator secret.
    Blake3Keyed([u8; 32]),
    /// Plain SHA-256.
    Sha256,
}

impl SidAlgorithm {
    /// Builds a keyed algorithm from a hex-encoded 32-byte secret.
    pub fn blake3_from_hex(secret_hex: &str) -> Result<Self> {
        let bytes = hex::decode(secret_hex.trim())
            .map_err(|e| SwanError::Configuration(format!("invalid SID secret: {}", e)))?;
        let secret: [u8; 32] = bytes.try_into().map_err(|_| {
            SwanError::Configuration("invalid SID secret: expected 32 bytes".to_string())
        })?;
        Ok(SidAlgorithm::Blake3Keyed(secret))
    }

    /// Name used in settings files and logs.
    pub fn name(&self) -> &'static str {
        match self {
            SidAlgorithm::Blake3Keyed(_) => "blake3-keyed",
            SidAlgorithm::Sha256 => "sha256",
        }
    }
}

// Never print the secret.
impl fmt::Debug for SidAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Algorithm names accepted in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SidAlgorithmName {
    Blake3Keyed,
    Sha256,
}

impl FromStr for SidAlgorithmName {
    type Err = SwanError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "blake3-keyed" | "blake3" => Ok(SidAlgorithmName::Blake3Keyed),
            "sha256" | "sha-256" => Ok(SidAlgorithmName::Sha256),
            other => Err(SwanError::Configuration(format!(
                "unknown SID algorithm '{}'",
                other
            ))),
        }
    }
}

/// Derives SIDs from email addresses.
#[derive(Debug, Clone)]
pub struct SidHasher {
    algorithm: SidAlgorithm,
}

impl SidHasher {
    pub fn new(algorithm: SidAlgorithm) -> Self {
        Self { algorithm }
    }

    pub fn algorithm(&self) -> &SidAlgorithm {
        &self.algorithm
    }

    /// Hashes an email address into a SID.
    ///
    /// The address is trimmed and lower-cased first so that
    /// `Alice@Example.com ` and `alice@example.com` share a SID.
    pub fn hash(&self, email: &str) -> [u8; SID_LENGTH] {
        let normalized = email.trim().to_lowercase();
        match &self.algorithm {
            SidAlgorithm::Blake3Keyed(secret) => {
                *blake3::keyed_hash(secret, normalized.as_bytes()).as_bytes()
            }
            SidAlgorithm::Sha256 => {
                let mut hasher = Sha256::new();
                hasher.update(normalized.as_bytes());
                let mut output = [0u8; SID_LENGTH];
                output.copy_from_slice(&hasher.finalize());
                output
            }
        }
    }
}
