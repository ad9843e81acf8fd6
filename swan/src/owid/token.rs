//! # OWID Tokens
//!
//! An Open Web ID binds a payload to the domain that created it and to the
//! minute it was created, under that domain's signature. Anyone holding the
//! creator's public key can check it without talking to us.
//!
//! ## Wire format
//!
//! ```text
//! u8        version (1)
//! [u8]      domain, UTF-8, NUL terminated
//! u32 LE    minutes since 2020-01-01T00:00:00Z
//! u32 LE    payload length
//! [u8]      payload
//! [u8; 64]  Ed25519 signature over every preceding byte
//! ```
//!
//! The binary form is carried as standard base64.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::{Buf, BufMut, BytesMut};
use chrono::{DateTime, Duration, TimeZone, Utc};
use ed25519_dalek::{Signature, Verifier, VerifyingKey, SIGNATURE_LENGTH};

use crate::error::{Result, SwanError};

/// Current OWID format version.
pub const OWID_VERSION: u8 = 1;

/// Start of the OWID clock.
pub fn owid_epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0)
        .single()
        .unwrap_or_default()
}

/// A single OWID. Unsigned when created, immutable once signed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Owid {
    version: u8,
    domain: String,
    minutes: u32,
    payload: Vec<u8>,
    signature: Option<[u8; SIGNATURE_LENGTH]>,
}

impl Owid {
    /// Creates an unsigned OWID for `domain` dated `date`.
    ///
    /// The date is truncated to the minute. Dates before the OWID epoch, or
    /// too far after it to fit in 32 bits of minutes, are rejected.
    pub fn new(domain: &str, date: DateTime<Utc>, payload: Vec<u8>) -> Result<Self> {
        if domain.is_empty() || domain.contains('\0') {
            return Err(SwanError::Encoding(format!(
                "domain '{}' cannot be used in an OWID",
                domain.escape_default()
            )));
        }
        if u32::try_from(payload.len()).is_err() {
            return Err(SwanError::Encoding("payload too large".to_string()));
        }
        let minutes = (date - owid_epoch()).num_minutes();
        let minutes = u32::try_from(minutes)
            .map_err(|_| SwanError::Encoding(format!("date {} outside OWID range", date)))?;

        Ok(Self {
            version: OWID_VERSION,
            domain: domain.to_string(),
            minutes,
            payload,
            signature: None,
        })
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn version(&self) -> u8 {
        self.version
    }

    /// Creation date, to the minute.
    pub fn date(&self) -> DateTime<Utc> {
        owid_epoch() + Duration::minutes(i64::from(self.minutes))
    }

    pub fn is_signed(&self) -> bool {
        self.signature.is_some()
    }

    pub fn signature(&self) -> Option<&[u8; SIGNATURE_LENGTH]> {
        self.signature.as_ref()
    }

    /// The bytes covered by the signature.
    pub fn signed_bytes(&self) -> Vec<u8> {
        let mut buf = BytesMut::with_capacity(self.domain.len() + self.payload.len() + 10);
        buf.put_u8(self.version);
        buf.put_slice(self.domain.as_bytes());
        buf.put_u8(0);
        buf.put_u32_le(self.minutes);
        buf.put_u32_le(self.payload.len() as u32);
        buf.put_slice(&self.payload);
        buf.to_vec()
    }

    /// Attaches a signature. Fails if one is already present.
    pub(crate) fn attach_signature(&mut self, signature: [u8; SIGNATURE_LENGTH]) -> Result<()> {
        if self.signature.is_some() {
            return Err(SwanError::Encoding("OWID is already signed".to_string()));
        }
        self.signature = Some(signature);
        Ok(())
    }

    /// Checks the signature against `public_key`. Unsigned tokens never
    /// verify.
    pub fn verify(&self, public_key: &VerifyingKey) -> bool {
        match &self.signature {
            Some(bytes) => {
                let signature = Signature::from_bytes(bytes);
                public_key
                    .verify(&self.signed_bytes(), &signature)
                    .is_ok()
            }
            None => false,
        }
    }

    /// Full binary form. Only signed tokens can be serialized.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let signature = self
            .signature
            .ok_or_else(|| SwanError::Encoding("OWID must be signed before encoding".into()))?;
        let mut bytes = self.signed_bytes();
        bytes.extend_from_slice(&signature);
        Ok(bytes)
    }

    /// Base64 form, as embedded in responses.
    pub fn as_base64(&self) -> Result<String> {
        Ok(STANDARD.encode(self.to_bytes()?))
    }

    /// Parses the binary form.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut buf = bytes;

        if !buf.has_remaining() {
            return Err(malformed("empty input"));
        }
        let version = buf.get_u8();
        if version != OWID_VERSION {
            return Err(malformed(&format!("unsupported version {}", version)));
        }

        let nul = buf
            .iter()
            .position(|b| *b == 0)
            .ok_or_else(|| malformed("unterminated domain"))?;
        let domain = std::str::from_utf8(&buf[..nul])
            .map_err(|_| malformed("domain is not UTF-8"))?
            .to_string();
        buf.advance(nul + 1);

        if buf.remaining() < 8 {
            return Err(malformed("truncated header"));
        }
        let minutes = buf.get_u32_le();
        let payload_len = buf.get_u32_le() as usize;

        if buf.remaining() != payload_len + SIGNATURE_LENGTH {
            return Err(malformed("length mismatch"));
        }
        let payload = buf[..payload_len].to_vec();
        buf.advance(payload_len);

        let mut signature = [0u8; SIGNATURE_LENGTH];
        buf.copy_to_slice(&mut signature);

        Ok(Self {
            version,
            domain,
            minutes,
            payload,
            signature: Some(signature),
        })
    }

    /// Parses the base64 form.
    pub fn from_base64(encoded: &str) -> Result<Self> {
        let bytes = STANDARD
            .decode(encoded.trim())
            .map_err(|e| malformed(&format!("invalid base64: {}", e)))?;
        Self::from_bytes(&bytes)
    }
}

fn malformed(reason: &str) -> SwanError {
    SwanError::Validation(format!("malformed OWID: {}", reason))
}
