//! # SWIFT Results
//!
//! What an access node hands back from a decrypt call: an ordered list of
//! key/value pairs, each with its own expiry.
//!
//! ## Wire format
//!
//! All integers little-endian.
//!
//! ```text
//! u8   version (1)
//! u16  pair count
//! per pair:
//!   u16  key length, key bytes (UTF-8)
//!   i64  expires, unix seconds
//!   u32  value length, value bytes
//! ```
//!
//! Anything left over after the last pair is an error. A blob that parses
//! "mostly" is still a blob we can't vouch for.

use bytes::{Buf, BufMut, BytesMut};
use chrono::{DateTime, Utc};

use crate::error::{Result, SwanError};

/// Current results format version.
pub const RESULTS_VERSION: u8 = 1;

/// One decrypted field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pair {
    pub key: String,
    pub value: Vec<u8>,
    pub expires: DateTime<Utc>,
}

impl Pair {
    pub fn new(key: impl Into<String>, value: impl Into<Vec<u8>>, expires: DateTime<Utc>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            expires,
        }
    }
}

/// The decrypted fields of one blob, in blob order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultSet {
    pairs: Vec<Pair>,
}

impl ResultSet {
    pub fn new(pairs: Vec<Pair>) -> Self {
        Self { pairs }
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Pair> {
        self.pairs.iter()
    }

    /// First pair with `key`, if any.
    pub fn get(&self, key: &str) -> Option<&Pair> {
        self.pairs.iter().find(|p| p.key == key)
    }
}

impl IntoIterator for ResultSet {
    type Item = Pair;
    type IntoIter = std::vec::IntoIter<Pair>;

    fn into_iter(self) -> Self::IntoIter {
        self.pairs.into_iter()
    }
}

impl FromIterator<Pair> for ResultSet {
    fn from_iter<I: IntoIterator<Item = Pair>>(iter: I) -> Self {
        Self {
            pairs: iter.into_iter().collect(),
        }
    }
}

/// Parses a decrypted blob.
pub fn decode_results(bytes: &[u8]) -> Result<ResultSet> {
    let mut buf = bytes;

    need(buf, 3, "header")?;
    let version = buf.get_u8();
    if version != RESULTS_VERSION {
        return Err(invalid(format!("unsupported results version {}", version)));
    }
    let count = buf.get_u16_le() as usize;

    let mut pairs = Vec::with_capacity(count);
    for index in 0..count {
        need(buf, 2, "key length")?;
        let key_len = buf.get_u16_le() as usize;
        need(buf, key_len, "key")?;
        let key = std::str::from_utf8(&buf[..key_len])
            .map_err(|_| invalid(format!("key of pair {} is not UTF-8", index)))?
            .to_string();
        buf.advance(key_len);

        need(buf, 8, "expiry")?;
        let secs = buf.get_i64_le();
        let expires = DateTime::from_timestamp(secs, 0)
            .ok_or_else(|| invalid(format!("expiry of '{}' out of range", key)))?;

        need(buf, 4, "value length")?;
        let value_len = buf.get_u32_le() as usize;
        need(buf, value_len, "value")?;
        let value = buf[..value_len].to_vec();
        buf.advance(value_len);

        pairs.push(Pair {
            key,
            value,
            expires,
        });
    }

    if buf.has_remaining() {
        return Err(invalid(format!(
            "{} trailing bytes after {} pairs",
            buf.remaining(),
            count
        )));
    }

    Ok(ResultSet { pairs })
}

/// Serializes a result set in the access node format.
///
/// Fails if there are more pairs, or longer keys or values, than the
/// format's length fields can express.
pub fn encode_results(results: &ResultSet) -> Result<Vec<u8>> {
    let count = u16::try_from(results.len())
        .map_err(|_| SwanError::Encoding("too many pairs".to_string()))?;

    let mut buf = BytesMut::new();
    buf.put_u8(RESULTS_VERSION);
    buf.put_u16_le(count);
    for pair in results.iter() {
        let key_len = u16::try_from(pair.key.len())
            .map_err(|_| SwanError::Encoding(format!("key '{}' too long", pair.key)))?;
        let value_len = u32::try_from(pair.value.len())
            .map_err(|_| SwanError::Encoding(format!("value of '{}' too long", pair.key)))?;
        buf.put_u16_le(key_len);
        buf.put_slice(pair.key.as_bytes());
        buf.put_i64_le(pair.expires.timestamp());
        buf.put_u32_le(value_len);
        buf.put_slice(&pair.value);
    }
    Ok(buf.to_vec())
}

fn need(buf: &[u8], n: usize, what: &str) -> Result<()> {
    if buf.len() < n {
        return Err(invalid(format!("truncated results: missing {}", what)));
    }
    Ok(())
}

fn invalid(reason: String) -> SwanError {
    SwanError::Validation(reason)
}
