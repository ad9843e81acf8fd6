//! # Relay Configuration & Constants
//!
//! Every magic string the relay shares with the SWIFT storage network
//! lives here. The paths and the dataset name are part of the wire
//! contract with access nodes; changing them breaks every deployed node
//! at once, so don't.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SwanError};

// ---------------------------------------------------------------------------
// SWIFT Wire Contract
// ---------------------------------------------------------------------------

/// Access node path that decrypts an opaque results blob.
pub const DECRYPT_PATH: &str = "/swift/api/v1/decrypt";

/// Access node path that starts a new storage operation and answers with the
/// URL of the first hop.
pub const CREATE_PATH: &str = "/swift/api/v1/create";

/// Logical dataset every SWAN storage operation writes to.
pub const DATASET_TABLE: &str = "swan";

/// Query parameter carrying the dataset name on create requests.
pub const TABLE_PARAM: &str = "table";

/// Query parameter carrying the encrypted blob.
pub const DATA_PARAM: &str = "data";

/// Query parameter carrying an access key, both inbound and outbound.
pub const ACCESS_KEY_PARAM: &str = "accessKey";

/// Date format used in composite `field<date` parameter names.
pub const COMPOSITE_DATE_FORMAT: &str = "%Y-%m-%d";

// ---------------------------------------------------------------------------
// SWAN Routes
// ---------------------------------------------------------------------------

pub const FETCH_ROUTE: &str = "/swan/api/v1/fetch";
pub const UPDATE_ROUTE: &str = "/swan/api/v1/update";
pub const DECODE_AS_JSON_ROUTE: &str = "/swan/api/v1/decode-as-json";
pub const CREATE_OFFER_ID_ROUTE: &str = "/swan/api/v1/create-offer-id";
pub const PREFERENCES_ROUTE: &str = "/swan/preferences";

// ---------------------------------------------------------------------------
// Timing
// ---------------------------------------------------------------------------

/// How long a decoded value stays valid once re-signed, in seconds.
pub const DEFAULT_VALUE_TIMEOUT_SECS: u64 = 30 * 60;

/// Longest accepted value lifetime: one leap year.
pub const MAX_VALUE_TIMEOUT_SECS: u64 = 366 * 24 * 60 * 60;

/// Upper bound on any single outbound call to an access node. An access
/// node that hangs must not pin a request task forever.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Months added to today's date for the expiry of fields created by the
/// fetch flow.
pub const FETCH_EXPIRY_MONTHS: u32 = 3;

// ---------------------------------------------------------------------------
// Network Defaults
// ---------------------------------------------------------------------------

/// Default HTTP port for the relay API.
pub const DEFAULT_HTTP_PORT: u16 = 5000;

/// Default Prometheus metrics port.
pub const DEFAULT_METRICS_PORT: u16 = 5001;

/// Default SWIFT network name.
pub const DEFAULT_NETWORK: &str = "swan";

/// Default scheme for calls to access nodes.
pub const DEFAULT_SCHEME: &str = "https";

// ---------------------------------------------------------------------------
// Runtime Configuration
// ---------------------------------------------------------------------------

/// Settings the core pipeline needs at request time.
///
/// The node binary assembles this from its settings file, environment and
/// CLI flags; the library never reads any of those itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwanConfig {
    /// `http` or `https`, used for every call to an access node.
    pub scheme: String,
    /// Name of the SWIFT network whose access node we use.
    pub network: String,
    /// Access key presented to the access node on decrypt.
    pub access_key: String,
    /// Lifetime of re-signed values, in seconds.
    pub value_timeout_secs: u64,
    /// When set, error bodies carry the full message and every error is
    /// logged at warn level.
    pub debug: bool,
}

impl SwanConfig {
    /// Value lifetime as a `chrono::Duration`. Fails above
    /// [`MAX_VALUE_TIMEOUT_SECS`].
    pub fn value_timeout(&self) -> Result<chrono::Duration> {
        if self.value_timeout_secs > MAX_VALUE_TIMEOUT_SECS {
            return Err(SwanError::Configuration(format!(
                "value timeout of {}s exceeds the maximum of {}s",
                self.value_timeout_secs, MAX_VALUE_TIMEOUT_SECS
            )));
        }
        Ok(chrono::Duration::seconds(self.value_timeout_secs as i64))
    }
}

impl Default for SwanConfig {
    fn default() -> Self {
        Self {
            scheme: DEFAULT_SCHEME.to_string(),
            network: DEFAULT_NETWORK.to_string(),
            access_key: String::new(),
            value_timeout_secs: DEFAULT_VALUE_TIMEOUT_SECS,
            debug: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Operator Hints
// ---------------------------------------------------------------------------

/// Message returned when no creator is registered for `domain`.
pub fn creator_registration_hint(domain: &str) -> String {
    format!(
        "No creator for '{}'. Use http[s]://{}/owid/register to setup domain.",
        domain, domain
    )
}

/// Message returned when the network has no access node yet.
pub fn network_setup_hint(network: &str) -> String {
    format!(
        "An access node has not been created for the '{}' network. \
         Use http[s]://[domain]/swift/register to start the network.",
        network
    )
}
