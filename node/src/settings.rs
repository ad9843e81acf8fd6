//! # Settings
//!
//! The relay is configured from three layers, later ones winning:
//!
//! 1. built-in defaults,
//! 2. an optional JSON settings file (`--settings`),
//! 3. environment variables and CLI flags (clap merges these two).
//!
//! Creator keys only come from the settings file. Nobody should be pasting
//! signing keys into a shell history.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use swan::config::{
    SwanConfig, DEFAULT_HTTP_PORT, DEFAULT_METRICS_PORT, DEFAULT_NETWORK, DEFAULT_REQUEST_TIMEOUT,
    DEFAULT_SCHEME, DEFAULT_VALUE_TIMEOUT_SECS, MAX_VALUE_TIMEOUT_SECS,
};
use swan::owid::Creator;
use swan::sid::{SidAlgorithm, SidAlgorithmName};

use crate::cli::RunArgs;

/// A creator as written in the settings file.
#[derive(Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatorSeed {
    pub domain: String,
    pub name: String,
    pub secret_key_hex: String,
}

impl std::fmt::Debug for CreatorSeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CreatorSeed")
            .field("domain", &self.domain)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl CreatorSeed {
    pub fn to_creator(&self) -> Result<Creator> {
        Creator::from_secret_hex(&self.domain, &self.name, &self.secret_key_hex)
            .with_context(|| format!("creator '{}' in settings", self.domain))
    }
}

/// Raw contents of the JSON settings file. Every field is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct SettingsFile {
    pub scheme: Option<String>,
    pub network: Option<String>,
    pub access_node: Option<String>,
    pub access_key: Option<String>,
    pub allowed_access_keys: Vec<String>,
    pub value_timeout_secs: Option<u64>,
    pub request_timeout_secs: Option<u64>,
    pub debug: Option<bool>,
    pub sid_algorithm: Option<String>,
    pub sid_secret: Option<String>,
    pub creators: Vec<CreatorSeed>,
    pub preferences_template: Option<PathBuf>,
    pub port: Option<u16>,
    pub metrics_port: Option<u16>,
}

impl SettingsFile {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read settings file {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse settings file {}", path.display()))
    }
}

/// Fully resolved settings the node runs with.
#[derive(Debug, Clone)]
pub struct Settings {
    pub port: u16,
    pub metrics_port: u16,
    pub swan: SwanConfig,
    pub access_node: Option<String>,
    pub allowed_access_keys: Vec<String>,
    pub request_timeout: Duration,
    pub sid: SidAlgorithm,
    pub creators: Vec<CreatorSeed>,
    pub preferences_template: Option<PathBuf>,
}

impl Settings {
    /// Loads the settings file named by `args` (if any) and layers `args`
    /// on top.
    pub fn from_args(args: &RunArgs) -> Result<Self> {
        let file = match &args.settings {
            Some(path) => SettingsFile::load(path)?,
            None => SettingsFile::default(),
        };
        Self::resolve(args, file)
    }

    pub fn resolve(args: &RunArgs, file: SettingsFile) -> Result<Self> {
        let scheme = pick(args.scheme.clone(), file.scheme, DEFAULT_SCHEME.to_string());
        if !matches!(scheme.as_str(), "http" | "https") {
            bail!("scheme must be 'http' or 'https', got '{}'", scheme);
        }

        let allowed_access_keys = if args.allowed_access_keys.is_empty() {
            file.allowed_access_keys
        } else {
            args.allowed_access_keys.clone()
        };

        let sid_name: SidAlgorithmName = pick(
            args.sid_algorithm.clone(),
            file.sid_algorithm,
            "blake3-keyed".to_string(),
        )
        .parse()?;
        let sid_secret = args.sid_secret.clone().or(file.sid_secret);
        let sid = match sid_name {
            SidAlgorithmName::Sha256 => SidAlgorithm::Sha256,
            SidAlgorithmName::Blake3Keyed => {
                let secret = sid_secret
                    .context("sid secret is required for the blake3-keyed SID algorithm")?;
                SidAlgorithm::blake3_from_hex(&secret)?
            }
        };

        let value_timeout_secs = pick(
            args.value_timeout,
            file.value_timeout_secs,
            DEFAULT_VALUE_TIMEOUT_SECS,
        );
        if value_timeout_secs > MAX_VALUE_TIMEOUT_SECS {
            bail!(
                "value timeout of {}s exceeds the maximum of {}s",
                value_timeout_secs,
                MAX_VALUE_TIMEOUT_SECS
            );
        }

        Ok(Self {
            port: pick(args.port, file.port, DEFAULT_HTTP_PORT),
            metrics_port: pick(args.metrics_port, file.metrics_port, DEFAULT_METRICS_PORT),
            swan: SwanConfig {
                scheme,
                network: pick(args.network.clone(), file.network, DEFAULT_NETWORK.to_string()),
                access_key: pick(args.access_key.clone(), file.access_key, String::new()),
                value_timeout_secs,
                debug: args.debug || file.debug.unwrap_or(false),
            },
            access_node: args.access_node.clone().or(file.access_node),
            allowed_access_keys,
            request_timeout: Duration::from_secs(pick(
                args.request_timeout,
                file.request_timeout_secs,
                DEFAULT_REQUEST_TIMEOUT.as_secs(),
            )),
            sid,
            creators: file.creators,
            preferences_template: args
                .preferences_template
                .clone()
                .or(file.preferences_template),
        })
    }

    /// Reads and normalizes the preferences template. No template means an
    /// empty page.
    pub fn preferences_html(&self) -> Result<String> {
        match &self.preferences_template {
            Some(path) => {
                let raw = std::fs::read_to_string(path).with_context(|| {
                    format!("failed to read preferences template {}", path.display())
                })?;
                Ok(swan::whitespace::normalize(&raw))
            }
            None => Ok(String::new()),
        }
    }
}

fn pick<T>(cli: Option<T>, file: Option<T>, default: T) -> T {
    cli.or(file).unwrap_or(default)
}
