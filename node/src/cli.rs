//! # CLI Interface
//!
//! Command-line structure for `swan-node`, via `clap` derive. Every `run`
//! flag can also come from a `SWAN_*` environment variable; anything left
//! unset falls through to the settings file and then to defaults.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// SWAN consent relay.
///
/// Decrypts publisher blobs through the SWIFT access node, re-signs every
/// value as an OWID for the requesting domain, and composes storage
/// operation URLs.
#[derive(Parser, Debug)]
#[command(
    name = "swan-node",
    about = "SWAN consent relay",
    version,
    propagate_version = true
)]
pub struct SwanNodeCli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the relay.
    Run(RunArgs),
    /// Generate a creator key and SID secret for a settings file.
    Keygen(KeygenArgs),
    /// Print version information and exit.
    Version,
}

/// Arguments for the `run` subcommand.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// JSON settings file. Flags and environment variables override it.
    #[arg(long, short = 's', env = "SWAN_SETTINGS")]
    pub settings: Option<PathBuf>,

    /// Port for the SWAN API.
    #[arg(long, env = "SWAN_PORT")]
    pub port: Option<u16>,

    /// Port for the Prometheus metrics endpoint.
    #[arg(long, env = "SWAN_METRICS_PORT")]
    pub metrics_port: Option<u16>,

    /// Scheme used to reach the access node: http or https.
    #[arg(long, env = "SWAN_SCHEME")]
    pub scheme: Option<String>,

    /// SWIFT network name.
    #[arg(long, env = "SWAN_NETWORK")]
    pub network: Option<String>,

    /// Access node host for the network, e.g. `node.example:443`.
    #[arg(long, env = "SWAN_ACCESS_NODE")]
    pub access_node: Option<String>,

    /// Access key presented to the access node on decrypt.
    #[arg(long, env = "SWAN_ACCESS_KEY")]
    pub access_key: Option<String>,

    /// Access keys publishers may call this relay with.
    #[arg(long, env = "SWAN_ALLOWED_ACCESS_KEYS", value_delimiter = ',')]
    pub allowed_access_keys: Vec<String>,

    /// Lifetime of re-signed values, in seconds.
    #[arg(long, env = "SWAN_VALUE_TIMEOUT")]
    pub value_timeout: Option<u64>,

    /// Timeout for calls to the access node, in seconds.
    #[arg(long, env = "SWAN_REQUEST_TIMEOUT")]
    pub request_timeout: Option<u64>,

    /// Return full error messages to callers and log every error at warn.
    #[arg(long, env = "SWAN_DEBUG")]
    pub debug: bool,

    /// Log output format: pretty or json.
    #[arg(long, env = "SWAN_LOG_FORMAT", default_value = "pretty")]
    pub log_format: String,

    /// SID algorithm: blake3-keyed or sha256.
    #[arg(long, env = "SWAN_SID_ALGORITHM")]
    pub sid_algorithm: Option<String>,

    /// Hex-encoded 32-byte secret for blake3-keyed SIDs.
    #[arg(long, env = "SWAN_SID_SECRET", hide_env_values = true)]
    pub sid_secret: Option<String>,

    /// HTML template served on the preferences page.
    #[arg(long, env = "SWAN_PREFERENCES_TEMPLATE")]
    pub preferences_template: Option<PathBuf>,
}

/// Arguments for the `keygen` subcommand.
#[derive(Parser, Debug)]
pub struct KeygenArgs {
    /// Domain the creator signs for.
    #[arg(long)]
    pub domain: String,

    /// Display name of the creator.
    #[arg(long, default_value = "SWAN")]
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli_structure() {
        SwanNodeCli::command().debug_assert();
    }

    #[test]
    fn allowed_access_keys_split_on_commas() {
        let cli = SwanNodeCli::try_parse_from([
            "swan-node",
            "run",
            "--allowed-access-keys",
            "a,b",
            "--allowed-access-keys",
            "c",
        ])
        .unwrap();
        match cli.command {
            Commands::Run(args) => assert_eq!(args.allowed_access_keys, ["a", "b", "c"]),
            other => panic!("expected run, got {:?}", other),
        }
    }
}
