//! # Common Parameter Validation
//!
//! Fetch and update share a set of publisher parameters that end up in the
//! storage operation and, eventually, in the user's browser. They are
//! checked here before any URL is composed; the first bad one aborts the
//! request.

use url::Url;

use crate::error::{Result, SwanError};
use crate::swift::QueryParams;

/// Longest `title` or `message` accepted.
pub const MAX_TEXT_LENGTH: usize = 256;

const RETURN_URL: &str = "returnUrl";
const ACCESS_NODE: &str = "accessNode";
const FLAGS: [&str; 3] = ["displayUserInterface", "postMessageOnComplete", "useHomeNode"];
const COLORS: [&str; 3] = ["backgroundColor", "messageColor", "progressColor"];
const TEXTS: [&str; 2] = ["title", "message"];

/// Checks the parameters common to fetch and update.
pub fn validate_common(params: &QueryParams) -> Result<()> {
    match params.get(RETURN_URL) {
        Some(value) => check_return_url(value)?,
        None => return Err(SwanError::invalid_parameter(RETURN_URL, "required")),
    }

    if let Some(node) = params.get(ACCESS_NODE) {
        check_host(ACCESS_NODE, node)?;
    }
    for name in FLAGS {
        if let Some(value) = params.get(name) {
            check_flag(name, value)?;
        }
    }
    for name in COLORS {
        if let Some(value) = params.get(name) {
            check_color(name, value)?;
        }
    }
    for name in TEXTS {
        if let Some(value) = params.get(name) {
            if value.chars().count() > MAX_TEXT_LENGTH {
                return Err(SwanError::invalid_parameter(
                    name,
                    format!("longer than {} characters", MAX_TEXT_LENGTH),
                ));
            }
        }
    }
    Ok(())
}

fn check_return_url(value: &str) -> Result<()> {
    let url = Url::parse(value)
        .map_err(|e| SwanError::invalid_parameter(RETURN_URL, format!("not a URL: {}", e)))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(SwanError::invalid_parameter(
            RETURN_URL,
            format!("scheme '{}' not allowed", url.scheme()),
        ));
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err(SwanError::invalid_parameter(RETURN_URL, "missing host"));
    }
    Ok(())
}

fn check_host(name: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(SwanError::invalid_parameter(name, "empty"));
    }
    if value.contains("://") || value.contains('/') || value.contains('?') {
        return Err(SwanError::invalid_parameter(name, "must be a bare host"));
    }
    // A bare host must survive being the authority of a URL unchanged.
    match Url::parse(&format!("https://{}", value)) {
        Ok(url) if url.host_str().is_some() => Ok(()),
        _ => Err(SwanError::invalid_parameter(name, "not a valid host")),
    }
}

fn check_flag(name: &str, value: &str) -> Result<()> {
    match value {
        "true" | "false" => Ok(()),
        _ => Err(SwanError::invalid_parameter(name, "must be 'true' or 'false'")),
    }
}

fn check_color(name: &str, value: &str) -> Result<()> {
    let valid = value
        .strip_prefix('#')
        .filter(|hex| matches!(hex.len(), 3 | 6))
        .map_or(false, |hex| hex.chars().all(|c| c.is_ascii_hexdigit()));
    if valid {
        Ok(())
    } else {
        Err(SwanError::invalid_parameter(name, "must be #rgb or #rrggbb"))
    }
}
