//! Environment configuration
//!
//! All configuration is done via environment variables:
//!
//! ### Required
//! - `DYNDNS_SECRET`: Operator secret for the credential codec
//!
//! ### HTTP surface
//! - `DYNDNS_LISTEN`: Listen address (default `127.0.0.1:8080`)
//! - `DYNDNS_AUTH_REALM`: Basic auth realm (default `cloudflare-dyndns`)
//! - `DYNDNS_AUTH_EXEMPT`: Comma-separated paths that skip authentication
//!
//! ### Records
//! - `DYNDNS_RECORD_TTL`: TTL for written records (default 1, automatic)
//! - `DYNDNS_RECORD_PROXIED`: Proxy written records (default false)
//!
//! ### Timeouts (seconds)
//! - `DYNDNS_BACKEND_TIMEOUT_SECS` (default 30)
//! - `DYNDNS_IP_RESOLVER_TIMEOUT_SECS` (default 10)
//! - `DYNDNS_REMOTE_TIMEOUT_SECS` (default 30)
//!
//! ### Other
//! - `DYNDNS_CLOUDFLARE_API_URL`: Cloudflare API base URL
//! - `DYNDNS_LOG_LEVEL`: trace, debug, info, warn, error (default info)

use anyhow::{Context, Result};
use dyndns_core::ServiceConfig;
use std::str::FromStr;
use tracing::Level;

/// Load the service configuration through a variable lookup
///
/// Production passes `std::env::var`; tests pass a map.
pub fn load<F>(lookup: F) -> Result<ServiceConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let secret = lookup("DYNDNS_SECRET").unwrap_or_default();
    if secret.is_empty() {
        anyhow::bail!(
            "DYNDNS_SECRET is required. \
             Generate one via: openssl rand -base64 32"
        );
    }

    let mut config = ServiceConfig::new(secret);

    if let Some(listen) = non_empty(&lookup, "DYNDNS_LISTEN") {
        config.listen = listen;
    }

    if let Some(realm) = non_empty(&lookup, "DYNDNS_AUTH_REALM") {
        config.auth.realm = realm;
    }

    if let Some(exempt) = non_empty(&lookup, "DYNDNS_AUTH_EXEMPT") {
        config.auth.exempt_paths = exempt
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
    }

    if let Some(ttl) = parse(&lookup, "DYNDNS_RECORD_TTL")? {
        config.records.ttl = ttl;
    }

    if let Some(proxied) = non_empty(&lookup, "DYNDNS_RECORD_PROXIED") {
        config.records.proxied = parse_bool(&proxied)
            .with_context(|| format!("DYNDNS_RECORD_PROXIED is not a boolean: {}", proxied))?;
    }

    if let Some(secs) = parse(&lookup, "DYNDNS_BACKEND_TIMEOUT_SECS")? {
        config.timeouts.backend_secs = secs;
    }

    if let Some(secs) = parse(&lookup, "DYNDNS_IP_RESOLVER_TIMEOUT_SECS")? {
        config.timeouts.ip_resolver_secs = secs;
    }

    if let Some(secs) = parse(&lookup, "DYNDNS_REMOTE_TIMEOUT_SECS")? {
        config.timeouts.remote_secs = secs;
    }

    if let Some(url) = non_empty(&lookup, "DYNDNS_CLOUDFLARE_API_URL") {
        config.cloudflare_api_url = url;
    }

    config.validate()?;

    Ok(config)
}

/// Load the service configuration from the process environment
pub fn from_env() -> Result<ServiceConfig> {
    load(|key| std::env::var(key).ok())
}

/// Parse a log level name
pub fn parse_level(level: &str) -> Result<Level> {
    match level.to_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        _ => anyhow::bail!(
            "Log level '{}' is not valid. \
             Valid levels: trace, debug, info, warn, error",
            level
        ),
    }
}

fn non_empty<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse<F, T>(lookup: &F, key: &str) -> Result<Option<T>>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    non_empty(lookup, key)
        .map(|raw| {
            raw.parse::<T>()
                .map_err(|e| anyhow::anyhow!("{} has an invalid value '{}': {}", key, raw, e))
        })
        .transpose()
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
