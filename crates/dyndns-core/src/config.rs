//! Configuration types for the dynamic DNS updater
//!
//! This module defines all configuration structures used throughout the
//! workspace. Loading them (from the environment) is the binary's job.

use crate::codec::DEFAULT_SECRET;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Product name, used for the auth realm and the forwarding User-Agent
pub const PRODUCT_NAME: &str = "cloudflare-dyndns";

/// Product version
pub const PRODUCT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Public Cloudflare API v4 base URL
pub const DEFAULT_CLOUDFLARE_API_URL: &str = "https://api.cloudflare.com/client/v4";

/// `User-Agent` value identifying this product
pub fn user_agent() -> String {
    format!("{}/{}", PRODUCT_NAME, PRODUCT_VERSION)
}

/// Main service configuration
///
/// # Security
///
/// Neither the Debug implementation nor serialization exposes the secret.
#[derive(Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Operator secret for the credential codec
    #[serde(skip_serializing)]
    pub secret: String,

    /// Listen address for the HTTP surface
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Authentication gate settings
    #[serde(default)]
    pub auth: AuthConfig,

    /// Policy for records the engine creates or updates
    #[serde(default)]
    pub records: RecordPolicy,

    /// Outbound call timeouts
    #[serde(default)]
    pub timeouts: TimeoutConfig,

    /// Cloudflare API base URL
    #[serde(default = "default_cloudflare_api_url")]
    pub cloudflare_api_url: String,
}

impl std::fmt::Debug for ServiceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceConfig")
            .field("secret", &"<REDACTED>")
            .field("listen", &self.listen)
            .field("auth", &self.auth)
            .field("records", &self.records)
            .field("timeouts", &self.timeouts)
            .field("cloudflare_api_url", &self.cloudflare_api_url)
            .finish()
    }
}

impl ServiceConfig {
    /// Create a configuration with defaults around the given secret
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            listen: default_listen(),
            auth: AuthConfig::default(),
            records: RecordPolicy::default(),
            timeouts: TimeoutConfig::default(),
            cloudflare_api_url: default_cloudflare_api_url(),
        }
    }

    /// Validate the configuration
    ///
    /// The placeholder secret is rejected here so the process stops before
    /// serving anything.
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.secret == DEFAULT_SECRET {
            return Err(crate::Error::config(
                "DYNDNS_SECRET is still the placeholder value. \
                 Generate one via: openssl rand -base64 32",
            ));
        }

        if self.secret.is_empty() {
            return Err(crate::Error::config("DYNDNS_SECRET cannot be empty"));
        }

        if self.listen.parse::<std::net::SocketAddr>().is_err() {
            return Err(crate::Error::config(format!(
                "Listen address is not a valid socket address: {}",
                self.listen
            )));
        }

        if !self.cloudflare_api_url.starts_with("https://")
            && !self.cloudflare_api_url.starts_with("http://")
        {
            return Err(crate::Error::config(format!(
                "Cloudflare API URL must use HTTP or HTTPS scheme. Got: {}",
                self.cloudflare_api_url
            )));
        }

        self.auth.validate()?;
        self.timeouts.validate()?;

        Ok(())
    }
}

/// Authentication gate configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Realm sent with Basic challenges
    #[serde(default = "default_realm")]
    pub realm: String,

    /// Path prefixes that do not require credentials
    #[serde(default)]
    pub exempt_paths: Vec<String>,
}

impl AuthConfig {
    /// Validate the auth configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.realm.contains('"') {
            return Err(crate::Error::config("Auth realm cannot contain quotes"));
        }

        for path in &self.exempt_paths {
            if !path.starts_with('/') {
                return Err(crate::Error::config(format!(
                    "Exempt path must start with '/'. Got: {}",
                    path
                )));
            }
        }

        Ok(())
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            realm: default_realm(),
            exempt_paths: Vec::new(),
        }
    }
}

/// TTL and proxying applied to records the engine writes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordPolicy {
    /// Record TTL (1 = automatic)
    #[serde(default = "default_ttl")]
    pub ttl: u32,

    /// Whether records are proxied through the provider
    #[serde(default)]
    pub proxied: bool,
}

impl Default for RecordPolicy {
    fn default() -> Self {
        Self {
            ttl: default_ttl(),
            proxied: false,
        }
    }
}

/// Timeouts for outbound calls, in seconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeoutConfig {
    /// DNS provider API calls
    #[serde(default = "default_backend_secs")]
    pub backend_secs: u64,

    /// Public IP lookups
    #[serde(default = "default_ip_resolver_secs")]
    pub ip_resolver_secs: u64,

    /// Forwarded updates to a remote instance
    #[serde(default = "default_remote_secs")]
    pub remote_secs: u64,
}

impl TimeoutConfig {
    /// Validate the timeouts
    pub fn validate(&self) -> Result<(), crate::Error> {
        for (name, secs) in [
            ("backend", self.backend_secs),
            ("IP resolver", self.ip_resolver_secs),
            ("remote", self.remote_secs),
        ] {
            if !(1..=300).contains(&secs) {
                return Err(crate::Error::config(format!(
                    "{} timeout must be between 1 and 300 seconds. Got: {}",
                    name, secs
                )));
            }
        }

        Ok(())
    }

    /// Backend timeout as a Duration
    pub fn backend(&self) -> Duration {
        Duration::from_secs(self.backend_secs)
    }

    /// IP resolver timeout as a Duration
    pub fn ip_resolver(&self) -> Duration {
        Duration::from_secs(self.ip_resolver_secs)
    }

    /// Remote forwarding timeout as a Duration
    pub fn remote(&self) -> Duration {
        Duration::from_secs(self.remote_secs)
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            backend_secs: default_backend_secs(),
            ip_resolver_secs: default_ip_resolver_secs(),
            remote_secs: default_remote_secs(),
        }
    }
}

fn default_listen() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_realm() -> String {
    PRODUCT_NAME.to_string()
}

fn default_cloudflare_api_url() -> String {
    DEFAULT_CLOUDFLARE_API_URL.to_string()
}

fn default_ttl() -> u32 {
    1
}

fn default_backend_secs() -> u64 {
    30
}

fn default_ip_resolver_secs() -> u64 {
    10
}

fn default_remote_secs() -> u64 {
    30
}
