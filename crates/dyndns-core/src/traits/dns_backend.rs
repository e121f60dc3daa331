// # DNS Backend Trait
//
// Defines the capability the reconciliation engine and the HTTP surface use
// to read and write zone records at a DNS provider.
//
// ## Implementations
//
// - Cloudflare: `dyndns-backend-cloudflare` crate
//
// ## Usage
//
// ```rust,ignore
// use dyndns_core::{DnsBackend, RecordSpec, RecordType};
//
// async fn example(backend: &dyn DnsBackend) -> dyndns_core::Result<()> {
//     let record = backend
//         .get_record("example.com", "home.example.com", Some(RecordType::A))
//         .await?;
//
//     if record.is_none() {
//         backend
//             .create_record("example.com", &RecordSpec::new(RecordType::A, "home.example.com", "203.0.113.9"))
//             .await?;
//     }
//
//     Ok(())
// }
// ```

use crate::auth::Credentials;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Address record types managed by this system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordType {
    /// A record (IPv4)
    A,
    /// AAAA record (IPv6)
    #[serde(rename = "AAAA")]
    Aaaa,
}

impl RecordType {
    /// Wire name of the record type
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordType::A => "A",
            RecordType::Aaaa => "AAAA",
        }
    }
}

impl std::fmt::Display for RecordType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A DNS record as reported by the provider
///
/// This is a read-only mirror. The engine never mutates it; every decision
/// re-reads the provider first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DnsRecord {
    /// Provider-specific record ID
    pub id: String,
    /// Fully qualified record name
    pub name: String,
    /// Record type as reported by the provider (A, AAAA, CNAME, MX, ...)
    #[serde(rename = "type")]
    pub record_type: String,
    /// Record content (the address for A/AAAA)
    pub content: String,
    /// Time-to-live (1 means "automatic" at Cloudflare)
    pub ttl: u32,
    /// Whether traffic is proxied through the provider
    #[serde(default)]
    pub proxied: bool,
}

/// Metadata about a zone
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneInfo {
    /// Provider-specific zone ID
    pub id: String,
    /// Zone name (e.g. "example.com")
    pub name: String,
    /// Provider status (e.g. "active")
    #[serde(default)]
    pub status: Option<String>,
    /// Assigned name servers
    #[serde(default)]
    pub name_servers: Vec<String>,
}

/// Backend-specific metadata for a write
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordMeta {
    /// Whether the record should be proxied
    pub proxied: bool,
}

/// Desired state of a record for create/update calls
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordSpec {
    /// Record type
    pub record_type: RecordType,
    /// Fully qualified record name
    pub name: String,
    /// Record content
    pub content: String,
    /// Time-to-live
    pub ttl: u32,
    /// Backend metadata
    pub meta: RecordMeta,
}

impl RecordSpec {
    /// Create a record spec with TTL 1 and no proxying
    pub fn new(record_type: RecordType, name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            record_type,
            name: name.into(),
            content: content.into(),
            ttl: 1,
            meta: RecordMeta::default(),
        }
    }

    /// Set the TTL
    pub fn with_ttl(mut self, ttl: u32) -> Self {
        self.ttl = ttl;
        self
    }

    /// Set the backend metadata
    pub fn with_meta(mut self, meta: RecordMeta) -> Self {
        self.meta = meta;
        self
    }
}

/// Trait for DNS backend implementations
///
/// # Thread Safety
///
/// Implementations must be thread-safe and usable across async tasks.
///
/// # Contract
///
/// - Every call is a fresh read or write against the provider; no caching
/// - No retries; failures are returned to the caller as-is
/// - Failures carry the provider's HTTP status in `Error::Backend` when known
/// - A missing zone is `Error::NotFound`; a missing record on reads is `Ok(None)`
#[async_trait]
pub trait DnsBackend: Send + Sync {
    /// Create a new record in a zone
    async fn create_record(&self, zone: &str, record: &RecordSpec) -> Result<(), crate::Error>;

    /// Update the existing record with the same name and type, keeping its ID
    ///
    /// # Returns
    ///
    /// - `Err(Error::NotFound)`: no record with this name and type exists
    async fn update_record(&self, zone: &str, record: &RecordSpec) -> Result<(), crate::Error>;

    /// Get the record with an exact name, optionally filtered by type
    ///
    /// Without a type filter the first record with a matching name is returned.
    async fn get_record(
        &self,
        zone: &str,
        name: &str,
        record_type: Option<RecordType>,
    ) -> Result<Option<DnsRecord>, crate::Error>;

    /// List the records of a zone, optionally filtered by type
    async fn get_records(
        &self,
        zone: &str,
        record_type: Option<RecordType>,
    ) -> Result<Vec<DnsRecord>, crate::Error>;

    /// Look up a zone by name
    async fn get_zone(&self, zone: &str) -> Result<Option<ZoneInfo>, crate::Error>;

    /// List all zones visible to the credentials
    async fn get_zones(&self) -> Result<Vec<ZoneInfo>, crate::Error>;

    /// Backend name (for logging/debugging)
    fn backend_name(&self) -> &'static str;
}

/// Builds a backend bound to a set of provider credentials
///
/// The HTTP surface calls this once per request with the credentials the
/// [`AuthGate`](crate::auth::AuthGate) extracted.
pub trait DnsBackendFactory: Send + Sync {
    /// Create a backend for the given credentials
    ///
    /// # Returns
    ///
    /// - `Err(Error::Authentication)`: credentials are empty
    fn create(&self, credentials: &Credentials) -> Result<Box<dyn DnsBackend>, crate::Error>;
}
