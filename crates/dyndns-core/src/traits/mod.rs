//! Capability traits
//!
//! This module defines the abstract interfaces the core depends on.
//!
//! - [`DnsBackend`]: Read and write zone records at a DNS provider
//! - [`DnsBackendFactory`]: Bind a backend to per-request credentials
//! - [`IpResolver`]: Discover this host's public address

pub mod dns_backend;
pub mod ip_resolver;

pub use dns_backend::{
    DnsBackend, DnsBackendFactory, DnsRecord, RecordMeta, RecordSpec, RecordType, ZoneInfo,
};
pub use ip_resolver::{IpResolver, IpVersion};
