// # IP Resolver Trait
//
// Defines the interface for discovering this host's public address.
//
// ## Implementations
//
// - icanhazip-style HTTP services: `dyndns-ip-http` crate
//
// ## Usage
//
// ```rust,ignore
// use dyndns_core::{IpResolver, IpVersion};
//
// async fn example(resolver: &dyn IpResolver) -> dyndns_core::Result<()> {
//     let v4 = resolver.resolve(IpVersion::V4).await?;
//     println!("public IPv4: {}", v4);
//     Ok(())
// }
// ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;

/// IP version (v4 or v6)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IpVersion {
    V4,
    V6,
}

impl IpVersion {
    /// Both families, v4 first
    pub const ALL: [IpVersion; 2] = [IpVersion::V4, IpVersion::V6];

    /// Version of an address
    pub fn of(ip: &IpAddr) -> Self {
        match ip {
            IpAddr::V4(_) => IpVersion::V4,
            IpAddr::V6(_) => IpVersion::V6,
        }
    }

    /// Whether an address belongs to this family
    pub fn matches(&self, ip: &IpAddr) -> bool {
        Self::of(ip) == *self
    }
}

impl std::fmt::Display for IpVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IpVersion::V4 => f.write_str("IPv4"),
            IpVersion::V6 => f.write_str("IPv6"),
        }
    }
}

/// Trait for public IP resolution
///
/// Implementations must be thread-safe and usable across async tasks.
///
/// # Contract
///
/// - One bounded network lookup per call; no retries, no caching
/// - The returned address always belongs to the requested family
/// - Network failures, timeouts and unparsable responses are
///   `Error::IpResolution`
#[async_trait]
pub trait IpResolver: Send + Sync {
    /// Resolve this host's public address for one family
    async fn resolve(&self, version: IpVersion) -> Result<IpAddr, crate::Error>;
}
