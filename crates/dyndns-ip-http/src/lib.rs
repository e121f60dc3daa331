// # HTTP IP Resolver
//
// Resolves this host's public address by asking an icanhazip-style service:
// a plain-text endpoint that answers with the caller's address.
//
// ## Endpoints
//
// Each family has its own endpoint, so the answer is forced onto the right
// protocol by the connection itself:
// - IPv4: `https://ipv4.icanhazip.com`
// - IPv6: `https://ipv6.icanhazip.com`
//
// ## Behavior
//
// One GET per call, bounded by the configured timeout. No retries and no
// caching; a failed lookup is reported to the caller as `Error::IpResolution`.

use dyndns_core::traits::{IpResolver, IpVersion};
use dyndns_core::{Error, Result};

use std::net::IpAddr;
use std::time::Duration;

/// Default IPv4 lookup endpoint
pub const DEFAULT_IPV4_ENDPOINT: &str = "https://ipv4.icanhazip.com";

/// Default IPv6 lookup endpoint
pub const DEFAULT_IPV6_ENDPOINT: &str = "https://ipv6.icanhazip.com";

/// HTTP-based public IP resolver
pub struct HttpIpResolver {
    /// Endpoint answering over IPv4
    ipv4_endpoint: String,

    /// Endpoint answering over IPv6
    ipv6_endpoint: String,

    /// HTTP client (carries the timeout)
    client: reqwest::Client,
}

impl HttpIpResolver {
    /// Create a resolver against the default icanhazip endpoints
    pub fn new(timeout: Duration) -> Result<Self> {
        Self::with_endpoints(DEFAULT_IPV4_ENDPOINT, DEFAULT_IPV6_ENDPOINT, timeout)
    }

    /// Create a resolver against custom endpoints
    ///
    /// # Parameters
    ///
    /// - `ipv4_endpoint`: URL returning the caller's IPv4 address as text
    /// - `ipv6_endpoint`: URL returning the caller's IPv6 address as text
    /// - `timeout`: Upper bound for each lookup
    pub fn with_endpoints(
        ipv4_endpoint: impl Into<String>,
        ipv6_endpoint: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(dyndns_core::user_agent())
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            ipv4_endpoint: ipv4_endpoint.into(),
            ipv6_endpoint: ipv6_endpoint.into(),
            client,
        })
    }

    fn endpoint(&self, version: IpVersion) -> &str {
        match version {
            IpVersion::V4 => &self.ipv4_endpoint,
            IpVersion::V6 => &self.ipv6_endpoint,
        }
    }
}

#[async_trait::async_trait]
impl IpResolver for HttpIpResolver {
    async fn resolve(&self, version: IpVersion) -> Result<IpAddr> {
        let url = self.endpoint(version);
        tracing::debug!("Resolving public {} address via {}", version, url);

        let response = self.client.get(url).send().await.map_err(|e| {
            Error::ip_resolution(format!("{} lookup via {} failed: {}", version, url, e))
        })?;

        if !response.status().is_success() {
            return Err(Error::ip_resolution(format!(
                "{} lookup via {} returned HTTP {}",
                version,
                url,
                response.status()
            )));
        }

        let body = response.text().await.map_err(|e| {
            Error::ip_resolution(format!("Failed to read {} lookup response: {}", version, e))
        })?;

        let text = body.trim();
        let ip: IpAddr = text.parse().map_err(|_| {
            Error::ip_resolution(format!("Lookup returned an invalid address: {:?}", text))
        })?;

        if !version.matches(&ip) {
            return Err(Error::ip_resolution(format!(
                "Expected an {} address, got: {}",
                version, ip
            )));
        }

        tracing::debug!("Public {} address is {}", version, ip);
        Ok(ip)
    }
}
