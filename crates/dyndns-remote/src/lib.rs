// # Remote Forwarder
//
// Instead of talking to the DNS provider itself, this instance discovers its
// own public addresses and asks a remote instance of the updater to apply
// them. The remote runs the reconciliation engine with its own backend.
//
// ## Request
//
// ```http
// PUT https://{remote}/{zone}/{hostname}/update?ipv4=...&ipv6=...
// Authorization: Basic base64(username:encrypt(password))
// User-Agent: cloudflare-dyndns/{version}
// ```
//
// The password travels encrypted under the local operator secret, so the
// remote must be configured with the same secret to read it.
//
// ## Failure semantics
//
// IP resolution failures, transport failures and non-success responses all
// abort the forward. Nothing is retried.

use dyndns_core::traits::{IpResolver, IpVersion};
use dyndns_core::{CredentialCodec, Error, Result};

use serde::Serialize;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

/// Default URL scheme for remote instances
pub const DEFAULT_SCHEME: &str = "https";

/// Outcome of a successful forward
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForwardReport {
    /// IPv4 address sent to the remote
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ipv4: Option<IpAddr>,
    /// IPv6 address sent to the remote
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ipv6: Option<IpAddr>,
    /// Response payload returned by the remote
    pub response: serde_json::Value,
}

/// Forwards updates to a remote instance
pub struct RemoteForwarder {
    /// Encrypts the password for transport
    codec: Arc<CredentialCodec>,

    /// Discovers this host's public addresses
    resolver: Arc<dyn IpResolver>,

    /// HTTP client (carries the timeout and User-Agent)
    client: reqwest::Client,

    /// URL scheme for the remote (https unless overridden)
    scheme: String,

    /// Address families to resolve and send
    families: Vec<IpVersion>,
}

impl RemoteForwarder {
    /// Create a forwarder that sends both address families over HTTPS
    pub fn new(
        codec: Arc<CredentialCodec>,
        resolver: Arc<dyn IpResolver>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(dyndns_core::user_agent())
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            codec,
            resolver,
            client,
            scheme: DEFAULT_SCHEME.to_string(),
            families: IpVersion::ALL.to_vec(),
        })
    }

    /// Override the URL scheme (e.g. `http` for a local test instance)
    pub fn with_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.scheme = scheme.into();
        self
    }

    /// Restrict the address families that are resolved and forwarded
    pub fn with_families(mut self, families: &[IpVersion]) -> Self {
        self.families = families.to_vec();
        self
    }

    /// Build the update URL for a remote, zone and hostname
    ///
    /// `remote` is a host with optional port and path prefix
    /// (e.g. `dyndns.example.net` or `dyndns.example.net:8443/zones`).
    pub fn update_url(&self, remote: &str, zone: &str, hostname: &str) -> Result<reqwest::Url> {
        let base = format!("{}://{}", self.scheme, remote.trim_end_matches('/'));
        let mut url = reqwest::Url::parse(&base)
            .map_err(|e| Error::invalid_input(format!("Invalid remote {:?}: {}", remote, e)))?;

        url.path_segments_mut()
            .map_err(|_| Error::invalid_input(format!("Invalid remote {:?}", remote)))?
            .pop_if_empty()
            .extend([zone, hostname, "update"]);

        Ok(url)
    }

    /// Resolve local addresses and ask the remote to apply them
    ///
    /// # Parameters
    ///
    /// - `remote`: Remote instance host (see [`RemoteForwarder::update_url`])
    /// - `zone`: Zone containing the hostname
    /// - `hostname`: Record name to update
    /// - `username`: Provider username, sent as-is
    /// - `password`: Plaintext provider password, sent encrypted
    ///
    /// # Returns
    ///
    /// - `Err(Error::IpResolution)`: a public address could not be resolved
    /// - `Err(Error::Http)`: the remote could not be reached
    /// - `Err(Error::Remote)`: the remote answered with a non-success status
    pub async fn forward_update(
        &self,
        remote: &str,
        zone: &str,
        hostname: &str,
        username: &str,
        password: &str,
    ) -> Result<ForwardReport> {
        match self
            .try_forward(remote, zone, hostname, username, password)
            .await
        {
            Ok(report) => {
                tracing::info!(
                    "Forwarded update of {} to {} (ipv4: {}, ipv6: {})",
                    hostname,
                    remote,
                    display_ip(report.ipv4),
                    display_ip(report.ipv6)
                );
                Ok(report)
            }
            Err(e) => {
                tracing::error!("Forwarding update of {} to {} failed: {}", hostname, remote, e);
                Err(e)
            }
        }
    }

    async fn try_forward(
        &self,
        remote: &str,
        zone: &str,
        hostname: &str,
        username: &str,
        password: &str,
    ) -> Result<ForwardReport> {
        if self.families.is_empty() {
            return Err(Error::invalid_input("No address family selected"));
        }

        let url = self.update_url(remote, zone, hostname)?;

        let mut ipv4 = None;
        let mut ipv6 = None;
        for version in &self.families {
            let ip = self.resolver.resolve(*version).await?;
            match version {
                IpVersion::V4 => ipv4 = Some(ip),
                IpVersion::V6 => ipv6 = Some(ip),
            }
        }

        let mut query = Vec::with_capacity(2);
        if let Some(ip) = ipv4 {
            query.push(("ipv4", ip.to_string()));
        }
        if let Some(ip) = ipv6 {
            query.push(("ipv6", ip.to_string()));
        }

        tracing::debug!("Forwarding update to {}", url);

        let response = self
            .client
            .put(url)
            .basic_auth(username, Some(self.codec.encrypt(password)))
            .query(&query)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::http(format!("Remote {} timed out: {}", remote, e))
                } else {
                    Error::http(format!("Request to remote {} failed: {}", remote, e))
                }
            })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| Error::http(format!("Failed to read remote response: {}", e)))?;

        if !status.is_success() {
            return Err(Error::remote(Some(status.as_u16()), error_message(&text)));
        }

        let body = serde_json::from_str(&text).unwrap_or(serde_json::Value::String(text));

        Ok(ForwardReport {
            ipv4,
            ipv6,
            response: body,
        })
    }
}

/// Extract the message from an error envelope
///
/// `result` is either `{message, error}` or a plain message string.
fn error_message(text: &str) -> String {
    serde_json::from_str::<serde_json::Value>(text)
        .ok()
        .and_then(|v| {
            v["result"]["message"]
                .as_str()
                .or_else(|| v["result"].as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| text.trim().to_string())
}

fn display_ip(ip: Option<IpAddr>) -> String {
    ip.map(|ip| ip.to_string()).unwrap_or_else(|| "-".to_string())
}
