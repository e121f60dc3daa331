//! Reconciliation engine
//!
//! The ReconciliationEngine is responsible for:
//! - Validating an update request
//! - Reading the current A/AAAA record from the DnsBackend
//! - Creating, updating or leaving the record alone
//!
//! ## Flow (per address family present in the request)
//!
//! ```text
//!            get_record(zone, hostname, type)
//!                         │
//!        ┌────────────────┼─────────────────────┐
//!        ▼                ▼                     ▼
//!    no record     same content          different content
//!        │                │                     │
//!   create_record     (nothing)           update_record
//! ```
//!
//! ## Failure semantics
//!
//! Families run in order, A first. Any backend failure aborts the call and is
//! returned wrapped in `Error::Reconcile`, naming the record. Records already
//! written stay written; DNS records are independent, so there is nothing to
//! roll back.
//!
//! ## Concurrency
//!
//! The engine holds no state between calls and re-reads the provider before
//! every decision. Two concurrent updates for the same record are therefore
//! not serialized here: the provider is the only synchronization point and
//! the last write wins.

use crate::config::RecordPolicy;
use crate::error::{Error, Result};
use crate::traits::{DnsBackend, DnsRecord, RecordMeta, RecordSpec, RecordType};
use serde::Serialize;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use tracing::{debug, info};

/// Desired state for one hostname
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateRequest {
    /// Zone containing the hostname
    pub zone: String,
    /// Fully qualified hostname
    pub hostname: String,
    /// Desired IPv4 address
    pub ipv4: Option<Ipv4Addr>,
    /// Desired IPv6 address
    pub ipv6: Option<Ipv6Addr>,
}

impl UpdateRequest {
    /// Create an update request
    pub fn new(
        zone: impl Into<String>,
        hostname: impl Into<String>,
        ipv4: Option<Ipv4Addr>,
        ipv6: Option<Ipv6Addr>,
    ) -> Self {
        Self {
            zone: zone.into(),
            hostname: hostname.into(),
            ipv4,
            ipv6,
        }
    }

    /// Parse optional address strings; empty strings count as absent
    ///
    /// # Returns
    ///
    /// - `Err(Error::InvalidInput)`: a value is not an address of its family
    pub fn parse(
        zone: impl Into<String>,
        hostname: impl Into<String>,
        ipv4: Option<&str>,
        ipv6: Option<&str>,
    ) -> Result<Self> {
        let ipv4 = parse_family::<Ipv4Addr>(ipv4, "IPv4")?;
        let ipv6 = parse_family::<Ipv6Addr>(ipv6, "IPv6")?;

        Ok(Self::new(zone, hostname, ipv4, ipv6))
    }

    /// Validate the request
    ///
    /// At least one address must be present; a request with neither is an
    /// error, not a no-op.
    pub fn validate(&self) -> Result<()> {
        if self.zone.trim().is_empty() {
            return Err(Error::invalid_input("Zone cannot be empty"));
        }

        if self.hostname.trim().is_empty() {
            return Err(Error::invalid_input("Hostname cannot be empty"));
        }

        if self.ipv4.is_none() && self.ipv6.is_none() {
            return Err(Error::invalid_input(
                "Invalid IP address supplied: at least one of ipv4 or ipv6 is required",
            ));
        }

        Ok(())
    }

    /// Desired addresses in processing order
    fn targets(&self) -> Vec<(RecordType, IpAddr)> {
        let mut targets = Vec::with_capacity(2);
        if let Some(ip) = self.ipv4 {
            targets.push((RecordType::A, IpAddr::V4(ip)));
        }
        if let Some(ip) = self.ipv6 {
            targets.push((RecordType::Aaaa, IpAddr::V6(ip)));
        }
        targets
    }
}

fn parse_family<T: std::str::FromStr>(value: Option<&str>, family: &str) -> Result<Option<T>> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(raw) => raw
            .parse()
            .map(Some)
            .map_err(|_| Error::invalid_input(format!("Invalid {} address: {}", family, raw))),
    }
}

/// What the engine did with one record
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum RecordOutcome {
    /// Record did not exist and was created
    Created {
        /// The created address
        ip: IpAddr,
    },
    /// Record existed with different content and was updated in place
    Updated {
        /// Previous record content
        previous: String,
        /// The new address
        ip: IpAddr,
    },
    /// Record already had the desired content
    Unchanged {
        /// The current address
        ip: IpAddr,
    },
}

impl RecordOutcome {
    /// Whether a create/update call was issued
    pub fn is_change(&self) -> bool {
        !matches!(self, RecordOutcome::Unchanged { .. })
    }
}

/// Result of one `update` call
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UpdateReport {
    /// Outcome for the A record, if requested
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ipv4: Option<RecordOutcome>,
    /// Outcome for the AAAA record, if requested
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ipv6: Option<RecordOutcome>,
}

impl UpdateReport {
    /// Whether any record was created or updated
    pub fn changed(&self) -> bool {
        self.ipv4.iter().chain(self.ipv6.iter()).any(RecordOutcome::is_change)
    }
}

/// Reconciliation engine
///
/// Holds a backend and the record policy; stateless otherwise.
pub struct ReconciliationEngine {
    /// Backend to reconcile against
    backend: Box<dyn DnsBackend>,

    /// TTL and proxying applied to written records
    policy: RecordPolicy,
}

impl ReconciliationEngine {
    /// Create an engine with the default record policy (TTL 1, not proxied)
    pub fn new(backend: Box<dyn DnsBackend>) -> Self {
        Self::with_policy(backend, RecordPolicy::default())
    }

    /// Create an engine with an explicit record policy
    pub fn with_policy(backend: Box<dyn DnsBackend>, policy: RecordPolicy) -> Self {
        Self { backend, policy }
    }

    /// Bring the A/AAAA records for a hostname in line with the request
    ///
    /// # Returns
    ///
    /// - `Ok(UpdateReport)`: every requested family is now in the desired state
    /// - `Err(Error::InvalidInput)`: request failed validation; no backend call made
    /// - `Err(Error::Reconcile)`: a backend call failed
    pub async fn update(&self, request: &UpdateRequest) -> Result<UpdateReport> {
        request.validate()?;

        let mut report = UpdateReport::default();

        for (record_type, ip) in request.targets() {
            let outcome = self
                .reconcile(&request.zone, &request.hostname, record_type, ip)
                .await
                .map_err(|e| {
                    Error::reconcile(format!("{} {}", record_type, request.hostname), e)
                })?;

            match record_type {
                RecordType::A => report.ipv4 = Some(outcome),
                RecordType::Aaaa => report.ipv6 = Some(outcome),
            }
        }

        Ok(report)
    }

    /// Reconcile a single record
    async fn reconcile(
        &self,
        zone: &str,
        hostname: &str,
        record_type: RecordType,
        ip: IpAddr,
    ) -> Result<RecordOutcome> {
        let current = self
            .backend
            .get_record(zone, hostname, Some(record_type))
            .await?;

        let spec = RecordSpec::new(record_type, hostname, ip.to_string())
            .with_ttl(self.policy.ttl)
            .with_meta(RecordMeta {
                proxied: self.policy.proxied,
            });

        match current {
            None => {
                debug!("No {} record for {}, creating one", record_type, hostname);
                self.backend.create_record(zone, &spec).await?;
                info!("Created {} record {} -> {}", record_type, hostname, ip);
                Ok(RecordOutcome::Created { ip })
            }
            Some(record) if content_matches(&record, &ip) => {
                debug!("{} record {} already points to {}", record_type, hostname, ip);
                Ok(RecordOutcome::Unchanged { ip })
            }
            Some(record) => {
                debug!(
                    "Found {} record for {}, but address differs: {} != {}",
                    record_type, hostname, record.content, ip
                );
                self.backend.update_record(zone, &spec).await?;
                info!(
                    "Updated {} record {} -> {} (was: {})",
                    record_type, hostname, ip, record.content
                );
                Ok(RecordOutcome::Updated {
                    previous: record.content,
                    ip,
                })
            }
        }
    }
}

/// Compare parsed addresses when possible, so `2001:DB8::1` equals `2001:db8::1`
fn content_matches(record: &DnsRecord, ip: &IpAddr) -> bool {
    match record.content.trim().parse::<IpAddr>() {
        Ok(current) => current == *ip,
        Err(_) => record.content == ip.to_string(),
    }
}
