// # Cloudflare DNS Backend
//
// This crate implements the `DnsBackend` capability against the Cloudflare
// API v4.
//
// ## Behavior
//
// - One backend per request, bound to the caller's credentials
// - Every call is a fresh API read or write; nothing is cached
// - No retry logic; errors carry Cloudflare's HTTP status upward
// - HTTP timeout comes from configuration (30 seconds by default)
//
// ## Authentication
//
// | Credentials                      | Headers sent                          |
// |----------------------------------|---------------------------------------|
// | username + password              | `X-Auth-Email` + `X-Auth-Key`         |
// | empty username + password        | `Authorization: Bearer <password>`    |
// | empty password                   | rejected by the factory               |
//
// ## Security Requirements
//
// - The API key or token NEVER appears in logs or Debug output
//
// ## API Reference
//
// - Cloudflare API v4: https://developers.cloudflare.com/api/
// - List Zones: GET `/zones?name=...`
// - List DNS Records: GET `/zones/:zone_id/dns_records?name=...&type=...`
// - Create DNS Record: POST `/zones/:zone_id/dns_records`
// - Update DNS Record: PUT `/zones/:zone_id/dns_records/:record_id`

use async_trait::async_trait;
use dyndns_core::traits::{
    DnsBackend, DnsBackendFactory, DnsRecord, RecordSpec, RecordType, ZoneInfo,
};
use dyndns_core::{Credentials, Error, Result};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Page size for list calls
const PER_PAGE: u32 = 100;

const BACKEND_NAME: &str = "cloudflare";

/// Cloudflare credential flavors
#[derive(Clone)]
enum CloudflareAuth {
    /// Account email and global API key
    GlobalKey { email: String, key: String },
    /// Scoped API token
    Token(String),
}

impl CloudflareAuth {
    fn from_credentials(credentials: &Credentials) -> Result<Self> {
        if credentials.is_empty() {
            return Err(Error::auth("Invalid credentials"));
        }

        if credentials.username.is_empty() {
            Ok(Self::Token(credentials.password.clone()))
        } else {
            Ok(Self::GlobalKey {
                email: credentials.username.clone(),
                key: credentials.password.clone(),
            })
        }
    }

    fn apply(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self {
            Self::GlobalKey { email, key } => request
                .header("X-Auth-Email", email)
                .header("X-Auth-Key", key),
            Self::Token(token) => request.bearer_auth(token),
        }
    }
}

/// Envelope of every Cloudflare API response
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    errors: Vec<ApiMessage>,
    result: Option<T>,
    result_info: Option<ResultInfo>,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct ResultInfo {
    #[serde(default = "first_page")]
    total_pages: u32,
}

fn first_page() -> u32 {
    1
}

fn describe_errors(errors: &[ApiMessage]) -> String {
    errors
        .iter()
        .map(|e| format!("{} ({})", e.message, e.code))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Cloudflare DNS backend
///
/// # Security
///
/// The Debug implementation intentionally does NOT expose the API key.
pub struct CloudflareBackend {
    /// Credentials for every call
    /// ⚠️ NEVER log this value
    auth: CloudflareAuth,

    /// API base URL (overridable for tests)
    base_url: String,

    /// HTTP client for API requests
    client: reqwest::Client,
}

// Custom Debug implementation that hides the API key
impl std::fmt::Debug for CloudflareBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let auth = match &self.auth {
            CloudflareAuth::GlobalKey { email, .. } => format!("global key for {}", email),
            CloudflareAuth::Token(_) => "api token".to_string(),
        };

        f.debug_struct("CloudflareBackend")
            .field("auth", &auth)
            .field("credential", &"<REDACTED>")
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl CloudflareBackend {
    /// Create a backend for the given credentials
    ///
    /// # Returns
    ///
    /// - `Err(Error::Authentication)`: the password is empty
    pub fn new(credentials: &Credentials, base_url: impl Into<String>, client: reqwest::Client) -> Result<Self> {
        Ok(Self {
            auth: CloudflareAuth::from_credentials(credentials)?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Send a request and unwrap the Cloudflare envelope
    async fn send<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        context: &str,
    ) -> Result<ApiResponse<T>> {
        let response = self
            .auth
            .apply(request)
            .header("Content-Type", "application/json")
            .send()
            .await
            .map_err(|e| Error::backend(BACKEND_NAME, format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());

            return Err(map_status(status.as_u16(), &error_text, context));
        }

        let body: ApiResponse<T> = response.json().await.map_err(|e| {
            Error::backend(BACKEND_NAME, format!("Failed to parse response: {}", e))
        })?;

        if !body.success {
            return Err(Error::backend(
                BACKEND_NAME,
                format!("{} failed: {}", context, describe_errors(&body.errors)),
            ));
        }

        Ok(body)
    }

    /// GET a list endpoint, following pagination
    async fn get_paged<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
        context: &str,
    ) -> Result<Vec<T>> {
        let mut items = Vec::new();
        let mut page = 1u32;

        loop {
            let request = self
                .client
                .get(self.url(path))
                .query(query)
                .query(&[("page", page), ("per_page", PER_PAGE)]);

            let response: ApiResponse<Vec<T>> = self.send(request, context).await?;
            let total_pages = response
                .result_info
                .as_ref()
                .map(|info| info.total_pages)
                .unwrap_or(1);

            items.extend(response.result.unwrap_or_default());

            if page >= total_pages {
                break;
            }
            page += 1;
        }

        Ok(items)
    }

    /// Resolve a zone name to its Cloudflare zone ID
    async fn zone_id(&self, zone: &str) -> Result<String> {
        self.get_zone(zone)
            .await?
            .map(|z| z.id)
            .ok_or_else(|| Error::not_found(format!("Zone not found: {}", zone)))
    }

    async fn list_records(
        &self,
        zone_id: &str,
        name: Option<&str>,
        record_type: Option<RecordType>,
    ) -> Result<Vec<DnsRecord>> {
        let mut query = Vec::new();
        if let Some(name) = name {
            query.push(("name", name.to_string()));
        }
        if let Some(record_type) = record_type {
            query.push(("type", record_type.to_string()));
        }

        self.get_paged(
            &format!("/zones/{}/dns_records", zone_id),
            &query,
            "Record lookup",
        )
        .await
    }

    fn record_payload(record: &RecordSpec) -> serde_json::Value {
        serde_json::json!({
            "type": record.record_type.as_str(),
            "name": record.name,
            "content": record.content,
            "ttl": record.ttl,
            "proxied": record.meta.proxied,
        })
    }
}

/// Map a non-success HTTP status to an error carrying that status
fn map_status(status: u16, error_text: &str, context: &str) -> Error {
    match status {
        401 | 403 => Error::backend_status(
            BACKEND_NAME,
            status,
            format!(
                "Authentication failed: Invalid API credentials or insufficient permissions. Status: {}",
                status
            ),
        ),
        404 => Error::not_found(format!("{}: {}", context, error_text)),
        409 => Error::backend_status(
            BACKEND_NAME,
            status,
            format!("Conflict: {}", error_text),
        ),
        429 => Error::backend_status(
            BACKEND_NAME,
            status,
            "Rate limit exceeded. Please retry later.",
        ),
        500..=599 => Error::backend_status(
            BACKEND_NAME,
            status,
            format!("Cloudflare server error: {}", error_text),
        ),
        _ => Error::backend_status(
            BACKEND_NAME,
            status,
            format!("{} failed: {}", context, error_text),
        ),
    }
}

fn same_name(a: &str, b: &str) -> bool {
    a.trim_end_matches('.')
        .eq_ignore_ascii_case(b.trim_end_matches('.'))
}

#[async_trait]
impl DnsBackend for CloudflareBackend {
    async fn create_record(&self, zone: &str, record: &RecordSpec) -> Result<()> {
        let zone_id = self.zone_id(zone).await?;

        tracing::debug!(
            "Creating {} record {} -> {}",
            record.record_type,
            record.name,
            record.content
        );

        let request = self
            .client
            .post(self.url(&format!("/zones/{}/dns_records", zone_id)))
            .json(&Self::record_payload(record));

        let _: ApiResponse<serde_json::Value> = self.send(request, "Record creation").await?;
        Ok(())
    }

    async fn update_record(&self, zone: &str, record: &RecordSpec) -> Result<()> {
        let zone_id = self.zone_id(zone).await?;

        let existing = self
            .list_records(&zone_id, Some(&record.name), Some(record.record_type))
            .await?
            .into_iter()
            .find(|r| same_name(&r.name, &record.name))
            .ok_or_else(|| {
                Error::not_found(format!(
                    "DNS record not found: {} (type: {})",
                    record.name, record.record_type
                ))
            })?;

        tracing::debug!(
            "Updating {} record {} ({}) -> {}",
            record.record_type,
            record.name,
            existing.id,
            record.content
        );

        let request = self
            .client
            .put(self.url(&format!("/zones/{}/dns_records/{}", zone_id, existing.id)))
            .json(&Self::record_payload(record));

        let _: ApiResponse<serde_json::Value> = self.send(request, "Record update").await?;
        Ok(())
    }

    async fn get_record(
        &self,
        zone: &str,
        name: &str,
        record_type: Option<RecordType>,
    ) -> Result<Option<DnsRecord>> {
        let zone_id = self.zone_id(zone).await?;

        Ok(self
            .list_records(&zone_id, Some(name), record_type)
            .await?
            .into_iter()
            .find(|r| same_name(&r.name, name)))
    }

    async fn get_records(
        &self,
        zone: &str,
        record_type: Option<RecordType>,
    ) -> Result<Vec<DnsRecord>> {
        let zone_id = self.zone_id(zone).await?;
        self.list_records(&zone_id, None, record_type).await
    }

    async fn get_zone(&self, zone: &str) -> Result<Option<ZoneInfo>> {
        tracing::debug!("Looking up zone: {}", zone);

        let zones: Vec<ZoneInfo> = self
            .get_paged("/zones", &[("name", zone.to_string())], "Zone lookup")
            .await?;

        Ok(zones.into_iter().find(|z| same_name(&z.name, zone)))
    }

    async fn get_zones(&self) -> Result<Vec<ZoneInfo>> {
        self.get_paged("/zones", &[], "Zone listing").await
    }

    fn backend_name(&self) -> &'static str {
        BACKEND_NAME
    }
}

/// Factory for creating Cloudflare backends bound to request credentials
#[derive(Debug, Clone)]
pub struct CloudflareFactory {
    base_url: String,
    client: reqwest::Client,
}

impl CloudflareFactory {
    /// Create a factory
    ///
    /// # Parameters
    ///
    /// - `base_url`: Cloudflare API base URL
    /// - `timeout`: Upper bound for each API call
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(dyndns_core::user_agent())
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            base_url: base_url.into(),
            client,
        })
    }
}

impl DnsBackendFactory for CloudflareFactory {
    fn create(&self, credentials: &Credentials) -> Result<Box<dyn DnsBackend>> {
        Ok(Box::new(CloudflareBackend::new(
            credentials,
            self.base_url.clone(),
            self.client.clone(),
        )?))
    }
}
