//! HTTP surface
//!
//! Routes are declared once in [`route_table`]; the same table builds the
//! router and answers `GET /`. The update route is also served without the
//! `/zones` prefix, which is where `RemoteForwarder` sends its requests.
//!
//! Every response uses the envelope `{ "status": "success" | "error",
//! "result": ... }`. Errors carry `{ "message", "error" }` in `result` and
//! take their status code from the failure:
//!
//! | Failure                         | Status                        |
//! |---------------------------------|-------------------------------|
//! | invalid input                   | 400                           |
//! | missing or rejected credentials | 401                           |
//! | unknown zone or host            | 404                           |
//! | provider or remote failure      | upstream status, else 500     |

use axum::body::Bytes;
use axum::extract::{Extension, Path, Query, Request, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{MethodRouter, get, put};
use axum::{Json, Router};
use anyhow::Context;
use dyndns_backend_cloudflare::CloudflareFactory;
use dyndns_core::{
    AuthGate, CredentialCodec, Credentials, DnsBackend, DnsBackendFactory, Error, GateOutcome,
    RecordPolicy, ReconciliationEngine, ServiceConfig, UpdateRequest,
};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::future::IntoFuture;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tracing::{error, info, warn};

/// Time in-flight requests get to finish after a shutdown signal
pub const SHUTDOWN_DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// Shared request state
#[derive(Clone)]
pub struct AppState {
    gate: Arc<AuthGate>,
    factory: Arc<dyn DnsBackendFactory>,
    policy: RecordPolicy,
    routes: Arc<Map<String, Value>>,
}

/// One entry of the static route table
struct RouteEntry {
    method: &'static str,
    path: &'static str,
    description: &'static str,
    handler: MethodRouter<AppState>,
}

impl RouteEntry {
    fn new(
        method: &'static str,
        path: &'static str,
        description: &'static str,
        handler: MethodRouter<AppState>,
    ) -> Self {
        Self {
            method,
            path,
            description,
            handler,
        }
    }
}

fn route_table() -> Vec<RouteEntry> {
    vec![
        RouteEntry::new("GET", "/", "Lists all available routes", get(index)),
        RouteEntry::new("GET", "/zones", "Lists all zones", get(list_zones)),
        RouteEntry::new("GET", "/zones/{zone}", "Retrieves a single zone", get(get_zone)),
        RouteEntry::new(
            "GET",
            "/zones/{zone}/{hostname}",
            "Retrieves the DNS record of a host",
            get(get_host),
        ),
        RouteEntry::new(
            "PUT",
            "/zones/{zone}/{hostname}/update",
            "Updates the A/AAAA records of a host from ipv4/ipv6",
            put(update_host),
        ),
        RouteEntry::new(
            "GET",
            "/zones/{zone}/{hostname}/update",
            "Updates the A/AAAA records of a host (for clients limited to GET)",
            get(update_host),
        ),
        RouteEntry::new(
            "PUT",
            "/{zone}/{hostname}/update",
            "Updates the A/AAAA records of a host (forwarded by another instance)",
            put(update_host),
        ),
        RouteEntry::new(
            "GET",
            "/{zone}/{hostname}/update",
            "Updates the A/AAAA records of a host (forwarded, GET variant)",
            get(update_host),
        ),
    ]
}

/// Build the router
pub fn router(
    gate: Arc<AuthGate>,
    factory: Arc<dyn DnsBackendFactory>,
    policy: RecordPolicy,
) -> Router {
    let table = route_table();

    let routes: Map<String, Value> = table
        .iter()
        .map(|r| {
            (
                format!("[{}] {}", r.method, r.path),
                Value::String(r.description.to_string()),
            )
        })
        .collect();

    let state = AppState {
        gate,
        factory,
        policy,
        routes: Arc::new(routes),
    };

    let mut router = Router::new();
    for entry in table {
        router = router.route(entry.path, entry.handler);
    }

    router
        .fallback(fallback)
        .layer(middleware::from_fn_with_state(state.clone(), authenticate))
        .with_state(state)
}

/// Run the HTTP surface until SIGTERM or SIGINT
///
/// After a signal, in-flight requests get [`SHUTDOWN_DRAIN_TIMEOUT`] to finish.
pub async fn serve(config: &ServiceConfig) -> anyhow::Result<()> {
    let codec = Arc::new(CredentialCodec::new(&config.secret)?);
    let gate = Arc::new(AuthGate::new(codec, &config.auth));
    let factory = Arc::new(CloudflareFactory::new(
        config.cloudflare_api_url.clone(),
        config.timeouts.backend(),
    )?);

    let app = router(gate, factory, config.records);

    let listener = tokio::net::TcpListener::bind(&config.listen)
        .await
        .with_context(|| format!("Failed to bind {}", config.listen))?;
    info!("Listening on {}", listener.local_addr()?);

    let shutdown = Arc::new(Notify::new());
    let trigger = shutdown.clone();

    let server = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            match wait_for_shutdown().await {
                Ok(signal) => info!("Received shutdown signal: {}", signal),
                Err(e) => error!("Shutdown error: {}", e),
            }
            trigger.notify_one();
        })
        .into_future();
    tokio::pin!(server);

    tokio::select! {
        result = &mut server => result?,
        _ = shutdown.notified() => {
            info!("Draining in-flight requests");
            match tokio::time::timeout(SHUTDOWN_DRAIN_TIMEOUT, &mut server).await {
                Ok(result) => result?,
                Err(_) => anyhow::bail!("Shutdown timeout after {:?}", SHUTDOWN_DRAIN_TIMEOUT),
            }
        }
    }

    info!("Server stopped");
    Ok(())
}

/// Wait for shutdown signals (SIGTERM, SIGINT)
#[cfg(unix)]
async fn wait_for_shutdown() -> anyhow::Result<&'static str> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}

/// Wait for shutdown signals (SIGINT only)
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn wait_for_shutdown() -> anyhow::Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to wait for CTRL-C: {}", e))?;
    Ok("SIGINT")
}

/// Authentication middleware
///
/// Always attaches a `Credentials` extension; exempt paths get empty ones.
async fn authenticate(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    let authorization = request
        .headers()
        .get(header::AUTHORIZATION)
        .map(|v| v.to_str().unwrap_or_default().to_string());

    match state.gate.check(request.uri().path(), authorization.as_deref()) {
        GateOutcome::Exempt => {
            request.extensions_mut().insert(Credentials::empty());
        }
        GateOutcome::Challenge { www_authenticate } => {
            warn!("Unauthenticated request to {}", request.uri().path());
            return (
                StatusCode::UNAUTHORIZED,
                [(header::WWW_AUTHENTICATE, www_authenticate)],
                Json(Envelope::error(Value::String(
                    "Authentication required".to_string(),
                ))),
            )
                .into_response();
        }
        GateOutcome::Authenticated(credentials) => {
            request.extensions_mut().insert(credentials);
        }
    }

    next.run(request).await
}

#[derive(Serialize)]
struct Envelope {
    status: &'static str,
    result: Value,
}

impl Envelope {
    fn success(result: Value) -> Self {
        Self {
            status: "success",
            result,
        }
    }

    fn error(result: Value) -> Self {
        Self {
            status: "error",
            result,
        }
    }
}

fn success<T: Serialize>(result: T) -> Result<Response, ApiError> {
    let value = serde_json::to_value(result)
        .map_err(|e| ApiError::new("Could not serialize response", Error::from(e)))?;

    Ok((StatusCode::OK, Json(Envelope::success(value))).into_response())
}

/// A failed request
#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
    cause: Option<Error>,
}

impl ApiError {
    /// Failure caused by an error; the status follows the error kind
    fn new(message: impl Into<String>, cause: Error) -> Self {
        Self {
            status: status_for(&cause),
            message: message.into(),
            cause: Some(cause),
        }
    }

    /// Failure without an underlying error
    fn plain(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            cause: None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let result = match &self.cause {
            Some(cause) => {
                error!("{}: {}", self.message, cause);
                serde_json::json!({ "message": self.message, "error": cause.to_string() })
            }
            None => {
                warn!("{}", self.message);
                Value::String(self.message)
            }
        };

        (self.status, Json(Envelope::error(result))).into_response()
    }
}

/// HTTP status for a failure
fn status_for(error: &Error) -> StatusCode {
    match error.root() {
        Error::InvalidInput(_) => StatusCode::BAD_REQUEST,
        Error::Authentication(_) => StatusCode::UNAUTHORIZED,
        Error::NotFound(_) => StatusCode::NOT_FOUND,
        _ => error
            .upstream_status()
            .and_then(|s| StatusCode::from_u16(s).ok())
            .filter(|s| s.is_client_error() || s.is_server_error())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
    }
}

fn backend_for(state: &AppState, credentials: &Credentials) -> Result<Box<dyn DnsBackend>, ApiError> {
    state
        .factory
        .create(credentials)
        .map_err(|e| ApiError::new("Could not authenticate with the DNS provider", e))
}

async fn index(State(state): State<AppState>) -> Result<Response, ApiError> {
    success(state.routes.as_ref())
}

async fn list_zones(
    State(state): State<AppState>,
    Extension(credentials): Extension<Credentials>,
) -> Result<Response, ApiError> {
    let backend = backend_for(&state, &credentials)?;

    let zones = backend
        .get_zones()
        .await
        .map_err(|e| ApiError::new("Could not fetch zones", e))?;

    success(zones)
}

async fn get_zone(
    State(state): State<AppState>,
    Extension(credentials): Extension<Credentials>,
    Path(zone): Path<String>,
) -> Result<Response, ApiError> {
    let backend = backend_for(&state, &credentials)?;

    match backend
        .get_zone(&zone)
        .await
        .map_err(|e| ApiError::new("Could not fetch zone", e))?
    {
        Some(info) => success(info),
        None => Err(ApiError::plain(StatusCode::NOT_FOUND, "Zone not found")),
    }
}

async fn get_host(
    State(state): State<AppState>,
    Extension(credentials): Extension<Credentials>,
    Path((zone, hostname)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    let backend = backend_for(&state, &credentials)?;

    match backend
        .get_record(&zone, &hostname, None)
        .await
        .map_err(|e| ApiError::new("Could not fetch DNS record", e))?
    {
        Some(record) => success(record),
        None => Err(ApiError::plain(StatusCode::NOT_FOUND, "Host not found")),
    }
}

async fn update_host(
    State(state): State<AppState>,
    Extension(credentials): Extension<Credentials>,
    Path((zone, hostname)): Path<(String, String)>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let params = body_params(&headers, &body)
        .map_err(|e| ApiError::new("Invalid request body", e))?;

    let ipv4 = pick("ipv4", &params, &query);
    let ipv6 = pick("ipv6", &params, &query);

    let request = UpdateRequest::parse(zone, hostname, ipv4, ipv6)
        .map_err(|e| ApiError::new("Invalid IP address supplied", e))?;
    request
        .validate()
        .map_err(|e| ApiError::new("Invalid IP address supplied", e))?;

    let backend = backend_for(&state, &credentials)?;
    let engine = ReconciliationEngine::with_policy(backend, state.policy);

    let report = engine
        .update(&request)
        .await
        .map_err(|e| ApiError::new("Could not update DNS record", e))?;

    info!(
        "Update for {} in {} succeeded (ipv4: {:?}, ipv6: {:?})",
        request.hostname, request.zone, request.ipv4, request.ipv6
    );

    success(serde_json::json!({
        "message": "Record updated successfully",
        "records": report,
    }))
}

async fn fallback() -> ApiError {
    ApiError::plain(StatusCode::NOT_FOUND, "Route not found")
}

/// Parse `ipv4`/`ipv6` from a JSON or form-encoded body
fn body_params(headers: &HeaderMap, body: &Bytes) -> Result<HashMap<String, String>, Error> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(HashMap::new());
    }

    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    if content_type.starts_with("application/json") {
        let value: Value = serde_json::from_slice(body)
            .map_err(|e| Error::invalid_input(format!("Body is not valid JSON: {}", e)))?;

        let object = value
            .as_object()
            .ok_or_else(|| Error::invalid_input("JSON body must be an object"))?;

        return Ok(object
            .iter()
            .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
            .collect());
    }

    Ok(url::form_urlencoded::parse(body)
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect())
}

/// Body value first, then query; empty values count as absent
fn pick<'a>(
    key: &str,
    body: &'a HashMap<String, String>,
    query: &'a HashMap<String, String>,
) -> Option<&'a str> {
    [body, query]
        .into_iter()
        .filter_map(|source| source.get(key))
        .map(|v| v.trim())
        .find(|v| !v.is_empty())
}
