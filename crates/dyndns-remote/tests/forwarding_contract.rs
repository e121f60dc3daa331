//! Contract Test: Remote Forwarding
//!
//! Constraints verified:
//! - The forward is a PUT to `/{zone}/{hostname}/update`
//! - Resolved addresses travel as `ipv4`/`ipv6` query parameters
//! - The password travels encrypted and opens under the shared secret
//! - The request identifies the product in `User-Agent`
//! - Non-success responses surface the remote's status and message
//! - A remote that stalls past the timeout is a transport error
//!
//! If this test fails, remote instances can no longer apply forwarded updates.

use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use dyndns_core::traits::{IpResolver, IpVersion};
use dyndns_core::{CredentialCodec, Error, Result};
use dyndns_remote::RemoteForwarder;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct StaticResolver {
    ipv4: IpAddr,
    ipv6: IpAddr,
}

#[async_trait::async_trait]
impl IpResolver for StaticResolver {
    async fn resolve(&self, version: IpVersion) -> Result<IpAddr> {
        Ok(match version {
            IpVersion::V4 => self.ipv4,
            IpVersion::V6 => self.ipv6,
        })
    }
}

fn codec() -> Arc<CredentialCodec> {
    Arc::new(CredentialCodec::new("shared-secret").unwrap())
}

fn forwarder(codec: Arc<CredentialCodec>) -> RemoteForwarder {
    let resolver = Arc::new(StaticResolver {
        ipv4: "203.0.113.9".parse().unwrap(),
        ipv6: "2001:db8::9".parse().unwrap(),
    });

    RemoteForwarder::new(codec, resolver, Duration::from_secs(5))
        .unwrap()
        .with_scheme("http")
}

fn success_body() -> serde_json::Value {
    serde_json::json!({ "status": "success", "result": { "ipv4": { "action": "unchanged" } } })
}

#[tokio::test]
async fn forward_carries_addresses_and_encrypted_password() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/example.com/home.example.com/update"))
        .and(query_param("ipv4", "203.0.113.9"))
        .and(query_param("ipv6", "2001:db8::9"))
        .respond_with(ResponseTemplate::new(200).set_body_json(success_body()))
        .expect(1)
        .mount(&server)
        .await;

    let codec = codec();
    let report = forwarder(codec.clone())
        .forward_update(
            &server.address().to_string(),
            "example.com",
            "home.example.com",
            "user@example.com",
            "global-api-key",
        )
        .await
        .unwrap();

    assert_eq!(report.ipv4, Some("203.0.113.9".parse().unwrap()));
    assert_eq!(report.response["status"], "success");

    let requests = server.received_requests().await.unwrap();
    let request = &requests[0];

    let user_agent = request.headers.get("user-agent").unwrap().to_str().unwrap();
    assert!(user_agent.starts_with("cloudflare-dyndns/"));

    let authorization = request
        .headers
        .get("authorization")
        .unwrap()
        .to_str()
        .unwrap();
    let decoded = BASE64
        .decode(authorization.strip_prefix("Basic ").unwrap())
        .unwrap();
    let decoded = String::from_utf8(decoded).unwrap();
    let (username, cipher) = decoded.split_once(':').unwrap();

    assert_eq!(username, "user@example.com");
    assert_ne!(cipher, "global-api-key");
    assert_eq!(codec.decrypt(cipher), "global-api-key");
}

#[tokio::test]
async fn family_restriction_limits_query() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(200).set_body_json(success_body()))
        .mount(&server)
        .await;

    let report = forwarder(codec())
        .with_families(&[IpVersion::V6])
        .forward_update(&server.address().to_string(), "z", "h", "u", "p")
        .await
        .unwrap();

    assert_eq!(report.ipv4, None);

    let requests = server.received_requests().await.unwrap();
    let query = requests[0].url.query().unwrap_or_default();
    assert!(query.contains("ipv6="));
    assert!(!query.contains("ipv4="));
}

#[tokio::test]
async fn remote_error_is_surfaced_with_status() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
            "status": "error",
            "result": { "message": "Invalid credentials", "error": "Authentication" }
        })))
        .mount(&server)
        .await;

    let err = forwarder(codec())
        .forward_update(&server.address().to_string(), "z", "h", "u", "p")
        .await
        .unwrap_err();

    match err {
        Error::Remote { status, message } => {
            assert_eq!(status, Some(401));
            assert_eq!(message, "Invalid credentials");
        }
        other => panic!("expected remote error, got {:?}", other),
    }
}

#[tokio::test]
async fn stalled_remote_times_out_as_transport_error() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(success_body())
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let resolver = Arc::new(StaticResolver {
        ipv4: "203.0.113.9".parse().unwrap(),
        ipv6: "2001:db8::9".parse().unwrap(),
    });
    let forwarder = RemoteForwarder::new(codec(), resolver, Duration::from_millis(300))
        .unwrap()
        .with_scheme("http");

    let err = forwarder
        .forward_update(&server.address().to_string(), "z", "h", "u", "p")
        .await
        .unwrap_err();

    match err {
        Error::Http(message) => assert!(message.contains("timed out"), "{}", message),
        other => panic!("expected transport error, got {:?}", other),
    }
}

#[tokio::test]
async fn unreachable_remote_is_transport_error() {
    // Bind and drop a listener so the port is closed
    let address = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    };

    let err = forwarder(codec())
        .forward_update(&address.to_string(), "z", "h", "u", "p")
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Http(_)));
}
