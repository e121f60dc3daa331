//! Contract Test: Authentication Gate
//!
//! Constraints verified:
//! - No header on a protected path yields a Basic challenge, never a decrypt
//! - A header whose password does not decrypt yields an empty password
//! - Empty credentials are rejected by the backend factory as unauthorized
//! - Exempt prefixes cover the prefix and everything below it
//!
//! If this test fails, requests may reach a backend with forged credentials.

use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use dyndns_core::traits::{DnsBackend, DnsBackendFactory};
use dyndns_core::{AuthConfig, AuthGate, CredentialCodec, Credentials, Error, GateOutcome};
use std::sync::Arc;

/// Factory that refuses empty credentials, like every real backend factory
struct RejectingFactory;

impl DnsBackendFactory for RejectingFactory {
    fn create(&self, credentials: &Credentials) -> Result<Box<dyn DnsBackend>, Error> {
        if credentials.is_empty() {
            return Err(Error::auth("Invalid credentials"));
        }
        Err(Error::Other("not needed in this test".to_string()))
    }
}

fn gate(exempt: &[&str]) -> (AuthGate, Arc<CredentialCodec>) {
    let codec = Arc::new(CredentialCodec::new("gate-secret").unwrap());
    let config = AuthConfig {
        exempt_paths: exempt.iter().map(|s| s.to_string()).collect(),
        ..AuthConfig::default()
    };
    (AuthGate::new(codec.clone(), &config), codec)
}

fn basic(user: &str, pass: &str) -> String {
    format!("Basic {}", BASE64.encode(format!("{}:{}", user, pass)))
}

#[test]
fn bad_ciphertext_reaches_backend_as_unauthorized() {
    let (gate, _) = gate(&[]);

    let credentials = match gate.check("/zones/z/h", Some(&basic("user", "badciphertext"))) {
        GateOutcome::Authenticated(credentials) => credentials,
        other => panic!("expected credentials, got {:?}", other),
    };
    assert_eq!(credentials.password, "");

    let err = RejectingFactory.create(&credentials).err().unwrap();
    assert!(matches!(err, Error::Authentication(_)));
}

#[test]
fn missing_header_is_challenged_with_product_realm() {
    let (gate, _) = gate(&[]);

    assert_eq!(
        gate.check("/zones", None),
        GateOutcome::Challenge {
            www_authenticate: "Basic realm=\"cloudflare-dyndns\"".to_string()
        }
    );
}

#[test]
fn encrypted_password_is_decrypted_for_the_handler() {
    let (gate, codec) = gate(&[]);
    let header = basic("user@example.com", &codec.encrypt("global-api-key"));

    assert_eq!(
        gate.check("/zones/example.com", Some(&header)),
        GateOutcome::Authenticated(Credentials::new("user@example.com", "global-api-key"))
    );
}

#[test]
fn exempt_paths_skip_credentials() {
    let (gate, _) = gate(&["/", "/status"]);

    assert_eq!(gate.check("/", None), GateOutcome::Exempt);
    assert_eq!(gate.check("/status", None), GateOutcome::Exempt);
    assert_eq!(gate.check("/status/deep", None), GateOutcome::Exempt);
    assert!(matches!(
        gate.check("/statuses", None),
        GateOutcome::Challenge { .. }
    ));
    assert!(matches!(gate.check("/zones", None), GateOutcome::Challenge { .. }));
}
