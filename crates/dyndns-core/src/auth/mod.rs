//! Request authentication gate
//!
//! Every request outside the exempt path list must carry HTTP Basic
//! credentials whose password is a cipher envelope. The gate decodes the
//! header and decrypts the password; the router only attaches the result.
//!
//! ## Outcomes
//!
//! | Request                          | Outcome                               |
//! |----------------------------------|---------------------------------------|
//! | exempt path                      | [`GateOutcome::Exempt`]               |
//! | no `Authorization` header        | [`GateOutcome::Challenge`] (401)      |
//! | malformed header                 | authenticated with empty credentials  |
//! | well-formed header               | authenticated, password decrypted     |
//!
//! An undecryptable password also yields an empty password. Backends reject
//! empty credentials, which keeps a single failure path for bad credentials.

use crate::codec::CredentialCodec;
use crate::config::AuthConfig;
use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use std::sync::Arc;

/// Provider credentials extracted from a request
///
/// The password is always plaintext here; it exists only for the lifetime
/// of a request or command.
///
/// # Security
///
/// The Debug implementation intentionally does NOT expose the password.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    /// Provider account name (Cloudflare: account email)
    pub username: String,
    /// Provider password (Cloudflare: global API key or API token)
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<REDACTED>")
            .finish()
    }
}

impl Credentials {
    /// Create a credential pair
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Empty credentials, as produced for malformed or undecryptable input
    pub fn empty() -> Self {
        Self::default()
    }

    /// Whether no usable password is present
    pub fn is_empty(&self) -> bool {
        self.password.is_empty()
    }
}

/// Result of running a request through the gate
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateOutcome {
    /// Path is on the allow-list; no credentials required
    Exempt,
    /// No credentials presented; answer with a Basic challenge
    Challenge {
        /// Value for the `WWW-Authenticate` header
        www_authenticate: String,
    },
    /// Credentials extracted (possibly empty)
    Authenticated(Credentials),
}

/// Authentication gate
#[derive(Debug, Clone)]
pub struct AuthGate {
    codec: Arc<CredentialCodec>,
    realm: String,
    exempt_paths: Vec<String>,
}

impl AuthGate {
    /// Create a gate from a codec and the auth configuration
    pub fn new(codec: Arc<CredentialCodec>, config: &AuthConfig) -> Self {
        Self {
            codec,
            realm: config.realm.clone(),
            exempt_paths: config
                .exempt_paths
                .iter()
                .map(|p| p.trim_end_matches('/').to_string())
                .collect(),
        }
    }

    /// Check a request path and `Authorization` header value
    pub fn check(&self, path: &str, authorization: Option<&str>) -> GateOutcome {
        if !self.requires_auth(path) {
            return GateOutcome::Exempt;
        }

        match authorization {
            None => GateOutcome::Challenge {
                www_authenticate: self.challenge(),
            },
            Some(header) => GateOutcome::Authenticated(self.extract(header)),
        }
    }

    /// Whether a path needs credentials
    ///
    /// An exempt prefix matches the path itself and everything below it.
    /// The root entry (`/`) matches only the root path.
    pub fn requires_auth(&self, path: &str) -> bool {
        !self.exempt_paths.iter().any(|prefix| {
            if prefix.is_empty() {
                return path == "/" || path.is_empty();
            }

            match path.strip_prefix(prefix.as_str()) {
                Some(rest) => rest.is_empty() || rest.starts_with('/'),
                None => false,
            }
        })
    }

    /// `WWW-Authenticate` challenge value
    pub fn challenge(&self) -> String {
        format!("Basic realm=\"{}\"", self.realm)
    }

    /// Extract credentials from an `Authorization` header value
    ///
    /// Malformed headers yield empty credentials rather than an error.
    pub fn extract(&self, header: &str) -> Credentials {
        let Some((username, encrypted)) = parse_basic(header) else {
            tracing::debug!("Malformed Authorization header, continuing with empty credentials");
            return Credentials::empty();
        };

        let password = self.codec.decrypt(&encrypted);
        if password.is_empty() {
            tracing::warn!("Could not decrypt password for user {}", username);
        }

        Credentials { username, password }
    }
}

/// Decode `Basic <base64(user:pass)>`, splitting on the first colon
fn parse_basic(header: &str) -> Option<(String, String)> {
    let (scheme, encoded) = header.trim().split_once(char::is_whitespace)?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }

    let decoded = BASE64.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (username, password) = decoded.split_once(':')?;

    Some((username.to_string(), password.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gate(exempt: &[&str]) -> AuthGate {
        let codec = Arc::new(CredentialCodec::new("gate-secret").unwrap());
        let config = AuthConfig {
            realm: "Cloudflare DynDNS".to_string(),
            exempt_paths: exempt.iter().map(|s| s.to_string()).collect(),
        };
        AuthGate::new(codec, &config)
    }

    fn basic(user: &str, pass: &str) -> String {
        format!("Basic {}", BASE64.encode(format!("{}:{}", user, pass)))
    }

    #[test]
    fn test_parse_basic_splits_on_first_colon() {
        let header = basic("user@example.com", "pa:ss");
        assert_eq!(
            parse_basic(&header),
            Some(("user@example.com".to_string(), "pa:ss".to_string()))
        );
    }

    #[test]
    fn test_parse_basic_scheme_case_insensitive() {
        let header = basic("u", "p").replace("Basic", "bAsIc");
        assert!(parse_basic(&header).is_some());
    }

    #[test]
    fn test_parse_basic_rejects_garbage() {
        assert_eq!(parse_basic("Bearer abc"), None);
        assert_eq!(parse_basic("Basic !!!notbase64"), None);
        assert_eq!(parse_basic(&format!("Basic {}", BASE64.encode("nocolon"))), None);
        assert_eq!(parse_basic("Basic"), None);
    }

    #[test]
    fn test_missing_header_challenges() {
        let outcome = gate(&[]).check("/zones", None);
        assert_eq!(
            outcome,
            GateOutcome::Challenge {
                www_authenticate: "Basic realm=\"Cloudflare DynDNS\"".to_string()
            }
        );
    }

    #[test]
    fn test_valid_envelope_decrypted() {
        let gate = gate(&[]);
        let cipher = gate.codec.encrypt("api-key");

        let outcome = gate.check("/zones/z/h", Some(&basic("user", &cipher)));
        assert_eq!(
            outcome,
            GateOutcome::Authenticated(Credentials::new("user", "api-key"))
        );
    }

    #[test]
    fn test_bad_cipher_yields_empty_password() {
        let outcome = gate(&[]).check("/zones/z/h", Some(&basic("user", "badciphertext")));

        match outcome {
            GateOutcome::Authenticated(credentials) => {
                assert_eq!(credentials.username, "user");
                assert!(credentials.is_empty());
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn test_malformed_header_yields_empty_credentials() {
        let outcome = gate(&[]).check("/zones", Some("Basic %%%"));
        assert_eq!(outcome, GateOutcome::Authenticated(Credentials::empty()));
    }

    #[test]
    fn test_exempt_prefix_matching() {
        let gate = gate(&["/health/", "/"]);

        assert!(!gate.requires_auth("/"));
        assert!(!gate.requires_auth("/health"));
        assert!(!gate.requires_auth("/health/live"));
        assert!(gate.requires_auth("/healthz"));
        assert!(gate.requires_auth("/zones"));
    }

    #[test]
    fn test_root_exemption_does_not_cover_subpaths() {
        let gate = gate(&["/"]);

        assert_eq!(gate.check("/", None), GateOutcome::Exempt);
        assert!(matches!(
            gate.check("/zones", None),
            GateOutcome::Challenge { .. }
        ));
        assert!(matches!(
            gate.check("/zones/example.com/home.example.com/update", None),
            GateOutcome::Challenge { .. }
        ));
    }

    #[test]
    fn test_debug_redacts_password() {
        let debug = format!("{:?}", Credentials::new("user", "hunter2"));
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("user"));
    }
}
