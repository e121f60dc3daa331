//! Credential codec
//!
//! Encrypts provider passwords under a key derived from the operator secret,
//! so the plaintext password never has to be stored or typed again.
//!
//! ## Envelope
//!
//! ```text
//! ┌──────────┬────────────────────┬────────────────────────┐
//! │ IV (16)  │ HMAC-SHA256 (32)   │ AES-256-CBC ciphertext │
//! └──────────┴────────────────────┴────────────────────────┘
//! ```
//!
//! The envelope travels as a lowercase hex string. The AES key is
//! `SHA-256(secret)`; the HMAC is computed over the ciphertext with the same
//! key (encrypt-then-MAC).
//!
//! ## Failing closed
//!
//! [`CredentialCodec::decrypt`] returns an empty string when the MAC does not
//! verify. Callers treat an empty password as "not authenticated"; no error
//! path exists that could tell a tampered envelope apart from a wrong secret.

use crate::error::{Error, Result};
use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit, block_padding::Pkcs7};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;
type HmacSha256 = Hmac<Sha256>;

/// Placeholder secret shipped in sample configuration. Never usable.
pub const DEFAULT_SECRET: &str = "__DEFAULT__";

/// Length of the initialization vector in bytes
pub const IV_LEN: usize = 16;

/// Length of the HMAC-SHA256 tag in bytes
pub const MAC_LEN: usize = 32;

/// Minimum envelope length: IV and MAC with an empty ciphertext
pub const MIN_ENVELOPE_LEN: usize = IV_LEN + MAC_LEN;

/// A parsed cipher envelope
#[derive(Clone, PartialEq, Eq)]
pub struct Envelope {
    iv: [u8; IV_LEN],
    mac: [u8; MAC_LEN],
    ciphertext: Vec<u8>,
}

impl Envelope {
    /// Parse an envelope from its hex transport form
    ///
    /// # Returns
    ///
    /// - `Err(Error::InvalidInput)`: not hex, or shorter than 48 bytes
    pub fn from_hex(envelope_hex: &str) -> Result<Self> {
        let bytes = hex::decode(envelope_hex.trim())
            .map_err(|e| Error::invalid_input(format!("Cipher is not valid hex: {}", e)))?;

        Self::from_bytes(&bytes)
    }

    /// Parse an envelope from raw bytes by fixed offsets (16 / 32 / rest)
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < MIN_ENVELOPE_LEN {
            return Err(Error::invalid_input(format!(
                "Cipher too short: {} bytes (minimum {})",
                bytes.len(),
                MIN_ENVELOPE_LEN
            )));
        }

        let (iv, rest) = bytes.split_at(IV_LEN);
        let (mac, ciphertext) = rest.split_at(MAC_LEN);

        let mut envelope = Self {
            iv: [0; IV_LEN],
            mac: [0; MAC_LEN],
            ciphertext: ciphertext.to_vec(),
        };
        envelope.iv.copy_from_slice(iv);
        envelope.mac.copy_from_slice(mac);

        Ok(envelope)
    }

    /// Serialize as `IV || HMAC || ciphertext`
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(MIN_ENVELOPE_LEN + self.ciphertext.len());
        bytes.extend_from_slice(&self.iv);
        bytes.extend_from_slice(&self.mac);
        bytes.extend_from_slice(&self.ciphertext);
        bytes
    }

    /// Serialize to the hex transport form
    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }
}

impl std::fmt::Debug for Envelope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Envelope")
            .field("ciphertext_len", &self.ciphertext.len())
            .finish_non_exhaustive()
    }
}

/// Symmetric codec for provider passwords
///
/// Holds only the key derived from the operator secret. Construction fails on
/// the placeholder secret, so a codec that exists is always usable.
///
/// # Security
///
/// The Debug implementation intentionally does NOT expose the key.
#[derive(Clone)]
pub struct CredentialCodec {
    key: [u8; 32],
    mac_template: HmacSha256,
}

impl std::fmt::Debug for CredentialCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialCodec")
            .field("key", &"<REDACTED>")
            .finish()
    }
}

impl CredentialCodec {
    /// Create a codec from the operator secret
    ///
    /// # Returns
    ///
    /// - `Err(Error::Config)`: the secret is empty or still [`DEFAULT_SECRET`]
    pub fn new(secret: &str) -> Result<Self> {
        if secret == DEFAULT_SECRET {
            return Err(Error::config(
                "Application secret has not been changed! Set a long random value, \
                 e.g. from: openssl rand -base64 32",
            ));
        }

        if secret.is_empty() {
            return Err(Error::config("Application secret cannot be empty"));
        }

        let key: [u8; 32] = Sha256::digest(secret.as_bytes()).into();
        let mac_template = <HmacSha256 as Mac>::new_from_slice(&key)
            .map_err(|e| Error::config(format!("Cannot derive HMAC key: {}", e)))?;

        Ok(Self { key, mac_template })
    }

    /// Encrypt a plaintext password into a hex envelope
    ///
    /// A fresh random IV is drawn for every call, so encrypting the same
    /// password twice yields different envelopes.
    pub fn encrypt(&self, plaintext: &str) -> String {
        self.seal(plaintext).to_hex()
    }

    /// Encrypt a plaintext password into an [`Envelope`]
    pub fn seal(&self, plaintext: &str) -> Envelope {
        let iv: [u8; IV_LEN] = rand::random();

        let ciphertext = Aes256CbcEnc::new(&self.key.into(), &iv.into())
            .encrypt_padded_vec_mut::<Pkcs7>(plaintext.as_bytes());

        let mut mac = [0; MAC_LEN];
        mac.copy_from_slice(&self.mac(&ciphertext).finalize().into_bytes());

        Envelope {
            iv,
            mac,
            ciphertext,
        }
    }

    /// Decrypt a hex envelope
    ///
    /// Returns an empty string for anything that is not a well-formed envelope
    /// sealed under this secret: bad hex, short input, MAC mismatch, bad
    /// padding or non-UTF-8 plaintext.
    pub fn decrypt(&self, envelope_hex: &str) -> String {
        match Envelope::from_hex(envelope_hex) {
            Ok(envelope) => self.open(&envelope),
            Err(e) => {
                tracing::debug!("Rejecting malformed cipher envelope: {}", e);
                String::new()
            }
        }
    }

    /// Verify and decrypt a parsed envelope
    ///
    /// The MAC is checked (in constant time) before the ciphertext reaches the
    /// cipher. Returns an empty string if verification fails.
    pub fn open(&self, envelope: &Envelope) -> String {
        if self
            .mac(&envelope.ciphertext)
            .verify_slice(&envelope.mac)
            .is_err()
        {
            tracing::debug!("Cipher envelope failed integrity check");
            return String::new();
        }

        let plaintext = match Aes256CbcDec::new(&self.key.into(), &envelope.iv.into())
            .decrypt_padded_vec_mut::<Pkcs7>(&envelope.ciphertext)
        {
            Ok(plaintext) => plaintext,
            Err(_) => {
                tracing::debug!("Cipher envelope has invalid padding");
                return String::new();
            }
        };

        String::from_utf8(plaintext).unwrap_or_default()
    }

    fn mac(&self, ciphertext: &[u8]) -> HmacSha256 {
        let mut mac = self.mac_template.clone();
        mac.update(ciphertext);
        mac
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_secret_rejected() {
        let err = CredentialCodec::new(DEFAULT_SECRET).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_empty_secret_rejected() {
        assert!(matches!(CredentialCodec::new(""), Err(Error::Config(_))));
    }

    #[test]
    fn test_roundtrip() {
        let codec = CredentialCodec::new("correct horse battery staple").unwrap();
        let cipher = codec.encrypt("cloudflare-global-key");

        assert_eq!(codec.decrypt(&cipher), "cloudflare-global-key");
    }

    #[test]
    fn test_envelope_layout() {
        let codec = CredentialCodec::new("secret").unwrap();

        // 5 bytes of plaintext pad to one 16-byte block
        let cipher = codec.encrypt("hello");
        assert_eq!(cipher.len(), (MIN_ENVELOPE_LEN + 16) * 2);
        assert!(cipher.chars().all(|c| c.is_ascii_hexdigit()));

        // A full block of plaintext gains a whole padding block
        let cipher = codec.encrypt("0123456789abcdef");
        assert_eq!(cipher.len(), (MIN_ENVELOPE_LEN + 32) * 2);
    }

    #[test]
    fn test_fresh_iv_per_call() {
        let codec = CredentialCodec::new("secret").unwrap();
        let a = codec.encrypt("password");
        let b = codec.encrypt("password");

        assert_ne!(a, b);
        assert_ne!(a[..IV_LEN * 2], b[..IV_LEN * 2]);
    }

    #[test]
    fn test_short_envelope_is_invalid_input() {
        let err = Envelope::from_hex(&"00".repeat(MIN_ENVELOPE_LEN - 1)).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));

        assert!(Envelope::from_hex(&"00".repeat(MIN_ENVELOPE_LEN)).is_ok());
    }

    #[test]
    fn test_non_hex_is_invalid_input() {
        assert!(matches!(
            Envelope::from_hex("not-a-cipher"),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_malformed_input_decrypts_to_empty() {
        let codec = CredentialCodec::new("secret").unwrap();

        assert_eq!(codec.decrypt("badciphertext"), "");
        assert_eq!(codec.decrypt(""), "");
        assert_eq!(codec.decrypt("abcd"), "");
    }

    #[test]
    fn test_envelope_bytes_roundtrip() {
        let codec = CredentialCodec::new("secret").unwrap();
        let envelope = codec.seal("pw");
        let parsed = Envelope::from_bytes(&envelope.to_bytes()).unwrap();

        assert_eq!(parsed, envelope);
        assert_eq!(codec.open(&parsed), "pw");
    }

    #[test]
    fn test_debug_redacts_key() {
        let codec = CredentialCodec::new("secret").unwrap();
        let debug = format!("{:?}", codec);

        assert!(debug.contains("<REDACTED>"));
        assert!(!debug.contains(&hex::encode(Sha256::digest(b"secret"))));
    }
}
