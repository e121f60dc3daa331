//! Contract Test: Credential Codec
//!
//! Constraints verified:
//! - decrypt(encrypt(p)) == p under the same secret
//! - Flipping any byte of the MAC or ciphertext yields an empty string
//! - An envelope sealed under one secret does not open under another
//! - The placeholder secret never produces a codec
//!
//! If this test fails, stored credentials are either unreadable or forgeable.

use dyndns_core::codec::{IV_LEN, MIN_ENVELOPE_LEN};
use dyndns_core::{CredentialCodec, DEFAULT_SECRET, Envelope, Error};

fn codec(secret: &str) -> CredentialCodec {
    CredentialCodec::new(secret).unwrap()
}

#[test]
fn roundtrip_preserves_plaintext() {
    let codec = codec("operator-secret");

    for plaintext in [
        "",
        "a",
        "0123456789abcdef",
        "global-api-key-with-exactly-thirty-two",
        "pässwörd with ünïcode and : colons",
    ] {
        assert_eq!(codec.decrypt(&codec.encrypt(plaintext)), plaintext);
    }
}

#[test]
fn every_authenticated_byte_is_tamper_evident() {
    let codec = codec("operator-secret");
    let bytes = hex::decode(codec.encrypt("cloudflare-api-key")).unwrap();

    // MAC region and ciphertext region
    for index in IV_LEN..bytes.len() {
        let mut tampered = bytes.clone();
        tampered[index] ^= 0x01;

        assert_eq!(
            codec.decrypt(&hex::encode(&tampered)),
            "",
            "flipping byte {} must fail closed",
            index
        );
    }
}

#[test]
fn different_secret_cannot_decrypt() {
    let sealed = codec("secret-one").encrypt("cloudflare-api-key");
    assert_eq!(codec("secret-two").decrypt(&sealed), "");
}

#[test]
fn placeholder_secret_is_a_config_error() {
    let err = CredentialCodec::new(DEFAULT_SECRET).unwrap_err();
    assert!(matches!(err, Error::Config(_)));
}

#[test]
fn short_or_truncated_envelopes_fail_closed() {
    let codec = codec("operator-secret");
    let sealed = codec.encrypt("cloudflare-api-key");

    assert_eq!(codec.decrypt(&sealed[..MIN_ENVELOPE_LEN * 2 - 2]), "");
    assert_eq!(codec.decrypt(&sealed[..sealed.len() - 2]), "");
    assert_eq!(codec.decrypt("badciphertext"), "");

    assert!(matches!(
        Envelope::from_hex(&sealed[..MIN_ENVELOPE_LEN * 2 - 2]),
        Err(Error::InvalidInput(_))
    ));
}

#[test]
fn envelope_opens_after_hex_transport() {
    let codec = codec("operator-secret");
    let envelope = codec.seal("cloudflare-api-key");

    let parsed = Envelope::from_hex(&envelope.to_hex().to_uppercase()).unwrap();
    assert_eq!(codec.open(&parsed), "cloudflare-api-key");
}
