//! Command implementations
//!
//! Each command returns the text for stdout; `main` prints it. Diagnostics go
//! through `tracing` to stderr, so quiet mode leaves only the raw value on
//! stdout.

use anyhow::{Context, Result};
use dyndns_backend_cloudflare::CloudflareFactory;
use dyndns_core::{
    CredentialCodec, Credentials, DnsBackendFactory, Envelope, IpVersion, ReconciliationEngine,
    ServiceConfig, UpdateRequest,
};
use dyndns_ip_http::HttpIpResolver;
use dyndns_remote::RemoteForwarder;
use std::sync::Arc;
use tracing::info;

/// Address families an `update-remote` forwards
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Family {
    /// IPv4 only
    V4,
    /// IPv6 only
    V6,
    /// IPv4 and IPv6
    Both,
}

impl Family {
    fn versions(self) -> &'static [IpVersion] {
        match self {
            Family::V4 => &[IpVersion::V4],
            Family::V6 => &[IpVersion::V6],
            Family::Both => &IpVersion::ALL,
        }
    }
}

/// Arguments of a local update
#[derive(Debug, Clone)]
pub struct UpdateArgs {
    pub zone: String,
    pub hostname: String,
    pub username: String,
    pub password: String,
    pub ipv4: Option<String>,
    pub ipv6: Option<String>,
}

/// Arguments of a forwarded update
#[derive(Debug, Clone)]
pub struct RemoteArgs {
    pub remote: String,
    pub zone: String,
    pub hostname: String,
    pub username: String,
    pub password: String,
    pub family: Family,
    pub scheme: String,
}

fn codec(config: &ServiceConfig) -> Result<CredentialCodec> {
    Ok(CredentialCodec::new(&config.secret)?)
}

/// Encrypt a password for use in `Authorization` headers
pub fn encrypt(config: &ServiceConfig, password: &str, quiet: bool) -> Result<String> {
    let cipher = codec(config)?.encrypt(password.trim());

    Ok(if quiet {
        cipher
    } else {
        format!("Encrypted password:\n{}", cipher)
    })
}

/// Decrypt an envelope produced by [`encrypt`]
///
/// A malformed envelope is an error. An envelope sealed under another secret
/// or tampered with decrypts to an empty value.
pub fn decrypt(config: &ServiceConfig, cipher: &str, quiet: bool) -> Result<String> {
    let envelope = Envelope::from_hex(cipher.trim()).context("Could not parse encrypted password")?;
    let plaintext = codec(config)?.open(&envelope);

    Ok(if quiet {
        plaintext
    } else {
        format!("Decrypted password:\n{}", plaintext)
    })
}

/// Decrypt a password given on the command line, rejecting unreadable ones
fn open_password(config: &ServiceConfig, cipher: &str) -> Result<String> {
    let password = codec(config)?.decrypt(cipher.trim());
    if password.is_empty() {
        return Err(dyndns_core::Error::auth(
            "Could not decrypt password; encrypt it with the same secret first",
        )
        .into());
    }
    Ok(password)
}

/// Reconcile A/AAAA records directly against Cloudflare
pub async fn update(config: &ServiceConfig, args: UpdateArgs, quiet: bool) -> Result<String> {
    let request = UpdateRequest::parse(
        args.zone.trim(),
        args.hostname.trim(),
        args.ipv4.as_deref().map(str::trim),
        args.ipv6.as_deref().map(str::trim),
    )?;
    request.validate()?;

    let password = open_password(config, &args.password)?;
    let credentials = Credentials::new(args.username.trim(), password);

    let factory = CloudflareFactory::new(
        config.cloudflare_api_url.clone(),
        config.timeouts.backend(),
    )?;
    let engine = ReconciliationEngine::with_policy(factory.create(&credentials)?, config.records);

    let report = engine.update(&request).await?;
    info!(
        "Updated {} in {} (changed: {})",
        request.hostname,
        request.zone,
        report.changed()
    );

    Ok(if quiet {
        String::new()
    } else {
        format!(
            "Record updated successfully\n{}",
            serde_json::to_string_pretty(&report)?
        )
    })
}

/// Resolve this host's addresses and forward the update to a remote instance
pub async fn update_remote(config: &ServiceConfig, args: RemoteArgs, quiet: bool) -> Result<String> {
    let password = open_password(config, &args.password)?;

    let codec = Arc::new(codec(config)?);
    let resolver = Arc::new(HttpIpResolver::new(config.timeouts.ip_resolver())?);
    let forwarder = RemoteForwarder::new(codec, resolver, config.timeouts.remote())?
        .with_scheme(args.scheme.trim())
        .with_families(args.family.versions());

    let report = forwarder
        .forward_update(
            args.remote.trim(),
            args.zone.trim(),
            args.hostname.trim(),
            args.username.trim(),
            &password,
        )
        .await?;

    Ok(if quiet {
        String::new()
    } else {
        format!(
            "Remote update sent\n{}",
            serde_json::to_string_pretty(&report)?
        )
    })
}
