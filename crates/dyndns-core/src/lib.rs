// # dyndns-core
//
// Core library for the Cloudflare dynamic DNS updater.
//
// ## Architecture Overview
//
// This library provides the pieces every entry point (HTTP server, CLI,
// remote forwarder) shares:
// - **CredentialCodec**: Encrypt-then-MAC envelope for provider passwords
// - **AuthGate**: Basic-auth extraction with transparent password decryption
// - **DnsBackend / DnsBackendFactory**: Capability traits for the DNS provider
// - **IpResolver**: Capability trait for public IP discovery
// - **ReconciliationEngine**: Idempotent create/update/skip of A/AAAA records
//
// ## Design Principles
//
// 1. **Explicit wiring**: Every dependency is constructed at startup and passed in
// 2. **Fresh reads**: The engine re-reads provider state before each decision
// 3. **Fail closed**: Undecryptable credentials become empty credentials
// 4. **Library-First**: The binary only parses input and formats output

pub mod auth;
pub mod codec;
pub mod config;
pub mod engine;
pub mod error;
pub mod traits;

// Re-export core types for convenience
pub use auth::{AuthGate, Credentials, GateOutcome};
pub use codec::{CredentialCodec, DEFAULT_SECRET, Envelope};
pub use config::{AuthConfig, RecordPolicy, ServiceConfig, TimeoutConfig, user_agent};
pub use engine::{ReconciliationEngine, RecordOutcome, UpdateReport, UpdateRequest};
pub use error::{Error, Result};
pub use traits::{
    DnsBackend, DnsBackendFactory, DnsRecord, IpResolver, IpVersion, RecordMeta, RecordSpec,
    RecordType, ZoneInfo,
};
