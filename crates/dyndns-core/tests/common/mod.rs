//! Test doubles and common utilities for contract tests
//!
//! The mock backend keeps records in memory and logs every call so tests can
//! assert exactly which create/update calls the engine issued.

#![allow(dead_code)]

use async_trait::async_trait;
use dyndns_core::error::{Error, Result};
use dyndns_core::traits::{DnsBackend, DnsRecord, RecordSpec, RecordType, ZoneInfo};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

/// A backend call as observed by the mock
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCall {
    Get {
        zone: String,
        name: String,
        record_type: Option<RecordType>,
    },
    Create {
        zone: String,
        spec: RecordSpec,
    },
    Update {
        zone: String,
        spec: RecordSpec,
    },
}

#[derive(Default)]
struct MockState {
    records: Vec<DnsRecord>,
    calls: Vec<BackendCall>,
    failing: HashSet<RecordType>,
    next_id: usize,
}

/// In-memory DnsBackend that records every call
///
/// Clones share state, so a test can keep one handle while the engine owns
/// another.
#[derive(Clone, Default)]
pub struct MockBackend {
    state: Arc<Mutex<MockState>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an existing record
    pub fn with_record(self, id: &str, name: &str, record_type: RecordType, content: &str) -> Self {
        self.state.lock().unwrap().records.push(DnsRecord {
            id: id.to_string(),
            name: name.to_string(),
            record_type: record_type.to_string(),
            content: content.to_string(),
            ttl: 1,
            proxied: false,
        });
        self
    }

    /// Make every call touching this record type fail with a 502 backend error
    pub fn failing_on(self, record_type: RecordType) -> Self {
        self.state.lock().unwrap().failing.insert(record_type);
        self
    }

    /// Boxed handle sharing this mock's state
    pub fn boxed(&self) -> Box<dyn DnsBackend> {
        Box::new(self.clone())
    }

    pub fn calls(&self) -> Vec<BackendCall> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Number of create + update calls
    pub fn mutation_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| !matches!(c, BackendCall::Get { .. }))
            .count()
    }

    pub fn creates(&self) -> Vec<RecordSpec> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                BackendCall::Create { spec, .. } => Some(spec),
                _ => None,
            })
            .collect()
    }

    pub fn updates(&self) -> Vec<RecordSpec> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                BackendCall::Update { spec, .. } => Some(spec),
                _ => None,
            })
            .collect()
    }

    /// Current stored record for a name and type
    pub fn record(&self, name: &str, record_type: RecordType) -> Option<DnsRecord> {
        self.state
            .lock()
            .unwrap()
            .records
            .iter()
            .find(|r| r.name == name && r.record_type == record_type.as_str())
            .cloned()
    }

    fn check_failure(state: &MockState, record_type: Option<RecordType>) -> Result<()> {
        match record_type {
            Some(t) if state.failing.contains(&t) => Err(Error::backend_status(
                "mock",
                502,
                format!("{} calls are failing", t),
            )),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl DnsBackend for MockBackend {
    async fn create_record(&self, zone: &str, record: &RecordSpec) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(BackendCall::Create {
            zone: zone.to_string(),
            spec: record.clone(),
        });
        Self::check_failure(&state, Some(record.record_type))?;

        state.next_id += 1;
        let id = format!("created-{}", state.next_id);
        state.records.push(DnsRecord {
            id,
            name: record.name.clone(),
            record_type: record.record_type.to_string(),
            content: record.content.clone(),
            ttl: record.ttl,
            proxied: record.meta.proxied,
        });
        Ok(())
    }

    async fn update_record(&self, zone: &str, record: &RecordSpec) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(BackendCall::Update {
            zone: zone.to_string(),
            spec: record.clone(),
        });
        Self::check_failure(&state, Some(record.record_type))?;

        let existing = state
            .records
            .iter_mut()
            .find(|r| r.name == record.name && r.record_type == record.record_type.as_str())
            .ok_or_else(|| Error::not_found(format!("No record named {}", record.name)))?;

        existing.content = record.content.clone();
        existing.ttl = record.ttl;
        existing.proxied = record.meta.proxied;
        Ok(())
    }

    async fn get_record(
        &self,
        zone: &str,
        name: &str,
        record_type: Option<RecordType>,
    ) -> Result<Option<DnsRecord>> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(BackendCall::Get {
            zone: zone.to_string(),
            name: name.to_string(),
            record_type,
        });
        Self::check_failure(&state, record_type)?;

        Ok(state
            .records
            .iter()
            .find(|r| {
                r.name == name && record_type.is_none_or(|t| r.record_type == t.as_str())
            })
            .cloned())
    }

    async fn get_records(
        &self,
        _zone: &str,
        record_type: Option<RecordType>,
    ) -> Result<Vec<DnsRecord>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .records
            .iter()
            .filter(|r| record_type.is_none_or(|t| r.record_type == t.as_str()))
            .cloned()
            .collect())
    }

    async fn get_zone(&self, zone: &str) -> Result<Option<ZoneInfo>> {
        Ok(Some(ZoneInfo {
            id: "zone-id".to_string(),
            name: zone.to_string(),
            status: Some("active".to_string()),
            name_servers: Vec::new(),
        }))
    }

    async fn get_zones(&self) -> Result<Vec<ZoneInfo>> {
        Ok(Vec::new())
    }

    fn backend_name(&self) -> &'static str {
        "mock"
    }
}
