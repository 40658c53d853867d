//! Test doubles and common utilities for contract tests
//!
//! Most tests drive the engine against a seeded `MemoryBackend`. The doubles
//! here wrap it to count calls, inject failures the memory backend cannot
//! express, or measure concurrency.

#![allow(dead_code)]

use async_trait::async_trait;
use dnsaudit_core::config::EngineConfig;
use dnsaudit_core::engine::{AuditEngine, AuditEvent};
use dnsaudit_core::error::{Error, Result};
use dnsaudit_core::evaluation::{Evaluation, Invocation, StoredEvaluationPage};
use dnsaudit_core::model::{ContinuationToken, RecordSetPage, ZonePage};
use dnsaudit_core::registry::Backends;
use dnsaudit_core::traits::{EvaluationStore, ZoneDirectory};
use dnsaudit_core::MemoryBackend;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;

pub const ACCOUNT: &str = "111122223333";
pub const RULE: &str = "dangling-dns-records";
pub const RESULT_TOKEN: &str = "result-token-1";

pub fn invocation() -> Invocation {
    Invocation::new(ACCOUNT, RULE, RESULT_TOKEN)
}

/// Identifier the publisher emits for a record in `zone_id`
pub fn resource_id(zone_id: &str, name: &str) -> String {
    format!("aws:{}:hostedzone:{}:{}:type:A", ACCOUNT, zone_id, name)
}

/// Engine over a single shared memory backend with default settings
pub fn engine_for(backend: MemoryBackend) -> (AuditEngine, mpsc::Receiver<AuditEvent>) {
    AuditEngine::from_backends(Backends::shared(backend), EngineConfig::default())
        .expect("engine construction succeeds")
}

/// Drain every event emitted so far
pub fn drain_events(rx: &mut mpsc::Receiver<AuditEvent>) -> Vec<AuditEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// A zone directory that hands back the same record token forever for one zone
pub struct LoopingDirectory {
    inner: MemoryBackend,
    looping_zone: String,
    calls: Arc<AtomicUsize>,
}

impl LoopingDirectory {
    pub fn new(inner: MemoryBackend, looping_zone: &str) -> Self {
        Self {
            inner,
            looping_zone: looping_zone.to_string(),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Record listing calls made for the looping zone
    pub fn looping_calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ZoneDirectory for LoopingDirectory {
    async fn list_zones(&self, marker: Option<&ContinuationToken>) -> Result<ZonePage> {
        self.inner.list_zones(marker).await
    }

    async fn list_record_sets(
        &self,
        zone_id: &str,
        start: Option<&ContinuationToken>,
    ) -> Result<RecordSetPage> {
        if zone_id.ends_with(&self.looping_zone) {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut page = self.inner.list_record_sets(zone_id, None).await?;
            page.next = Some(ContinuationToken::new("same-token-again"));
            return Ok(page);
        }
        self.inner.list_record_sets(zone_id, start).await
    }

    fn directory_name(&self) -> &'static str {
        "looping"
    }
}

/// A zone directory that records how many record listings overlap
pub struct ConcurrencyGauge {
    inner: MemoryBackend,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
}

impl ConcurrencyGauge {
    pub fn new(inner: MemoryBackend) -> Self {
        Self {
            inner,
            in_flight: Arc::new(AtomicUsize::new(0)),
            max_in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ZoneDirectory for ConcurrencyGauge {
    async fn list_zones(&self, marker: Option<&ContinuationToken>) -> Result<ZonePage> {
        self.inner.list_zones(marker).await
    }

    async fn list_record_sets(
        &self,
        zone_id: &str,
        start: Option<&ContinuationToken>,
    ) -> Result<RecordSetPage> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(20)).await;
        let page = self.inner.list_record_sets(zone_id, start).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        page
    }

    fn directory_name(&self) -> &'static str {
        "gauge"
    }
}

/// An evaluation store that counts calls and rejects batches for one zone
pub struct CountingStore {
    inner: MemoryBackend,
    rejected_zone: Option<String>,
    lookup_delay: Option<Duration>,
    lookup_calls: Arc<AtomicUsize>,
    submit_calls: Arc<AtomicUsize>,
}

impl CountingStore {
    pub fn new(inner: MemoryBackend) -> Self {
        Self {
            inner,
            rejected_zone: None,
            lookup_delay: None,
            lookup_calls: Arc::new(AtomicUsize::new(0)),
            submit_calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Reject any batch carrying an evaluation for `zone_id`
    pub fn rejecting_zone(mut self, zone_id: &str) -> Self {
        self.rejected_zone = Some(zone_id.to_string());
        self
    }

    /// Sleep before serving each lookup page, letting other zones submit
    pub fn slow_lookups(mut self, delay: Duration) -> Self {
        self.lookup_delay = Some(delay);
        self
    }

    pub fn lookup_calls(&self) -> usize {
        self.lookup_calls.load(Ordering::SeqCst)
    }

    pub fn submit_calls(&self) -> usize {
        self.submit_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EvaluationStore for CountingStore {
    async fn non_compliant_evaluations(
        &self,
        rule_name: &str,
        next: Option<&ContinuationToken>,
    ) -> Result<StoredEvaluationPage> {
        self.lookup_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.lookup_delay {
            tokio::time::sleep(delay).await;
        }
        self.inner.non_compliant_evaluations(rule_name, next).await
    }

    async fn put_evaluations(&self, evaluations: &[Evaluation], result_token: &str) -> Result<()> {
        self.submit_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(zone) = &self.rejected_zone {
            let marker = format!(":hostedzone:{}:", zone);
            if evaluations
                .iter()
                .any(|e| e.compliance_resource_id.contains(&marker))
            {
                return Err(Error::evaluation_store(format!(
                    "batch for zone {} rejected",
                    zone
                )));
            }
        }
        self.inner.put_evaluations(evaluations, result_token).await
    }
}
