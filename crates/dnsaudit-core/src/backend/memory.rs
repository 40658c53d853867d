// # Memory Backend
//
// In-memory implementation of all three collaborator traits.
//
// ## Purpose
//
// Serves zones, record sets, regions and prior evaluations seeded through
// builder methods. Submitted batches are recorded and folded back into the
// stored evaluations, so a second run against the same backend sees what the
// first one reported.
//
// ## Failure injection
//
// Individual regions, zones, the lookup and the submit call can be made to
// fail, which lets callers exercise every branch of the failure policy
// without a real cloud account.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;

use super::slice_page;
use crate::Error;
use crate::config::BackendConfig;
use crate::evaluation::{ComplianceType, Evaluation, StoredEvaluation, StoredEvaluationPage};
use crate::model::{
    ContinuationToken, HostedZone, RecordSetPage, ResourceRecordSet, ZonePage, normalize_zone_id,
};
use crate::registry::{BackendFactory, Backends};
use crate::traits::{ComputeInventory, EvaluationStore, ZoneDirectory};

/// Default number of items served per page
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// One batch received by `put_evaluations`
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Submission {
    pub result_token: String,
    pub evaluations: Vec<Evaluation>,
}

#[derive(Debug, Clone, Default)]
struct FailureSet {
    region_listing: bool,
    regions: HashSet<String>,
    zone_listing: bool,
    zones: HashSet<String>,
    lookup: bool,
    submit: bool,
}

#[derive(Debug, Default)]
struct MemoryState {
    evaluations: Vec<StoredEvaluation>,
    submissions: Vec<Submission>,
    record_page_requests: HashMap<String, usize>,
}

/// In-memory backend
///
/// Clones share submissions, stored evaluations and request counters.
///
/// # Example
///
/// ```rust,no_run
/// use dnsaudit_core::backend::MemoryBackend;
/// use dnsaudit_core::model::{HostedZone, ResourceRecordSet};
///
/// let backend = MemoryBackend::new()
///     .with_region("us-east-1", &["1.2.3.4"])
///     .with_zone(
///         HostedZone::new("/hostedzone/Z1", "example.com."),
///         vec![ResourceRecordSet::a("www.example.com.", &["1.2.3.4"])],
///     );
/// ```
#[derive(Debug, Clone)]
pub struct MemoryBackend {
    regions: Vec<(String, Vec<String>)>,
    zones: Vec<(HostedZone, Vec<ResourceRecordSet>)>,
    page_size: usize,
    failures: FailureSet,
    state: Arc<RwLock<MemoryState>>,
}

impl MemoryBackend {
    /// Create an empty backend
    pub fn new() -> Self {
        Self {
            regions: Vec::new(),
            zones: Vec::new(),
            page_size: DEFAULT_PAGE_SIZE,
            failures: FailureSet::default(),
            state: Arc::new(RwLock::new(MemoryState::default())),
        }
    }

    /// Serve listings in pages of `page_size` items
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Add a region and the public addresses allocated in it
    pub fn with_region(mut self, region: impl Into<String>, addresses: &[&str]) -> Self {
        self.regions.push((
            region.into(),
            addresses.iter().map(|a| a.to_string()).collect(),
        ));
        self
    }

    /// Add a zone and its record sets
    pub fn with_zone(mut self, zone: HostedZone, record_sets: Vec<ResourceRecordSet>) -> Self {
        self.zones.push((zone, record_sets));
        self
    }

    /// Seed a prior evaluation
    pub fn with_evaluation(self, evaluation: StoredEvaluation) -> Self {
        self.with_evaluations(vec![evaluation])
    }

    /// Seed several prior evaluations
    ///
    /// Meant for setup, before the backend is handed to a running engine.
    pub fn with_evaluations(self, evaluations: Vec<StoredEvaluation>) -> Self {
        match self.state.try_write() {
            Ok(mut state) => state.evaluations.extend(evaluations),
            Err(_) => tracing::warn!(
                "Memory backend is in use, dropping {} seeded evaluation(s)",
                evaluations.len()
            ),
        }
        self
    }

    /// Make the region listing fail
    pub fn failing_region_listing(mut self) -> Self {
        self.failures.region_listing = true;
        self
    }

    /// Make one region's address listing fail
    pub fn failing_region(mut self, region: impl Into<String>) -> Self {
        self.failures.regions.insert(region.into());
        self
    }

    /// Make the zone listing fail
    pub fn failing_zone_listing(mut self) -> Self {
        self.failures.zone_listing = true;
        self
    }

    /// Make every record listing page of one zone fail
    pub fn failing_zone(mut self, zone_id: &str) -> Self {
        self.failures.zones.insert(normalize_zone_id(zone_id).to_string());
        self
    }

    /// Make the prior-evaluation lookup fail
    pub fn failing_lookup(mut self) -> Self {
        self.failures.lookup = true;
        self
    }

    /// Make every submission fail
    pub fn failing_submit(mut self) -> Self {
        self.failures.submit = true;
        self
    }

    /// Batches received so far, in arrival order
    pub async fn submissions(&self) -> Vec<Submission> {
        self.state.read().await.submissions.clone()
    }

    /// Stored evaluations as they stand after every submission so far
    pub async fn stored_evaluations(&self) -> Vec<StoredEvaluation> {
        self.state.read().await.evaluations.clone()
    }

    /// Number of record listing pages requested for a zone
    pub async fn record_page_requests(&self, zone_id: &str) -> usize {
        self.state
            .read()
            .await
            .record_page_requests
            .get(normalize_zone_id(zone_id))
            .copied()
            .unwrap_or(0)
    }

    fn find_zone(&self, zone_id: &str) -> Option<&[ResourceRecordSet]> {
        let wanted = normalize_zone_id(zone_id);
        self.zones
            .iter()
            .find(|(zone, _)| normalize_zone_id(&zone.id) == wanted)
            .map(|(_, records)| records.as_slice())
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ZoneDirectory for MemoryBackend {
    async fn list_zones(&self, marker: Option<&ContinuationToken>) -> Result<ZonePage, Error> {
        if self.failures.zone_listing {
            return Err(Error::zone_directory("zone listing unavailable"));
        }

        let zones: Vec<HostedZone> = self.zones.iter().map(|(zone, _)| zone.clone()).collect();
        let (zones, next_marker) =
            slice_page(&zones, marker, self.page_size).map_err(|e| Error::zone_directory(e.to_string()))?;
        Ok(ZonePage { zones, next_marker })
    }

    async fn list_record_sets(
        &self,
        zone_id: &str,
        start: Option<&ContinuationToken>,
    ) -> Result<RecordSetPage, Error> {
        let zone_key = normalize_zone_id(zone_id).to_string();
        *self
            .state
            .write()
            .await
            .record_page_requests
            .entry(zone_key.clone())
            .or_insert(0) += 1;

        if self.failures.zones.contains(&zone_key) {
            return Err(Error::zone_directory(format!(
                "record listing unavailable for zone {}",
                zone_key
            )));
        }

        let records = self
            .find_zone(zone_id)
            .ok_or_else(|| Error::zone_directory(format!("No such zone: {}", zone_id)))?;
        let (record_sets, next) =
            slice_page(records, start, self.page_size).map_err(|e| Error::zone_directory(e.to_string()))?;
        Ok(RecordSetPage { record_sets, next })
    }

    fn directory_name(&self) -> &'static str {
        "memory"
    }
}

#[async_trait]
impl ComputeInventory for MemoryBackend {
    async fn list_regions(&self) -> Result<Vec<String>, Error> {
        if self.failures.region_listing {
            return Err(Error::inventory("region listing unavailable"));
        }
        Ok(self.regions.iter().map(|(region, _)| region.clone()).collect())
    }

    async fn list_public_addresses(&self, region: &str) -> Result<Vec<String>, Error> {
        if self.failures.regions.contains(region) {
            return Err(Error::inventory(format!(
                "address listing unavailable in {}",
                region
            )));
        }
        self.regions
            .iter()
            .find(|(name, _)| name == region)
            .map(|(_, addresses)| addresses.clone())
            .ok_or_else(|| Error::inventory(format!("No such region: {}", region)))
    }
}

#[async_trait]
impl EvaluationStore for MemoryBackend {
    async fn non_compliant_evaluations(
        &self,
        _rule_name: &str,
        next: Option<&ContinuationToken>,
    ) -> Result<StoredEvaluationPage, Error> {
        if self.failures.lookup {
            return Err(Error::evaluation_store("evaluation lookup denied"));
        }

        let state = self.state.read().await;
        let (evaluations, next) = non_compliant_page(&state.evaluations, next, self.page_size)?;
        Ok(StoredEvaluationPage { evaluations, next })
    }

    async fn put_evaluations(&self, evaluations: &[Evaluation], result_token: &str) -> Result<(), Error> {
        if self.failures.submit {
            return Err(Error::evaluation_store("evaluation submission rejected"));
        }

        let mut state = self.state.write().await;
        for evaluation in evaluations {
            let stored = StoredEvaluation {
                resource_id: evaluation.compliance_resource_id.clone(),
                compliance_type: evaluation.compliance_type,
                recorded_at: Some(evaluation.ordering_timestamp),
            };
            match state
                .evaluations
                .iter()
                .position(|e| e.resource_id == stored.resource_id)
            {
                Some(pos) => state.evaluations[pos] = stored,
                None => state.evaluations.push(stored),
            }
        }
        state.submissions.push(Submission {
            result_token: result_token.to_string(),
            evaluations: evaluations.to_vec(),
        });
        Ok(())
    }
}

/// Serve one page of NON_COMPLIANT evaluations
///
/// Tokens are offsets into the full evaluation list rather than into the
/// filtered one. Submissions only replace entries in place or append, so a
/// token stays valid while other batches land between pages.
fn non_compliant_page(
    evaluations: &[StoredEvaluation],
    token: Option<&ContinuationToken>,
    page_size: usize,
) -> Result<(Vec<StoredEvaluation>, Option<ContinuationToken>), Error> {
    let start = match token {
        None => 0,
        Some(token) => token
            .as_str()
            .parse::<usize>()
            .ok()
            .filter(|offset| *offset > 0 && *offset <= evaluations.len())
            .ok_or_else(|| Error::evaluation_store(format!("Unknown continuation token '{}'", token)))?,
    };

    let mut page = Vec::new();
    let mut end = evaluations.len();
    for (offset, evaluation) in evaluations.iter().enumerate().skip(start) {
        if page.len() == page_size.max(1) {
            end = offset;
            break;
        }
        if evaluation.compliance_type == ComplianceType::NonCompliant {
            page.push(evaluation.clone());
        }
    }

    let next = (end < evaluations.len()).then(|| ContinuationToken::new(end.to_string()));
    Ok((page, next))
}

/// Factory for the in-memory backend
///
/// Builds an empty backend; useful as a dry run of the wiring.
pub struct MemoryBackendFactory;

#[async_trait]
impl BackendFactory for MemoryBackendFactory {
    async fn create(&self, config: &BackendConfig) -> Result<Backends, Error> {
        match config {
            BackendConfig::Memory => Ok(Backends::shared(MemoryBackend::new())),
            other => Err(Error::config(format!(
                "Memory backend factory cannot build a '{}' backend",
                other.type_name()
            ))),
        }
    }
}
