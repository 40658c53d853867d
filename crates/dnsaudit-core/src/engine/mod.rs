//! Audit run orchestration
//!
//! The AuditEngine is responsible for:
//! - Listing every zone of the account
//! - Collecting the live address inventory
//! - Looking up prior NON_COMPLIANT results once for the run
//! - Running extract → reconcile → publish for each zone
//! - Reporting the outcome of every zone
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────┐   ┌──────────────────┐
//! │ ZoneDirectory │   │ ComputeInventory │
//! └───────────────┘   └──────────────────┘
//!         │ zones, records      │ addresses
//!         └──────────┬──────────┘
//!                    ▼
//!            ┌──────────────┐
//!            │ AuditEngine  │──── AuditEvent ───▶ monitoring
//!            └──────────────┘
//!                    │ one batch per zone
//!                    ▼
//!           ┌─────────────────┐
//!           │ EvaluationStore │
//!           └─────────────────┘
//! ```
//!
//! ## Failure Scopes
//!
//! - Zone listing or inventory failure: the run fails, nothing is submitted
//! - Extraction or submission failure: that zone is reported as failed,
//!   the other zones carry on
//! - Prior-evaluation lookup failure: every zone publishes its findings
//!   without COMPLIANT flips

use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, error, info, trace, warn};

use crate::config::EngineConfig;
use crate::error::Result;
use crate::evaluation::{Invocation, StoredEvaluation};
use crate::extract::{extract_address_index, list_zones};
use crate::inventory::collect_inventory;
use crate::model::{Inventory, Zone};
use crate::publish::{PublishSummary, Publisher};
use crate::reconcile::reconcile;
use crate::registry::Backends;
use crate::traits::{ComputeInventory, EvaluationStore, ZoneDirectory};

/// Events emitted by the AuditEngine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuditEvent {
    /// Zones listed, processing about to start
    RunStarted { account_id: String, zones: usize },

    /// Inventory collected
    InventoryCollected { addresses: usize },

    /// A zone's records were extracted and reconciled
    ZoneExtracted {
        zone_id: String,
        addresses: usize,
        findings: usize,
    },

    /// A zone's batch was accepted by the store
    ZonePublished {
        zone_id: String,
        non_compliant: usize,
        flipped: usize,
    },

    /// A zone failed; no batch (or a rejected one) for it this run
    ZoneFailed { zone_id: String, error: String },

    /// Prior evaluations could not be looked up; the zone published
    /// without COMPLIANT flips
    PriorLookupDegraded { zone_id: String, error: String },

    /// Every zone has been processed
    RunFinished { zones: usize, failed: usize },
}

/// What happened to one zone
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ZoneOutcome {
    Published { non_compliant: usize, flipped: usize },
    Failed { error: String },
}

/// Outcome of one zone, tagged with its id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoneReport {
    pub zone_id: String,
    pub outcome: ZoneOutcome,
}

impl ZoneReport {
    pub fn is_failed(&self) -> bool {
        matches!(self.outcome, ZoneOutcome::Failed { .. })
    }
}

/// Result of one completed run
///
/// Zones appear in listing order regardless of completion order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub account_id: String,
    pub inventory_size: usize,
    pub zones: Vec<ZoneReport>,
}

impl RunReport {
    /// Zones whose extraction or submission failed
    pub fn failed_zones(&self) -> impl Iterator<Item = &ZoneReport> {
        self.zones.iter().filter(|z| z.is_failed())
    }

    pub fn has_failures(&self) -> bool {
        self.zones.iter().any(ZoneReport::is_failed)
    }

    /// NON_COMPLIANT evaluations submitted across all zones
    pub fn non_compliant(&self) -> usize {
        self.published().map(|(non_compliant, _)| non_compliant).sum()
    }

    /// COMPLIANT flips submitted across all zones
    pub fn flipped(&self) -> usize {
        self.published().map(|(_, flipped)| flipped).sum()
    }

    fn published(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.zones.iter().filter_map(|z| match z.outcome {
            ZoneOutcome::Published {
                non_compliant,
                flipped,
            } => Some((non_compliant, flipped)),
            ZoneOutcome::Failed { .. } => None,
        })
    }
}

/// Core audit engine
///
/// One engine performs any number of runs; each run is independent and
/// keeps all of its intermediate state local.
///
/// ## Lifecycle
///
/// 1. Create with [`AuditEngine::new()`] (or [`AuditEngine::from_backends()`])
/// 2. Call [`AuditEngine::run()`] once per invocation
/// 3. Drain the event receiver for monitoring
pub struct AuditEngine {
    zones: Arc<dyn ZoneDirectory>,
    inventory: Arc<dyn ComputeInventory>,
    store: Arc<dyn EvaluationStore>,
    config: EngineConfig,
    event_tx: mpsc::Sender<AuditEvent>,
}

impl AuditEngine {
    /// Create a new audit engine
    ///
    /// Returns the engine and the receiving end of its bounded event channel.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the engine configuration is invalid.
    pub fn new(
        zones: Arc<dyn ZoneDirectory>,
        inventory: Arc<dyn ComputeInventory>,
        store: Arc<dyn EvaluationStore>,
        config: EngineConfig,
    ) -> Result<(Self, mpsc::Receiver<AuditEvent>)> {
        config.validate()?;

        let (event_tx, event_rx) = mpsc::channel(config.event_channel_capacity);
        Ok((
            Self {
                zones,
                inventory,
                store,
                config,
                event_tx,
            },
            event_rx,
        ))
    }

    /// Create an engine from a registry-built backend bundle
    pub fn from_backends(
        backends: Backends,
        config: EngineConfig,
    ) -> Result<(Self, mpsc::Receiver<AuditEvent>)> {
        Self::new(backends.zones, backends.inventory, backends.store, config)
    }

    /// Perform one audit run
    ///
    /// # Errors
    ///
    /// Returns an error only for run-level failures: an invalid invocation,
    /// a failed zone listing or a failed inventory collection. Zone-level
    /// failures are reported in the returned [`RunReport`].
    pub async fn run(&self, invocation: &Invocation) -> Result<RunReport> {
        invocation.validate()?;

        let zones = list_zones(self.zones.as_ref(), &invocation.account_id).await?;
        self.emit_event(AuditEvent::RunStarted {
            account_id: invocation.account_id.clone(),
            zones: zones.len(),
        });

        let inventory =
            collect_inventory(self.inventory.as_ref(), self.config.region_failure_policy).await?;
        info!("Inventory holds {} live address(es)", inventory.len());
        self.emit_event(AuditEvent::InventoryCollected {
            addresses: inventory.len(),
        });

        let publisher = Publisher::new(
            self.store.as_ref(),
            &invocation.config_rule_name,
            &invocation.result_token,
        );

        // Must complete before any zone publishes.
        let prior = publisher.prior_non_compliant().await.map_err(|e| {
            warn!("{}. Zones publish without compliant updates.", e);
            e.to_string()
        });

        let mut reports: Vec<(usize, ZoneReport)> = stream::iter(zones.iter().enumerate())
            .map(|(position, zone)| {
                let inventory = &inventory;
                let prior = prior.as_deref().map_err(String::as_str);
                async move {
                    let outcome = self.process_zone(zone, inventory, prior, publisher).await;
                    (
                        position,
                        ZoneReport {
                            zone_id: zone.id.clone(),
                            outcome,
                        },
                    )
                }
            })
            .buffer_unordered(self.config.max_concurrent_zones)
            .collect()
            .await;
        reports.sort_by_key(|(position, _)| *position);

        let report = RunReport {
            account_id: invocation.account_id.clone(),
            inventory_size: inventory.len(),
            zones: reports.into_iter().map(|(_, report)| report).collect(),
        };

        let failed = report.failed_zones().count();
        if failed > 0 {
            warn!(
                "Run finished with {} of {} zone(s) failed",
                failed,
                report.zones.len()
            );
        } else {
            info!(
                "Run finished: {} zone(s), {} non-compliant, {} flipped to compliant",
                report.zones.len(),
                report.non_compliant(),
                report.flipped()
            );
        }
        self.emit_event(AuditEvent::RunFinished {
            zones: report.zones.len(),
            failed,
        });

        Ok(report)
    }

    /// Run the pipeline for one zone, capturing any failure as its outcome
    async fn process_zone(
        &self,
        zone: &Zone,
        inventory: &Inventory,
        prior: std::result::Result<&[StoredEvaluation], &str>,
        publisher: Publisher<'_>,
    ) -> ZoneOutcome {
        let index = match extract_address_index(self.zones.as_ref(), zone).await {
            Ok(index) => index,
            Err(e) => return self.zone_failed(zone, e.to_string()),
        };
        let addresses = index.len();

        let findings = reconcile(inventory, index);
        debug!(
            "Zone {}: {} distinct address(es), {} finding(s)",
            zone.id,
            addresses,
            findings.len()
        );
        self.emit_event(AuditEvent::ZoneExtracted {
            zone_id: zone.id.clone(),
            addresses,
            findings: findings.len(),
        });

        let prior = match prior {
            Ok(prior) => prior,
            Err(e) => {
                debug!("Zone {}: publishing without compliant updates", zone.id);
                self.emit_event(AuditEvent::PriorLookupDegraded {
                    zone_id: zone.id.clone(),
                    error: e.to_string(),
                });
                &[]
            }
        };

        match publisher.publish(zone, &findings, prior).await {
            Ok(PublishSummary {
                non_compliant,
                flipped,
            }) => {
                self.emit_event(AuditEvent::ZonePublished {
                    zone_id: zone.id.clone(),
                    non_compliant,
                    flipped,
                });
                ZoneOutcome::Published {
                    non_compliant,
                    flipped,
                }
            }
            Err(e) => self.zone_failed(zone, e.to_string()),
        }
    }

    fn zone_failed(&self, zone: &Zone, error: String) -> ZoneOutcome {
        error!("Zone {} failed: {}", zone.id, error);
        self.emit_event(AuditEvent::ZoneFailed {
            zone_id: zone.id.clone(),
            error: error.clone(),
        });
        ZoneOutcome::Failed { error }
    }

    /// Emit an event without blocking the run
    fn emit_event(&self, event: AuditEvent) {
        match self.event_tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                warn!("Event channel full, dropping event. Consider increasing event_channel_capacity.")
            }
            Err(TrySendError::Closed(_)) => {
                trace!("Event receiver dropped, discarding event")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use crate::model::{HostedZone, ResourceRecordSet};

    fn invocation() -> Invocation {
        Invocation::new("111122223333", "dangling-dns", "token")
    }

    #[tokio::test]
    async fn run_reports_zones_in_listing_order() {
        let backend = MemoryBackend::new()
            .with_region("us-east-1", &["1.2.3.4"])
            .with_zone(
                HostedZone::new("/hostedzone/Z1", "a.com."),
                vec![ResourceRecordSet::a("x.a.com.", &["5.6.7.8"])],
            )
            .with_zone(
                HostedZone::new("/hostedzone/Z2", "b.com."),
                vec![ResourceRecordSet::a("y.b.com.", &["1.2.3.4"])],
            );
        let (engine, mut events) =
            AuditEngine::from_backends(Backends::shared(backend), EngineConfig::default()).unwrap();

        let report = engine.run(&invocation()).await.unwrap();

        assert_eq!(report.inventory_size, 1);
        assert_eq!(
            report.zones,
            vec![
                ZoneReport {
                    zone_id: "Z1".into(),
                    outcome: ZoneOutcome::Published {
                        non_compliant: 1,
                        flipped: 0
                    },
                },
                ZoneReport {
                    zone_id: "Z2".into(),
                    outcome: ZoneOutcome::Published {
                        non_compliant: 0,
                        flipped: 0
                    },
                },
            ]
        );
        assert!(!report.has_failures());

        assert_eq!(
            events.recv().await,
            Some(AuditEvent::RunStarted {
                account_id: "111122223333".into(),
                zones: 2
            })
        );
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = EngineConfig {
            max_concurrent_zones: 0,
            ..EngineConfig::default()
        };
        let result = AuditEngine::from_backends(Backends::shared(MemoryBackend::new()), config);
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn full_event_channel_does_not_block_the_run() {
        let backend = MemoryBackend::new()
            .with_region("us-east-1", &[])
            .with_zone(HostedZone::new("/hostedzone/Z1", "a.com."), vec![])
            .with_zone(HostedZone::new("/hostedzone/Z2", "b.com."), vec![]);
        let config = EngineConfig {
            event_channel_capacity: 1,
            ..EngineConfig::default()
        };
        let (engine, _events) = AuditEngine::from_backends(Backends::shared(backend), config).unwrap();

        let report = engine.run(&invocation()).await.unwrap();
        assert_eq!(report.zones.len(), 2);
    }

    #[tokio::test]
    async fn dropped_event_receiver_does_not_fail_the_run() {
        let backend = MemoryBackend::new()
            .with_region("us-east-1", &[])
            .with_zone(
                HostedZone::new("/hostedzone/Z1", "a.com."),
                vec![ResourceRecordSet::a("x.a.com.", &["5.6.7.8"])],
            );
        let (engine, events) =
            AuditEngine::from_backends(Backends::shared(backend.clone()), EngineConfig::default()).unwrap();
        drop(events);

        let report = engine.run(&invocation()).await.unwrap();
        assert_eq!(report.non_compliant(), 1);
        assert_eq!(backend.submissions().await.len(), 1);
    }

    #[tokio::test]
    async fn invalid_invocation_fails_before_any_request() {
        let backend = MemoryBackend::new().failing_zone_listing();
        let (engine, _events) =
            AuditEngine::from_backends(Backends::shared(backend), EngineConfig::default()).unwrap();

        let err = engine
            .run(&Invocation::new("", "rule", "token"))
            .await
            .unwrap_err();
        assert!(matches!(err, crate::Error::Config(_)));
    }
}
