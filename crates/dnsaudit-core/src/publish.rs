//! Evaluation publishing
//!
//! Turns one zone's findings into the batch submitted to the evaluation
//! store:
//!
//! - one NON_COMPLIANT evaluation per finding, annotated with its addresses
//! - one COMPLIANT evaluation per record previously reported NON_COMPLIANT
//!   for this account and zone that has no finding this run
//!
//! Each record appears at most once in a batch. Prior results for other
//! accounts, other zones or with unparseable identifiers are left out.

use chrono::{DateTime, Utc};
use std::collections::HashSet;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::evaluation::{ComplianceType, Evaluation, ResourceId, StoredEvaluation};
use crate::model::{Finding, RecordType, Zone};
use crate::pagination::PageCursor;
use crate::traits::EvaluationStore;

/// Identity of a record across identifier spellings
type RecordKey = (String, String, String, RecordType);

fn record_key(id: &ResourceId) -> RecordKey {
    (
        id.account_id.clone(),
        id.zone_id.clone(),
        id.record_name.clone(),
        id.record_type.clone(),
    )
}

/// Counts for one submitted batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PublishSummary {
    pub non_compliant: usize,
    pub flipped: usize,
}

impl PublishSummary {
    pub fn submitted(&self) -> usize {
        self.non_compliant + self.flipped
    }
}

/// Whether a prior result should be re-reported as COMPLIANT for this zone
///
/// Returns the parsed identifier when the stored result is NON_COMPLIANT and
/// belongs to this zone of this account.
fn flip_candidate(zone: &Zone, stored: &StoredEvaluation) -> Option<ResourceId> {
    if stored.compliance_type != ComplianceType::NonCompliant {
        return None;
    }
    match stored.resource_id.parse::<ResourceId>() {
        Ok(id) if id.belongs_to(zone) => Some(id),
        Ok(_) => None,
        Err(e) => {
            debug!("Ignoring stored evaluation: {}", e);
            None
        }
    }
}

/// Build the evaluation batch for one zone
pub fn build_batch(
    zone: &Zone,
    findings: &[Finding],
    prior: &[StoredEvaluation],
    at: DateTime<Utc>,
) -> (Vec<Evaluation>, PublishSummary) {
    let mut reported: HashSet<RecordKey> = HashSet::new();
    let mut batch = Vec::with_capacity(findings.len());
    let mut summary = PublishSummary::default();

    for finding in findings {
        let id = ResourceId::for_record(zone, finding.name.clone(), finding.record_type.clone());
        if !reported.insert(record_key(&id)) {
            continue;
        }
        batch.push(Evaluation::non_compliant(&id, finding.annotation(), at));
        summary.non_compliant += 1;
    }

    for stored in prior {
        let Some(id) = flip_candidate(zone, stored) else {
            continue;
        };
        if !reported.insert(record_key(&id)) {
            continue;
        }
        batch.push(Evaluation::compliant(stored.resource_id.clone(), at));
        summary.flipped += 1;
    }

    (batch, summary)
}

/// Publishes evaluation batches for one run
#[derive(Clone, Copy)]
pub struct Publisher<'a> {
    store: &'a dyn EvaluationStore,
    rule_name: &'a str,
    result_token: &'a str,
}

impl<'a> Publisher<'a> {
    pub fn new(store: &'a dyn EvaluationStore, rule_name: &'a str, result_token: &'a str) -> Self {
        Self {
            store,
            rule_name,
            result_token,
        }
    }

    /// Look up every prior NON_COMPLIANT result for the rule, across pages
    pub async fn prior_non_compliant(&self) -> Result<Vec<StoredEvaluation>> {
        let mut cursor = PageCursor::new(format!("evaluation lookup for rule {}", self.rule_name));
        let mut evaluations = Vec::new();

        loop {
            let page = self
                .store
                .non_compliant_evaluations(self.rule_name, cursor.token())
                .await
                .map_err(|e| {
                    Error::evaluation_store(format!(
                        "Failed to look up prior evaluations for rule {}: {}",
                        self.rule_name, e
                    ))
                })?;
            evaluations.extend(page.evaluations);

            if !cursor.advance(page.next)? {
                break;
            }
        }

        Ok(evaluations)
    }

    /// Build and submit one zone's batch
    ///
    /// `prior` is empty when the lookup failed; the batch then carries only
    /// the NON_COMPLIANT findings.
    pub async fn publish(
        &self,
        zone: &Zone,
        findings: &[Finding],
        prior: &[StoredEvaluation],
    ) -> Result<PublishSummary> {
        let (batch, summary) = build_batch(zone, findings, prior, Utc::now());

        self.store
            .put_evaluations(&batch, self.result_token)
            .await
            .map_err(|e| {
                Error::evaluation_store(format!(
                    "Failed to submit {} evaluation(s) for zone {}: {}",
                    batch.len(),
                    zone.id,
                    e
                ))
            })?;

        info!(
            "Zone {}: submitted {} non-compliant and {} compliant evaluation(s)",
            zone.id, summary.non_compliant, summary.flipped
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ACCOUNT: &str = "111122223333";

    fn zone() -> Zone {
        Zone::from_listing("/hostedzone/Z1", ACCOUNT)
    }

    fn finding(name: &str, addresses: &[&str]) -> Finding {
        Finding {
            name: name.to_string(),
            record_type: RecordType::A,
            addresses: addresses.iter().map(|a| a.to_string()).collect(),
        }
    }

    fn stored(id: &str) -> StoredEvaluation {
        StoredEvaluation::new(id, ComplianceType::NonCompliant)
    }

    #[test]
    fn findings_become_non_compliant_evaluations() {
        let (batch, summary) = build_batch(
            &zone(),
            &[finding("b.example.com", &["5.6.7.8"])],
            &[],
            Utc::now(),
        );

        assert_eq!(summary, PublishSummary { non_compliant: 1, flipped: 0 });
        assert_eq!(batch[0].compliance_type, ComplianceType::NonCompliant);
        assert_eq!(
            batch[0].compliance_resource_id,
            "aws:111122223333:hostedzone:Z1:b.example.com:type:A"
        );
        assert_eq!(batch[0].annotation.as_deref(), Some("IPv4: 5.6.7.8"));
    }

    #[test]
    fn resolved_prior_violation_is_flipped_once() {
        let prior_id = "aws:111122223333:hostedzone:Z1:b.example.com:type:A";
        let (batch, summary) = build_batch(&zone(), &[], &[stored(prior_id), stored(prior_id)], Utc::now());

        assert_eq!(summary, PublishSummary { non_compliant: 0, flipped: 1 });
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].compliance_type, ComplianceType::Compliant);
        assert_eq!(batch[0].compliance_resource_id, prior_id);
    }

    #[test]
    fn still_violating_record_is_not_flipped() {
        let (batch, summary) = build_batch(
            &zone(),
            &[finding("b.example.com", &["5.6.7.8"])],
            &[
                stored("aws:111122223333:hostedzone:Z1:b.example.com:type:A"),
                stored("111122223333:hostedzone:Z1:b.example.com:type:A"),
            ],
            Utc::now(),
        );

        assert_eq!(summary, PublishSummary { non_compliant: 1, flipped: 0 });
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].compliance_type, ComplianceType::NonCompliant);
    }

    #[test]
    fn other_accounts_zones_and_garbage_are_excluded() {
        let (batch, summary) = build_batch(
            &zone(),
            &[],
            &[
                stored("aws:999999999999:hostedzone:Z1:a.example.com:type:A"),
                stored("aws:111122223333:hostedzone:Z2:a.example.com:type:A"),
                stored("not-a-resource-id"),
                StoredEvaluation::new(
                    "aws:111122223333:hostedzone:Z1:c.example.com:type:A",
                    ComplianceType::Compliant,
                ),
            ],
            Utc::now(),
        );

        assert!(batch.is_empty());
        assert_eq!(summary.submitted(), 0);
    }

    #[test]
    fn batch_shares_one_timestamp() {
        let at = Utc::now();
        let (batch, _) = build_batch(
            &zone(),
            &[finding("x.example.com", &["1.1.1.1"])],
            &[stored("aws:111122223333:hostedzone:Z1:y.example.com:type:A")],
            at,
        );
        assert_eq!(batch.len(), 2);
        assert!(batch.iter().all(|e| e.ordering_timestamp == at));
    }
}
