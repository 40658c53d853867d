// # Evaluation Store Trait
//
// The external system of record for compliance results. The job reads prior
// NON_COMPLIANT results for its rule and submits one batch per zone.

use async_trait::async_trait;

use crate::evaluation::{Evaluation, StoredEvaluationPage};
use crate::model::ContinuationToken;

/// Trait for evaluation store implementations
///
/// # Contract
///
/// - `non_compliant_evaluations` returns only NON_COMPLIANT results for the
///   named rule, across every account and zone the store knows about; the
///   caller filters to its own zone
/// - `put_evaluations` is all-or-nothing for the batch it is given
#[async_trait]
pub trait EvaluationStore: Send + Sync {
    /// Look up one page of prior NON_COMPLIANT results for a rule
    async fn non_compliant_evaluations(
        &self,
        rule_name: &str,
        next: Option<&ContinuationToken>,
    ) -> Result<StoredEvaluationPage, crate::Error>;

    /// Submit a batch of evaluations for the run identified by `result_token`
    async fn put_evaluations(
        &self,
        evaluations: &[Evaluation],
        result_token: &str,
    ) -> Result<(), crate::Error>;
}
