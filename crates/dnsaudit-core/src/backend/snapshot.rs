// # Snapshot Backend
//
// Serves a JSON snapshot of an account through the collaborator traits.
//
// ## Purpose
//
// Lets the job run end to end without cloud credentials: the snapshot
// captures zones, record sets, regions and prior evaluations, and every
// submitted batch is written to an output file that can be inspected or
// replayed.
//
// ## Snapshot Format
//
// ```json
// {
//   "regions": { "us-east-1": ["1.2.3.4"] },
//   "zones": [
//     {
//       "id": "/hostedzone/Z1",
//       "name": "example.com.",
//       "record_sets": [
//         { "name": "www.example.com.", "type": "A",
//           "resource_records": [{ "value": "1.2.3.4" }] }
//       ]
//     }
//   ],
//   "evaluations": [
//     { "resource_id": "aws:111122223333:hostedzone:Z1:old.example.com:type:A",
//       "compliance_type": "NON_COMPLIANT" }
//   ]
// }
// ```
//
// ## Output Format
//
// ```json
// { "version": "1.0", "submissions": [{ "result_token": "...", "evaluations": [...] }] }
// ```
//
// The output file is rewritten on every submission with write-then-rename,
// so a reader never sees a half-written file. A batch whose write fails is
// not applied.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use super::memory::{MemoryBackend, Submission};
use crate::Error;
use crate::config::BackendConfig;
use crate::evaluation::{Evaluation, StoredEvaluation, StoredEvaluationPage};
use crate::model::{ContinuationToken, HostedZone, RecordSetPage, ResourceRecordSet, ZonePage};
use crate::registry::{BackendFactory, Backends};
use crate::traits::{ComputeInventory, EvaluationStore, ZoneDirectory};

/// Output file format version
const OUTPUT_FILE_VERSION: &str = "1.0";

/// Account snapshot as stored on disk
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Snapshot {
    /// Region name → public addresses allocated in it
    #[serde(default)]
    pub regions: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub zones: Vec<SnapshotZone>,
    /// Prior evaluations recorded for the rule
    #[serde(default)]
    pub evaluations: Vec<StoredEvaluation>,
}

/// One zone of a snapshot
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SnapshotZone {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub record_sets: Vec<ResourceRecordSet>,
}

#[derive(Debug, serde::Serialize, serde::Deserialize)]
struct OutputFileFormat {
    version: String,
    submissions: Vec<Submission>,
}

/// Snapshot-backed implementation of all three collaborator traits
///
/// # Example
///
/// ```rust,no_run
/// use dnsaudit_core::backend::SnapshotBackend;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let backend = SnapshotBackend::load("account.json", None, 100).await?;
///     println!("results go to {}", backend.output_path().display());
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct SnapshotBackend {
    inner: MemoryBackend,
    output_path: PathBuf,
    write_lock: Mutex<()>,
}

impl SnapshotBackend {
    /// Load a snapshot from disk
    ///
    /// Without an explicit `output_path`, results are written next to the
    /// snapshot with an `evaluations.json` extension.
    pub async fn load<P: AsRef<Path>>(
        path: P,
        output_path: Option<PathBuf>,
        page_size: usize,
    ) -> Result<Self, Error> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).await.map_err(|e| {
            Error::config(format!("Failed to read snapshot {}: {}", path.display(), e))
        })?;
        let snapshot: Snapshot = serde_json::from_str(&content).map_err(|e| {
            Error::config(format!("Failed to parse snapshot {}: {}", path.display(), e))
        })?;

        tracing::debug!(
            "Loaded snapshot {}: {} region(s), {} zone(s), {} prior evaluation(s)",
            path.display(),
            snapshot.regions.len(),
            snapshot.zones.len(),
            snapshot.evaluations.len()
        );

        let output_path = output_path.unwrap_or_else(|| path.with_extension("evaluations.json"));
        Ok(Self::from_snapshot(snapshot, output_path, page_size))
    }

    /// Serve an in-memory snapshot, writing results to `output_path`
    pub fn from_snapshot(snapshot: Snapshot, output_path: PathBuf, page_size: usize) -> Self {
        let mut inner = MemoryBackend::new().with_page_size(page_size);
        for (region, addresses) in &snapshot.regions {
            let addresses: Vec<&str> = addresses.iter().map(String::as_str).collect();
            inner = inner.with_region(region.clone(), &addresses);
        }
        for zone in snapshot.zones {
            inner = inner.with_zone(HostedZone::new(zone.id, zone.name), zone.record_sets);
        }
        let inner = inner.with_evaluations(snapshot.evaluations);

        Self {
            inner,
            output_path,
            write_lock: Mutex::new(()),
        }
    }

    /// Where submitted batches are written
    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    /// Batches submitted so far
    pub async fn submissions(&self) -> Vec<Submission> {
        self.inner.submissions().await
    }

    /// Write `submissions` to the output file
    async fn write_output(&self, submissions: Vec<Submission>) -> Result<(), Error> {
        let output = OutputFileFormat {
            version: OUTPUT_FILE_VERSION.to_string(),
            submissions,
        };
        let json = serde_json::to_string_pretty(&output)?;

        if let Some(parent) = self.output_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).await?;
            }
        }

        let temp_path = self.output_path.with_extension("tmp");
        {
            let mut file = fs::File::create(&temp_path).await.map_err(|e| {
                Error::evaluation_store(format!(
                    "Failed to create temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;
            file.write_all(json.as_bytes()).await?;
            file.flush().await?;
        }

        fs::rename(&temp_path, &self.output_path).await.map_err(|e| {
            Error::evaluation_store(format!(
                "Failed to rename {} to {}: {}",
                temp_path.display(),
                self.output_path.display(),
                e
            ))
        })?;

        tracing::trace!("Submissions written to {}", self.output_path.display());
        Ok(())
    }
}

#[async_trait]
impl ZoneDirectory for SnapshotBackend {
    async fn list_zones(&self, marker: Option<&ContinuationToken>) -> Result<ZonePage, Error> {
        self.inner.list_zones(marker).await
    }

    async fn list_record_sets(
        &self,
        zone_id: &str,
        start: Option<&ContinuationToken>,
    ) -> Result<RecordSetPage, Error> {
        self.inner.list_record_sets(zone_id, start).await
    }

    fn directory_name(&self) -> &'static str {
        "snapshot"
    }
}

#[async_trait]
impl ComputeInventory for SnapshotBackend {
    async fn list_regions(&self) -> Result<Vec<String>, Error> {
        self.inner.list_regions().await
    }

    async fn list_public_addresses(&self, region: &str) -> Result<Vec<String>, Error> {
        self.inner.list_public_addresses(region).await
    }
}

#[async_trait]
impl EvaluationStore for SnapshotBackend {
    async fn non_compliant_evaluations(
        &self,
        rule_name: &str,
        next: Option<&ContinuationToken>,
    ) -> Result<StoredEvaluationPage, Error> {
        self.inner.non_compliant_evaluations(rule_name, next).await
    }

    /// A batch is applied to the served evaluations only once the output
    /// file holding it is on disk; a failed write leaves both untouched.
    async fn put_evaluations(&self, evaluations: &[Evaluation], result_token: &str) -> Result<(), Error> {
        let _guard = self.write_lock.lock().await;

        let mut submissions = self.inner.submissions().await;
        submissions.push(Submission {
            result_token: result_token.to_string(),
            evaluations: evaluations.to_vec(),
        });
        self.write_output(submissions).await?;

        self.inner.put_evaluations(evaluations, result_token).await
    }
}

/// Factory for the snapshot backend
pub struct SnapshotBackendFactory;

#[async_trait]
impl BackendFactory for SnapshotBackendFactory {
    async fn create(&self, config: &BackendConfig) -> Result<Backends, Error> {
        match config {
            BackendConfig::Snapshot {
                path,
                output_path,
                page_size,
            } => {
                let backend =
                    SnapshotBackend::load(path, output_path.as_ref().map(PathBuf::from), *page_size)
                        .await?;
                Ok(Backends::shared(backend))
            }
            other => Err(Error::config(format!(
                "Snapshot backend factory cannot build a '{}' backend",
                other.type_name()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluation::ComplianceType;
    use tempfile::tempdir;

    const SNAPSHOT: &str = r#"{
        "regions": { "us-east-1": ["1.2.3.4"], "eu-west-1": [] },
        "zones": [
            {
                "id": "/hostedzone/Z1",
                "name": "example.com.",
                "record_sets": [
                    { "name": "a.example.com.", "type": "A", "resource_records": [{ "value": "1.2.3.4" }] },
                    { "name": "b.example.com.", "type": "A", "resource_records": [{ "value": "5.6.7.8" }] },
                    { "name": "www.example.com.", "type": "CNAME", "resource_records": [{ "value": "a.example.com" }] }
                ]
            }
        ],
        "evaluations": [
            { "resource_id": "aws:111122223333:hostedzone:Z1:old.example.com:type:A", "compliance_type": "NON_COMPLIANT" }
        ]
    }"#;

    #[tokio::test]
    async fn snapshot_is_served_through_the_traits() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("account.json");
        fs::write(&path, SNAPSHOT).await.unwrap();

        let backend = SnapshotBackend::load(&path, None, 2).await.unwrap();

        let mut regions = backend.list_regions().await.unwrap();
        regions.sort();
        assert_eq!(regions, vec!["eu-west-1", "us-east-1"]);

        let zones = backend.list_zones(None).await.unwrap();
        assert_eq!(zones.zones.len(), 1);

        let first = backend.list_record_sets("Z1", None).await.unwrap();
        assert_eq!(first.record_sets.len(), 2);
        let second = backend
            .list_record_sets("Z1", first.next.as_ref())
            .await
            .unwrap();
        assert_eq!(second.record_sets.len(), 1);
        assert!(second.next.is_none());

        let prior = backend.non_compliant_evaluations("rule", None).await.unwrap();
        assert_eq!(prior.evaluations.len(), 1);
        assert_eq!(backend.output_path(), dir.path().join("account.evaluations.json"));
    }

    #[tokio::test]
    async fn submissions_are_written_atomically_to_the_output_file() {
        let dir = tempdir().unwrap();
        let output = dir.path().join("out").join("results.json");
        let backend = SnapshotBackend::from_snapshot(Snapshot::default(), output.clone(), 10);

        let id = "aws:111122223333:hostedzone:Z1:old.example.com:type:A";
        backend
            .put_evaluations(&[Evaluation::compliant(id, chrono::Utc::now())], "token-1")
            .await
            .unwrap();
        backend.put_evaluations(&[], "token-1").await.unwrap();

        let content = fs::read_to_string(&output).await.unwrap();
        let written: OutputFileFormat = serde_json::from_str(&content).unwrap();
        assert_eq!(written.version, OUTPUT_FILE_VERSION);
        assert_eq!(written.submissions.len(), 2);
        assert_eq!(written.submissions[0].evaluations[0].compliance_type, ComplianceType::Compliant);
        assert!(!output.with_extension("tmp").exists());
    }

    #[tokio::test]
    async fn failed_write_leaves_the_store_untouched() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        fs::write(&blocker, "").await.unwrap();

        let id = "aws:111122223333:hostedzone:Z1:old.example.com:type:A";
        let snapshot = Snapshot {
            evaluations: vec![StoredEvaluation::new(id, ComplianceType::NonCompliant)],
            ..Snapshot::default()
        };
        let backend = SnapshotBackend::from_snapshot(snapshot, blocker.join("results.json"), 10);

        let result = backend
            .put_evaluations(&[Evaluation::compliant(id, chrono::Utc::now())], "token-1")
            .await;

        assert!(result.is_err());
        assert!(backend.submissions().await.is_empty());
        let prior = backend.non_compliant_evaluations("rule", None).await.unwrap();
        assert_eq!(prior.evaluations.len(), 1);
    }

    #[tokio::test]
    async fn missing_or_corrupt_snapshot_is_a_config_error() {
        let dir = tempdir().unwrap();
        let missing = SnapshotBackend::load(dir.path().join("nope.json"), None, 10).await;
        assert!(matches!(missing, Err(Error::Config(_))));

        let corrupt = dir.path().join("corrupt.json");
        fs::write(&corrupt, "{ not json").await.unwrap();
        let corrupt = SnapshotBackend::load(&corrupt, None, 10).await;
        assert!(matches!(corrupt, Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn factory_builds_from_config() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("account.json");
        fs::write(&path, SNAPSHOT).await.unwrap();

        let config = BackendConfig::Snapshot {
            path: path.to_string_lossy().into_owned(),
            output_path: None,
            page_size: 100,
        };
        let backends = SnapshotBackendFactory.create(&config).await.unwrap();
        assert_eq!(backends.zones.directory_name(), "snapshot");
        assert!(SnapshotBackendFactory.create(&BackendConfig::Memory).await.is_err());
    }
}
