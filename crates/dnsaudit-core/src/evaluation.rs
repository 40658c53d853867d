//! Evaluation results exchanged with the external evaluation store
//!
//! ## Resource identifiers
//!
//! Every evaluated record is reported against a synthetic account-level
//! resource:
//!
//! ```text
//! aws:<account>:hostedzone:<zoneId>:<recordName>:type:<recordType>
//! ```
//!
//! Parsing anchors on the `hostedzone` segment, so identifiers without the
//! leading partition segment are accepted too, and record names that contain
//! `:` survive a round trip.

use crate::error::{Error, Result};
use crate::model::{RecordType, Zone};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Resource type every evaluation is reported under
pub const ACCOUNT_RESOURCE_TYPE: &str = "AWS::::Account";

/// Partition segment written at the front of new resource identifiers
pub const DEFAULT_PARTITION: &str = "aws";

/// Longest annotation the evaluation store accepts
pub const MAX_ANNOTATION_LEN: usize = 256;

const ZONE_SEGMENT: &str = "hostedzone";
const TYPE_SEPARATOR: &str = ":type:";

/// Compliance state of one evaluated resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ComplianceType {
    Compliant,
    NonCompliant,
    NotApplicable,
}

impl ComplianceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComplianceType::Compliant => "COMPLIANT",
            ComplianceType::NonCompliant => "NON_COMPLIANT",
            ComplianceType::NotApplicable => "NOT_APPLICABLE",
        }
    }
}

impl fmt::Display for ComplianceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Synthetic identifier of one DNS record within an account
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceId {
    /// Leading partition segment, absent on bare identifiers
    pub partition: Option<String>,
    pub account_id: String,
    pub zone_id: String,
    pub record_name: String,
    pub record_type: RecordType,
}

impl ResourceId {
    /// Identifier for a record in a zone, under the default partition
    pub fn for_record(zone: &Zone, name: impl Into<String>, record_type: RecordType) -> Self {
        Self {
            partition: Some(DEFAULT_PARTITION.to_string()),
            account_id: zone.account_id.clone(),
            zone_id: zone.id.clone(),
            record_name: name.into(),
            record_type,
        }
    }

    /// Whether the identifier belongs to this zone of this account
    pub fn belongs_to(&self, zone: &Zone) -> bool {
        self.account_id == zone.account_id && self.zone_id == zone.id
    }

    /// Whether two identifiers name the same record, ignoring the partition
    pub fn same_record(&self, other: &ResourceId) -> bool {
        self.account_id == other.account_id
            && self.zone_id == other.zone_id
            && self.record_name == other.record_name
            && self.record_type == other.record_type
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(partition) = &self.partition {
            write!(f, "{}:", partition)?;
        }
        write!(
            f,
            "{}:{}:{}:{}{}{}",
            self.account_id,
            ZONE_SEGMENT,
            self.zone_id,
            self.record_name,
            TYPE_SEPARATOR,
            self.record_type
        )
    }
}

impl FromStr for ResourceId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let segments: Vec<&str> = s.split(':').collect();
        let zone_pos = segments
            .iter()
            .position(|segment| *segment == ZONE_SEGMENT)
            .ok_or_else(|| Error::invalid_resource_id(format!("no zone segment in '{}'", s)))?;

        if zone_pos == 0 || segments.len() < zone_pos + 3 {
            return Err(Error::invalid_resource_id(format!(
                "missing account or zone in '{}'",
                s
            )));
        }

        let account_id = segments[zone_pos - 1];
        let zone_id = segments[zone_pos + 1];
        if account_id.is_empty() || zone_id.is_empty() {
            return Err(Error::invalid_resource_id(format!(
                "empty account or zone in '{}'",
                s
            )));
        }

        let partition = (zone_pos > 1).then(|| segments[..zone_pos - 1].join(":"));

        let tail = segments[zone_pos + 2..].join(":");
        let (record_name, record_type) = tail
            .rsplit_once(TYPE_SEPARATOR)
            .ok_or_else(|| Error::invalid_resource_id(format!("no record type in '{}'", s)))?;

        if record_name.is_empty() || record_type.is_empty() {
            return Err(Error::invalid_resource_id(format!(
                "empty record name or type in '{}'",
                s
            )));
        }

        Ok(Self {
            partition,
            account_id: account_id.to_string(),
            zone_id: zone_id.to_string(),
            record_name: record_name.to_string(),
            record_type: RecordType::from(record_type),
        })
    }
}

/// One evaluation submitted to the store
///
/// Created fresh for every finding and every flipped record; never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Evaluation {
    pub compliance_resource_type: String,
    pub compliance_resource_id: String,
    pub compliance_type: ComplianceType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotation: Option<String>,
    pub ordering_timestamp: DateTime<Utc>,
}

impl Evaluation {
    /// A record pointing at unbacked addresses
    pub fn non_compliant(
        resource_id: &ResourceId,
        annotation: impl Into<String>,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            compliance_resource_type: ACCOUNT_RESOURCE_TYPE.to_string(),
            compliance_resource_id: resource_id.to_string(),
            compliance_type: ComplianceType::NonCompliant,
            annotation: Some(truncate_annotation(&annotation.into())),
            ordering_timestamp: at,
        }
    }

    /// A previously reported record that is no longer in violation
    ///
    /// The stored identifier is echoed verbatim so the store matches it to
    /// the resource it already holds.
    pub fn compliant(resource_id: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            compliance_resource_type: ACCOUNT_RESOURCE_TYPE.to_string(),
            compliance_resource_id: resource_id.into(),
            compliance_type: ComplianceType::Compliant,
            annotation: None,
            ordering_timestamp: at,
        }
    }
}

/// Cut an annotation down to the store's limit on a char boundary
pub fn truncate_annotation(annotation: &str) -> String {
    if annotation.chars().count() <= MAX_ANNOTATION_LEN {
        return annotation.to_string();
    }
    let mut cut: String = annotation.chars().take(MAX_ANNOTATION_LEN - 3).collect();
    cut.push_str("...");
    cut
}

/// A prior evaluation returned by the store's lookup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredEvaluation {
    pub resource_id: String,
    pub compliance_type: ComplianceType,
    #[serde(default)]
    pub recorded_at: Option<DateTime<Utc>>,
}

impl StoredEvaluation {
    pub fn new(resource_id: impl Into<String>, compliance_type: ComplianceType) -> Self {
        Self {
            resource_id: resource_id.into(),
            compliance_type,
            recorded_at: None,
        }
    }
}

/// One page of the prior-evaluation lookup
#[derive(Debug, Clone, Default)]
pub struct StoredEvaluationPage {
    pub evaluations: Vec<StoredEvaluation>,
    pub next: Option<crate::model::ContinuationToken>,
}

/// Trigger input for one run
///
/// Deserializes from the camelCase event handed over by the scheduler.
/// `invoking_event` and `rule_parameters` are carried through untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Invocation {
    pub account_id: String,
    pub config_rule_name: String,
    pub result_token: String,
    #[serde(default)]
    pub invoking_event: Option<String>,
    #[serde(default)]
    pub rule_parameters: Option<String>,
}

impl Invocation {
    pub fn new(
        account_id: impl Into<String>,
        config_rule_name: impl Into<String>,
        result_token: impl Into<String>,
    ) -> Self {
        Self {
            account_id: account_id.into(),
            config_rule_name: config_rule_name.into(),
            result_token: result_token.into(),
            invoking_event: None,
            rule_parameters: None,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.account_id.is_empty() {
            return Err(Error::config("Invocation account id cannot be empty"));
        }
        if self.account_id.contains(':') {
            return Err(Error::config("Invocation account id cannot contain ':'"));
        }
        if self.config_rule_name.is_empty() {
            return Err(Error::config("Invocation rule name cannot be empty"));
        }
        if self.result_token.is_empty() {
            return Err(Error::config("Invocation result token cannot be empty"));
        }
        Ok(())
    }
}
