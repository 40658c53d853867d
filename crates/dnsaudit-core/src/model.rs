//! Domain types shared by the collector, extractor, reconciler and publisher
//!
//! Raw listing shapes (`HostedZone`, `ResourceRecordSet`) come back from the
//! collaborator traits; everything else is built from them during a run.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;

/// Prefix the zone listing puts in front of every zone id
pub const HOSTED_ZONE_PREFIX: &str = "/hostedzone/";

/// DNS record type
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RecordType {
    /// A record (IPv4)
    A,
    /// AAAA record (IPv6)
    Aaaa,
    /// Any other record type, kept verbatim
    Other(String),
}

impl RecordType {
    /// Wire name of the record type
    pub fn as_str(&self) -> &str {
        match self {
            RecordType::A => "A",
            RecordType::Aaaa => "AAAA",
            RecordType::Other(name) => name,
        }
    }

    /// Whether records of this type map a name straight to literal addresses
    /// that this job evaluates
    pub fn is_evaluated(&self) -> bool {
        matches!(self, RecordType::A)
    }
}

impl From<String> for RecordType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "A" => RecordType::A,
            "AAAA" => RecordType::Aaaa,
            _ => RecordType::Other(value),
        }
    }
}

impl From<&str> for RecordType {
    fn from(value: &str) -> Self {
        RecordType::from(value.to_string())
    }
}

impl From<RecordType> for String {
    fn from(value: RecordType) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opaque continuation token handed back by a paginated listing
///
/// Only the backend that produced a token knows what it encodes; callers
/// pass it back unchanged to fetch the next page.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContinuationToken(String);

impl ContinuationToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContinuationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A zone as returned by the zone listing (id still prefixed)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostedZone {
    /// Raw zone id, e.g. `/hostedzone/Z123`
    pub id: String,
    /// Zone apex name, e.g. `example.com.`
    #[serde(default)]
    pub name: String,
}

impl HostedZone {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// One page of the zone listing
#[derive(Debug, Clone, Default)]
pub struct ZonePage {
    pub zones: Vec<HostedZone>,
    pub next_marker: Option<ContinuationToken>,
}

/// A zone under audit for one account
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Zone {
    /// Normalized zone id (listing prefix stripped)
    pub id: String,
    /// Account that owns the zone
    pub account_id: String,
}

impl Zone {
    /// Build a zone from a raw listing id
    pub fn from_listing(raw_id: &str, account_id: impl Into<String>) -> Self {
        Self {
            id: normalize_zone_id(raw_id).to_string(),
            account_id: account_id.into(),
        }
    }
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}

/// Strip the listing prefix from a zone id
pub fn normalize_zone_id(raw_id: &str) -> &str {
    raw_id.strip_prefix(HOSTED_ZONE_PREFIX).unwrap_or(raw_id)
}

/// Normalize a record name as returned by the record listing
///
/// Strips the trailing root dot. Escapes such as `\052` are kept as
/// listed, so identifiers stay stable across runs.
pub fn normalize_record_name(raw_name: &str) -> String {
    raw_name.strip_suffix('.').unwrap_or(raw_name).to_string()
}

/// Alias target of a record set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AliasTarget {
    pub dns_name: String,
    #[serde(default)]
    pub hosted_zone_id: String,
}

/// One literal value attached to a record set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRecord {
    pub value: String,
}

impl ResourceRecord {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
        }
    }
}

/// A record set as returned by the record listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRecordSet {
    /// Trailing-dot-terminated name, e.g. `www.example.com.`
    pub name: String,
    #[serde(rename = "type")]
    pub record_type: RecordType,
    #[serde(default)]
    pub alias_target: Option<AliasTarget>,
    #[serde(default)]
    pub resource_records: Vec<ResourceRecord>,
    /// Distinguishes weighted/latency record sets sharing a name
    #[serde(default)]
    pub set_identifier: Option<String>,
    #[serde(default)]
    pub ttl: Option<u32>,
}

impl ResourceRecordSet {
    /// Simple A record set pointing at the given addresses
    pub fn a(name: impl Into<String>, addresses: &[&str]) -> Self {
        Self {
            name: name.into(),
            record_type: RecordType::A,
            alias_target: None,
            resource_records: addresses.iter().map(|a| ResourceRecord::new(*a)).collect(),
            set_identifier: None,
            ttl: Some(300),
        }
    }

    /// Alias record set (never evaluated)
    pub fn alias(name: impl Into<String>, record_type: RecordType, target: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            record_type,
            alias_target: Some(AliasTarget {
                dns_name: target.into(),
                hosted_zone_id: String::new(),
            }),
            resource_records: Vec::new(),
            set_identifier: None,
            ttl: None,
        }
    }

    /// Whether this record set maps a name directly to literal addresses
    pub fn is_simple_address_record(&self) -> bool {
        self.alias_target.is_none() && self.record_type.is_evaluated()
    }

    /// Literal values attached to the record set
    pub fn values(&self) -> impl Iterator<Item = &str> {
        self.resource_records.iter().map(|r| r.value.as_str())
    }
}

/// One page of the record listing
#[derive(Debug, Clone, Default)]
pub struct RecordSetPage {
    pub record_sets: Vec<ResourceRecordSet>,
    pub next: Option<ContinuationToken>,
}

/// Reference to a record that points at an address
///
/// Identity is (zone, name, type): record sets that share a name and type
/// (weighted or latency sets) are one record for compliance purposes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordRef {
    pub zone_id: String,
    pub name: String,
    pub record_type: RecordType,
}

impl RecordRef {
    pub fn new(zone_id: impl Into<String>, name: impl Into<String>, record_type: RecordType) -> Self {
        Self {
            zone_id: zone_id.into(),
            name: name.into(),
            record_type,
        }
    }
}

/// Set of public addresses backed by a live compute instance
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Inventory {
    addresses: HashSet<String>,
}

impl Inventory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, address: &str) -> bool {
        self.addresses.contains(address)
    }

    pub fn len(&self) -> usize {
        self.addresses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }

    /// Union with another inventory
    pub fn merge(mut self, other: Inventory) -> Self {
        self.addresses.extend(other.addresses);
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.addresses.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for Inventory {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            addresses: iter.into_iter().map(Into::into).collect(),
        }
    }
}

/// Mapping from target address to the records pointing at it
///
/// Iterates addresses in lexicographic order; each bucket keeps the order in
/// which records were first inserted and holds a record at most once.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddressIndex {
    buckets: BTreeMap<String, Vec<RecordRef>>,
}

impl AddressIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a record under an address bucket
    ///
    /// Returns `false` if the record was already in that bucket.
    pub fn insert(&mut self, address: impl Into<String>, record: RecordRef) -> bool {
        let bucket = self.buckets.entry(address.into()).or_default();
        if bucket.contains(&record) {
            return false;
        }
        bucket.push(record);
        true
    }

    /// Drop an address bucket entirely
    pub fn remove(&mut self, address: &str) -> Option<Vec<RecordRef>> {
        self.buckets.remove(address)
    }

    /// Keep only the buckets whose address satisfies the predicate
    pub fn retain(&mut self, mut keep: impl FnMut(&str) -> bool) {
        self.buckets.retain(|address, _| keep(address));
    }

    pub fn get(&self, address: &str) -> Option<&[RecordRef]> {
        self.buckets.get(address).map(Vec::as_slice)
    }

    pub fn contains_address(&self, address: &str) -> bool {
        self.buckets.contains_key(address)
    }

    /// Number of distinct addresses
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[RecordRef])> {
        self.buckets
            .iter()
            .map(|(address, records)| (address.as_str(), records.as_slice()))
    }
}

/// A record currently pointing at one or more unbacked addresses
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finding {
    pub name: String,
    pub record_type: RecordType,
    /// Offending addresses in the order they were first seen, no duplicates
    pub addresses: Vec<String>,
}

impl Finding {
    /// Human-readable list of offending addresses
    pub fn annotation(&self) -> String {
        format!("IPv4: {}", self.addresses.join(", "))
    }
}
