//! Reconciliation of DNS records against the live address inventory
//!
//! 1. Every address bucket whose address is in the inventory is dropped:
//!    those records are backed and produce nothing this run.
//! 2. Every remaining address is charged to each record in its bucket.
//! 3. One [`Finding`] comes out per distinct record (name + type), listing
//!    all of that record's unbacked addresses.
//!
//! Findings come out in the order their record was first met while walking
//! the index; the index walks addresses in lexicographic order, so the output
//! is deterministic for a given inventory and index.

use std::collections::HashMap;

use crate::model::{AddressIndex, Finding, Inventory, RecordType};

/// Drop every bucket whose address is backed by a live instance
///
/// Returns the number of buckets dropped.
pub fn prune_backed(inventory: &Inventory, index: &mut AddressIndex) -> usize {
    let before = index.len();
    index.retain(|address| !inventory.contains(address));
    before - index.len()
}

/// Compute the findings for one zone
pub fn reconcile(inventory: &Inventory, mut index: AddressIndex) -> Vec<Finding> {
    prune_backed(inventory, &mut index);

    let mut findings: Vec<Finding> = Vec::new();
    let mut positions: HashMap<(String, RecordType), usize> = HashMap::new();

    for (address, records) in index.iter() {
        for record in records {
            let key = (record.name.clone(), record.record_type.clone());
            let pos = *positions.entry(key).or_insert_with(|| {
                findings.push(Finding {
                    name: record.name.clone(),
                    record_type: record.record_type.clone(),
                    addresses: Vec::new(),
                });
                findings.len() - 1
            });

            let finding = &mut findings[pos];
            if !finding.addresses.iter().any(|a| a == address) {
                finding.addresses.push(address.to_string());
            }
        }
    }

    findings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RecordRef;

    fn index(records: &[(&str, &[&str])]) -> AddressIndex {
        let mut index = AddressIndex::new();
        for (name, addresses) in records {
            for address in *addresses {
                index.insert(*address, RecordRef::new("Z1", *name, RecordType::A));
            }
        }
        index
    }

    fn inventory(addresses: &[&str]) -> Inventory {
        addresses.iter().copied().collect()
    }

    #[test]
    fn backed_record_produces_no_finding() {
        let findings = reconcile(
            &inventory(&["1.2.3.4"]),
            index(&[("a.example.com", &["1.2.3.4"])]),
        );
        assert!(findings.is_empty());
    }

    #[test]
    fn unbacked_record_produces_one_finding() {
        let findings = reconcile(
            &inventory(&["1.2.3.4"]),
            index(&[("b.example.com", &["5.6.7.8"])]),
        );
        assert_eq!(
            findings,
            vec![Finding {
                name: "b.example.com".into(),
                record_type: RecordType::A,
                addresses: vec!["5.6.7.8".into()],
            }]
        );
    }

    #[test]
    fn partially_backed_record_reports_only_unbacked_addresses() {
        let findings = reconcile(
            &inventory(&["9.9.9.9"]),
            index(&[("c.example.com", &["5.6.7.8", "9.9.9.9"])]),
        );
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].addresses, vec!["5.6.7.8".to_string()]);
    }

    #[test]
    fn multiple_unbacked_addresses_aggregate_into_one_finding() {
        let findings = reconcile(
            &inventory(&[]),
            index(&[("d.example.com", &["10.0.0.2", "10.0.0.1"])]),
        );
        assert_eq!(findings.len(), 1);
        assert_eq!(
            findings[0].addresses,
            vec!["10.0.0.1".to_string(), "10.0.0.2".to_string()]
        );
    }

    #[test]
    fn shared_address_is_charged_to_every_record() {
        let findings = reconcile(
            &inventory(&[]),
            index(&[
                ("e.example.com", &["7.7.7.7"]),
                ("f.example.com", &["7.7.7.7", "8.8.8.8"]),
            ]),
        );

        assert_eq!(findings.len(), 2);
        assert_eq!(findings[0].name, "e.example.com");
        assert_eq!(findings[0].addresses, vec!["7.7.7.7".to_string()]);
        assert_eq!(findings[1].name, "f.example.com");
        assert_eq!(
            findings[1].addresses,
            vec!["7.7.7.7".to_string(), "8.8.8.8".to_string()]
        );
    }

    #[test]
    fn empty_index_produces_nothing() {
        assert!(reconcile(&inventory(&["1.1.1.1"]), AddressIndex::new()).is_empty());
    }

    #[test]
    fn prune_reports_dropped_buckets() {
        let mut idx = index(&[("a.example.com", &["1.1.1.1", "2.2.2.2", "3.3.3.3"])]);
        assert_eq!(prune_backed(&inventory(&["1.1.1.1", "3.3.3.3", "4.4.4.4"]), &mut idx), 2);
        assert_eq!(idx.len(), 1);
        assert!(idx.contains_address("2.2.2.2"));
    }
}
