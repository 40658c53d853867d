//! Zone listing and record extraction
//!
//! [`list_zones`] pages through every zone of the account.
//! [`extract_address_index`] pages through one zone's record sets and builds
//! the address → records mapping the reconciler works on.
//!
//! Only simple address records are indexed: alias record sets and every
//! non-A type are skipped.

use std::collections::HashSet;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::model::{AddressIndex, RecordRef, ResourceRecordSet, Zone, normalize_record_name};
use crate::pagination::PageCursor;
use crate::traits::ZoneDirectory;

/// List every zone of the account, across all listing pages
///
/// A zone id that shows up on more than one page is kept once.
pub async fn list_zones(directory: &dyn ZoneDirectory, account_id: &str) -> Result<Vec<Zone>> {
    let mut cursor = PageCursor::new("zone listing");
    let mut seen = HashSet::new();
    let mut zones = Vec::new();

    loop {
        let page = directory
            .list_zones(cursor.token())
            .await
            .map_err(|e| Error::zone_directory(format!("Failed to list zones: {}", e)))?;

        for hosted_zone in page.zones {
            let zone = Zone::from_listing(&hosted_zone.id, account_id);
            if seen.insert(zone.id.clone()) {
                zones.push(zone);
            }
        }

        if !cursor.advance(page.next_marker)? {
            break;
        }
    }

    info!(
        "Found {} zone(s) in {} via {}",
        zones.len(),
        account_id,
        directory.directory_name()
    );
    Ok(zones)
}

/// Build the address index for one zone
///
/// Any page failure fails the whole zone; a partial index would make the
/// missing records look compliant.
pub async fn extract_address_index(
    directory: &dyn ZoneDirectory,
    zone: &Zone,
) -> Result<AddressIndex> {
    let mut cursor = PageCursor::new(format!("record listing for zone {}", zone.id));
    let mut index = AddressIndex::new();
    let mut indexed = 0;

    loop {
        let page = directory
            .list_record_sets(&zone.id, cursor.token())
            .await
            .map_err(|e| {
                Error::zone_directory(format!(
                    "Failed to list record sets for zone {} (page {}): {}",
                    zone.id,
                    cursor.pages() + 1,
                    e
                ))
            })?;

        indexed += index_record_sets(&mut index, zone, &page.record_sets);

        if !cursor.advance(page.next)? {
            break;
        }
    }

    debug!(
        "Zone {}: indexed {} record set(s) over {} page(s), {} distinct address(es)",
        zone.id,
        indexed,
        cursor.pages(),
        index.len()
    );
    Ok(index)
}

/// Add the qualifying record sets of one page to the index
///
/// Returns the number of record sets that qualified.
pub fn index_record_sets(
    index: &mut AddressIndex,
    zone: &Zone,
    record_sets: &[ResourceRecordSet],
) -> usize {
    let mut indexed = 0;
    for set in record_sets.iter().filter(|s| s.is_simple_address_record()) {
        let record = RecordRef::new(
            zone.id.clone(),
            normalize_record_name(&set.name),
            set.record_type.clone(),
        );
        for address in set.values() {
            index.insert(address, record.clone());
        }
        indexed += 1;
    }
    indexed
}
