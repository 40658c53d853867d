//! Inventory collection
//!
//! Builds the set of public addresses backed by live compute instances by
//! asking every region concurrently and taking the union of the answers.
//!
//! ## Failure policy
//!
//! - Region listing fails → the collection fails (nothing to compare against)
//! - One region's address listing fails → depends on [`RegionFailurePolicy`]:
//!   `Abort` fails the collection, `Skip` drops that region with a warning
//! - Every region fails under `Skip` → the collection fails

use futures::future::{join_all, try_join_all};
use tracing::{debug, info, warn};

use crate::config::RegionFailurePolicy;
use crate::error::{Error, Result};
use crate::model::Inventory;
use crate::traits::ComputeInventory;

/// Collect the live address inventory across every region
pub async fn collect_inventory(
    source: &dyn ComputeInventory,
    policy: RegionFailurePolicy,
) -> Result<Inventory> {
    let regions = source
        .list_regions()
        .await
        .map_err(|e| Error::inventory(format!("Failed to list regions: {}", e)))?;

    if regions.is_empty() {
        warn!("Region listing returned no regions; inventory is empty");
        return Ok(Inventory::new());
    }

    debug!("Collecting addresses from {} region(s)", regions.len());

    let inventory = match policy {
        RegionFailurePolicy::Abort => {
            let per_region = try_join_all(regions.iter().map(|region| async move {
                source
                    .list_public_addresses(region)
                    .await
                    .map(|addresses| region_inventory(region, addresses))
                    .map_err(|e| {
                        Error::inventory(format!(
                            "Failed to list addresses in region {}: {}",
                            region, e
                        ))
                    })
            }))
            .await?;

            per_region.into_iter().fold(Inventory::new(), Inventory::merge)
        }
        RegionFailurePolicy::Skip => {
            let results = join_all(regions.iter().map(|region| async move {
                (region, source.list_public_addresses(region).await)
            }))
            .await;

            let mut inventory = Inventory::new();
            let mut skipped = 0;
            for (region, result) in results {
                match result {
                    Ok(addresses) => inventory = inventory.merge(region_inventory(region, addresses)),
                    Err(e) => {
                        warn!(
                            "Skipping region {}: {}. Records pointing at its addresses will be reported as non-compliant.",
                            region, e
                        );
                        skipped += 1;
                    }
                }
            }

            if skipped == regions.len() {
                return Err(Error::inventory(format!(
                    "Address listing failed in all {} region(s)",
                    regions.len()
                )));
            }
            inventory
        }
    };

    info!(
        "Collected {} live address(es) from {} region(s)",
        inventory.len(),
        regions.len()
    );
    Ok(inventory)
}

fn region_inventory(region: &str, addresses: Vec<String>) -> Inventory {
    debug!("Region {}: {} address(es)", region, addresses.len());
    addresses.into_iter().collect()
}
