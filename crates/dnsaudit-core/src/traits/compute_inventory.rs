// # Compute Inventory Trait
//
// Read-only access to the regions of the account and the public addresses
// currently allocated to compute instances in each of them.

use async_trait::async_trait;

/// Trait for compute inventory implementations
///
/// Implementations answer for one region per call and never fan out across
/// regions themselves; the collector owns the fan-out and the merge.
#[async_trait]
pub trait ComputeInventory: Send + Sync {
    /// List every region available to the account
    async fn list_regions(&self) -> Result<Vec<String>, crate::Error>;

    /// List the public addresses allocated in one region
    async fn list_public_addresses(&self, region: &str) -> Result<Vec<String>, crate::Error>;
}
