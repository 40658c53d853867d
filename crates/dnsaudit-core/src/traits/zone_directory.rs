// # Zone Directory Trait
//
// Read-only access to DNS zones and the record sets inside them.
//
// ## Usage
//
// ```rust,ignore
// use dnsaudit_core::ZoneDirectory;
//
// let directory = /* ZoneDirectory implementation */;
//
// let page = directory.list_zones(None).await?;
// for zone in page.zones {
//     let first = directory.list_record_sets(&zone.id, None).await?;
//     // follow `first.next` until it is `None`
// }
// ```

use async_trait::async_trait;

use crate::model::{ContinuationToken, RecordSetPage, ZonePage};

/// Trait for zone directory implementations
///
/// # Contract
///
/// - Stateless between calls: pagination state lives in the tokens only
/// - One API call per method invocation, no retries (a failed page fails
///   the zone; the next scheduled run is the retry)
/// - A returned token must differ from the token that produced the page
#[async_trait]
pub trait ZoneDirectory: Send + Sync {
    /// List one page of zones
    ///
    /// # Parameters
    ///
    /// - `marker`: `None` for the first page, otherwise the previous page's
    ///   `next_marker`
    async fn list_zones(
        &self,
        marker: Option<&ContinuationToken>,
    ) -> Result<ZonePage, crate::Error>;

    /// List one page of record sets for a zone
    ///
    /// # Parameters
    ///
    /// - `zone_id`: zone id as returned by [`list_zones`](Self::list_zones)
    ///   (prefixed or normalized, implementations accept both)
    /// - `start`: `None` for the first page, otherwise the previous page's
    ///   `next`
    async fn list_record_sets(
        &self,
        zone_id: &str,
        start: Option<&ContinuationToken>,
    ) -> Result<RecordSetPage, crate::Error>;

    /// Directory name (for logging)
    fn directory_name(&self) -> &'static str;
}
