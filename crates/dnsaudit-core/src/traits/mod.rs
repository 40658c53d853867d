//! Collaborator traits for the DNS audit job
//!
//! The job only reads from and submits to external systems; each system sits
//! behind one of these traits.
//!
//! - [`ZoneDirectory`]: list zones and page through their record sets
//! - [`ComputeInventory`]: list regions and the public addresses in each
//! - [`EvaluationStore`]: look up prior violations and submit new evaluations

pub mod zone_directory;
pub mod compute_inventory;
pub mod evaluation_store;

pub use zone_directory::ZoneDirectory;
pub use compute_inventory::ComputeInventory;
pub use evaluation_store::EvaluationStore;
