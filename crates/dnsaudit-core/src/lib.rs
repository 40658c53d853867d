// # dnsaudit-core
//
// Core library for the dangling DNS record compliance job.
//
// ## Architecture Overview
//
// One run audits every hosted zone of one account:
// - **ZoneDirectory**: Trait for listing zones and paging through record sets
// - **ComputeInventory**: Trait for listing live public addresses per region
// - **EvaluationStore**: Trait for prior results and batch submission
// - **AuditEngine**: Orchestrates inventory → extract → reconcile → publish
// - **BackendRegistry**: Plugin-based registry for backend implementations
//
// An A record whose address is not held by any live instance is reported
// NON_COMPLIANT; a record reported earlier that no longer points at an
// unbacked address is flipped back to COMPLIANT.
//
// ## Design Principles
//
// 1. **Read-only towards DNS**: records are reported, never changed
// 2. **Zone isolation**: one zone's failure never stops another zone
// 3. **Plugin-Based**: Backends are registered dynamically
// 4. **Library-First**: All core functionality can be used as a library

pub mod traits;
pub mod model;
pub mod evaluation;
pub mod engine;
pub mod registry;
pub mod config;
pub mod error;
pub mod inventory;
pub mod extract;
pub mod reconcile;
pub mod publish;
pub mod backend;

mod pagination;

// Re-export core types for convenience
pub use traits::{ComputeInventory, EvaluationStore, ZoneDirectory};
pub use engine::{AuditEngine, AuditEvent, RunReport, ZoneOutcome, ZoneReport};
pub use registry::{BackendFactory, BackendRegistry, Backends};
pub use config::{AuditConfig, BackendConfig, EngineConfig, RegionFailurePolicy};
pub use evaluation::{ComplianceType, Evaluation, Invocation, ResourceId, StoredEvaluation};
pub use error::{Error, Result};
pub use backend::{MemoryBackend, SnapshotBackend};
