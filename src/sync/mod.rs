//! Sync Engine
//!
//! Sequences state collection, classification, conflict reporting, pull and
//! push for one run against a local store and a remote branch.

pub mod conflict;
pub mod orchestrator;
pub mod pull;
pub mod push;
pub mod ref_wait;

pub use conflict::{render_conflict_report, ConflictReporter};
pub use orchestrator::{SyncOrchestrator, SyncPhase, SyncPlan, SyncResult};
pub use pull::{PullExecutor, PullReport};
pub use push::PushExecutor;
pub use ref_wait::{wait_for_ref, RefWaitPolicy};
