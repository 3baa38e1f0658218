//! Notesync: three-way sync between a local file store and a Git branch
//!
//! Every path is compared across three snapshots (the last synced commit, the
//! local store, the current remote head) by Git blob id. Paths changed on one
//! side are pulled or pushed; paths changed on both sides are reported as
//! conflicts and nothing is applied.

pub mod cli;
pub mod config;
pub mod content;
pub mod diff;
pub mod error;
pub mod hash;
pub mod logging;
pub mod persist;
pub mod remote;
pub mod state;
pub mod store;
pub mod sync;
pub mod types;

pub use config::SyncConfig;
pub use diff::{classify, DiffAction, DiffResult};
pub use error::{RemoteError, RemoteErrorKind, StoreError, SyncError};
pub use hash::compute_blob_id;
pub use state::{FileState, FileStates, StateBuilder};
pub use sync::{SyncOrchestrator, SyncResult};
