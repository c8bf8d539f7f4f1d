//! # notebridge-sync
//!
//! Change detection, conflict resolution and the sync orchestrator that keeps
//! an org tree and a markdown tree in step.
//!
//! Most callers want [`pipeline::run`], which loads the config and state under
//! a home directory, runs one [`Syncer::sync`] pass and persists the result.
//! [`Syncer`] is the lower-level entry for callers that own their state.

pub mod detector;
pub mod diff;
pub mod error;
pub mod events;
pub mod lock;
pub mod pipeline;
pub mod resolver;
pub mod scan;
pub mod state_store;
pub mod status;
pub mod syncer;
pub mod writer;

pub use detector::{has_changed, FileStatus};
pub use error::{PairError, SyncError};
pub use events::{EventSink, MemorySink, SyncEvent, TracingSink};
pub use resolver::{decide, resolve, ConflictDecision, PairStatus};
pub use scan::scan_directory;
pub use syncer::{ConflictRecord, SyncResult, SyncSummary, Syncer};
pub use writer::WriteResult;
