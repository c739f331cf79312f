//! # Reconciliation Engine
//!
//! Keeps a target identity store aligned with a source directory.
//!
//! ## Components
//!
//! - **Filter Policy** (`filter`): which users and groups take part in a run
//! - **Snapshot Collector** (`snapshot`): point-in-time views of both sides
//! - **Diff Engine** (`diff`): pure classification into operation sets
//! - **Apply Pipeline** (`apply`): ordered execution against the target
//! - **Independent Passes** (`independent`): the user-then-group sync mode
//! - **Run State Machine** (`phase`): validated phase transitions and counters
//! - **Sync Coordinator** (`coordinator`): drives a run and publishes events
//!
//! Collaborators are passed explicitly through a [`SyncContext`]; nothing is
//! carried over between runs.

pub mod apply;
pub mod context;
pub mod coordinator;
pub mod diff;
pub mod error;
pub mod filter;
pub mod independent;
pub mod phase;
pub mod snapshot;

pub use apply::ApplyPipeline;
pub use context::SyncContext;
pub use coordinator::{SyncCoordinator, SyncReport, SyncSettings};
pub use diff::{
    GroupMembershipPlan, GroupOperations, MembershipOperations, SyncPlan, UserOperations,
};
pub use error::{Result, SyncError};
pub use filter::FilterPolicy;
pub use independent::{IndependentSync, UserIndex};
pub use phase::{SyncPhase, SyncRun, SyncRunId, SyncStats};
pub use snapshot::{SnapshotCollector, SourceSnapshot, TargetSnapshot};
