//! # Sync Run State Machine
//!
//! Tracks one run through its phases with validated transitions.
//!
//! ## Full Reconciliation
//!
//! ```text
//! Pending → PurgeDeletedUsers → CollectSnapshots → Plan ─┬─→ DeleteUsers → UpdateUsers → AddUsers
//!                                                        │         → AddGroups → ReconcileMembership
//!                                                        │         → DeleteGroups → Completed
//!                                                        └─→ Completed (dry run)
//! ```
//!
//! ## Independent Passes
//!
//! ```text
//! Pending → PurgeDeletedUsers → UserPass → GroupPass → Completed
//! Pending → GroupPass → Completed
//! ```
//!
//! Any non-terminal phase may move to `Failed` or `Cancelled`. Runs hold no
//! state between invocations; a failed run is retried from scratch.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use core_runtime::config::SyncMethod;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Result, SyncError};

/// Unique identifier for a sync run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SyncRunId(Uuid);

impl SyncRunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for SyncRunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SyncRunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncPhase {
    Pending,
    PurgeDeletedUsers,
    CollectSnapshots,
    Plan,
    DeleteUsers,
    UpdateUsers,
    AddUsers,
    AddGroups,
    ReconcileMembership,
    DeleteGroups,
    UserPass,
    GroupPass,
    Completed,
    Failed,
    Cancelled,
}

impl SyncPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SyncPhase::Completed | SyncPhase::Failed | SyncPhase::Cancelled
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SyncPhase::Pending => "pending",
            SyncPhase::PurgeDeletedUsers => "purge_deleted_users",
            SyncPhase::CollectSnapshots => "collect_snapshots",
            SyncPhase::Plan => "plan",
            SyncPhase::DeleteUsers => "delete_users",
            SyncPhase::UpdateUsers => "update_users",
            SyncPhase::AddUsers => "add_users",
            SyncPhase::AddGroups => "add_groups",
            SyncPhase::ReconcileMembership => "reconcile_membership",
            SyncPhase::DeleteGroups => "delete_groups",
            SyncPhase::UserPass => "user_pass",
            SyncPhase::GroupPass => "group_pass",
            SyncPhase::Completed => "completed",
            SyncPhase::Failed => "failed",
            SyncPhase::Cancelled => "cancelled",
        }
    }

    fn can_transition_to(self, to: SyncPhase) -> bool {
        use SyncPhase::*;

        match (self, to) {
            // Terminal phases cannot transition
            (Completed | Failed | Cancelled, _) => false,

            (_, Failed | Cancelled) => true,

            (Pending, PurgeDeletedUsers | CollectSnapshots | GroupPass) => true,
            (PurgeDeletedUsers, CollectSnapshots | UserPass) => true,
            (CollectSnapshots, Plan) => true,
            (Plan, DeleteUsers | Completed) => true,

            // Apply pipeline, strictly ordered
            (DeleteUsers, UpdateUsers) => true,
            (UpdateUsers, AddUsers) => true,
            (AddUsers, AddGroups) => true,
            (AddGroups, ReconcileMembership) => true,
            (ReconcileMembership, DeleteGroups) => true,
            (DeleteGroups, Completed) => true,

            (UserPass, GroupPass | Completed) => true,
            (GroupPass, Completed) => true,

            _ => false,
        }
    }
}

impl FromStr for SyncPhase {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self> {
        let phase = match s {
            "pending" => SyncPhase::Pending,
            "purge_deleted_users" => SyncPhase::PurgeDeletedUsers,
            "collect_snapshots" => SyncPhase::CollectSnapshots,
            "plan" => SyncPhase::Plan,
            "delete_users" => SyncPhase::DeleteUsers,
            "update_users" => SyncPhase::UpdateUsers,
            "add_users" => SyncPhase::AddUsers,
            "add_groups" => SyncPhase::AddGroups,
            "reconcile_membership" => SyncPhase::ReconcileMembership,
            "delete_groups" => SyncPhase::DeleteGroups,
            "user_pass" => SyncPhase::UserPass,
            "group_pass" => SyncPhase::GroupPass,
            "completed" => SyncPhase::Completed,
            "failed" => SyncPhase::Failed,
            "cancelled" => SyncPhase::Cancelled,
            other => return Err(SyncError::Config(format!("Unknown sync phase '{}'", other))),
        };
        Ok(phase)
    }
}

impl std::fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Counters collected while a run applies changes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncStats {
    pub users_added: u64,
    pub users_updated: u64,
    pub users_deleted: u64,
    /// Creates the target rejected as already existing.
    pub users_conflicted: u64,
    pub groups_added: u64,
    pub groups_deleted: u64,
    pub members_added: u64,
    pub members_removed: u64,
    /// Target users removed because the source marks them deleted.
    pub deleted_users_purged: u64,
}

impl SyncStats {
    /// Total writes issued against the target.
    pub fn total_changes(&self) -> u64 {
        self.users_added
            + self.users_updated
            + self.users_deleted
            + self.groups_added
            + self.groups_deleted
            + self.members_added
            + self.members_removed
            + self.deleted_users_purged
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncRun {
    pub id: SyncRunId,
    pub method: SyncMethod,
    pub phase: SyncPhase,
    pub stats: SyncStats,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
}

impl SyncRun {
    pub fn new(method: SyncMethod) -> Self {
        Self {
            id: SyncRunId::new(),
            method,
            phase: SyncPhase::Pending,
            stats: SyncStats::default(),
            started_at: Utc::now(),
            completed_at: None,
            error_message: None,
        }
    }

    /// Move to the next non-terminal phase.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::InvalidPhaseTransition`] if `to` does not follow
    /// the current phase.
    pub fn advance(&mut self, to: SyncPhase) -> Result<()> {
        self.validate_transition(to)?;
        self.phase = to;
        Ok(())
    }

    pub fn complete(&mut self) -> Result<()> {
        self.validate_transition(SyncPhase::Completed)?;
        self.phase = SyncPhase::Completed;
        self.completed_at = Some(Utc::now());
        Ok(())
    }

    /// Record a failure. The phase the run failed in is kept in the message.
    pub fn fail(&mut self, error: &SyncError) -> Result<()> {
        let to = if error.is_cancelled() {
            SyncPhase::Cancelled
        } else {
            SyncPhase::Failed
        };
        self.validate_transition(to)?;
        self.error_message = Some(format!("{} (during {})", error, self.phase));
        self.phase = to;
        self.completed_at = Some(Utc::now());
        Ok(())
    }

    pub fn duration_secs(&self) -> Option<u64> {
        self.completed_at
            .map(|end| (end - self.started_at).num_seconds().max(0) as u64)
    }

    fn validate_transition(&self, to: SyncPhase) -> Result<()> {
        if !self.phase.can_transition_to(to) {
            return Err(SyncError::InvalidPhaseTransition {
                from: self.phase.as_str().to_string(),
                to: to.as_str().to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL_PIPELINE: [SyncPhase; 9] = [
        SyncPhase::PurgeDeletedUsers,
        SyncPhase::CollectSnapshots,
        SyncPhase::Plan,
        SyncPhase::DeleteUsers,
        SyncPhase::UpdateUsers,
        SyncPhase::AddUsers,
        SyncPhase::AddGroups,
        SyncPhase::ReconcileMembership,
        SyncPhase::DeleteGroups,
    ];

    #[test]
    fn test_sync_run_id_unique() {
        assert_ne!(SyncRunId::new(), SyncRunId::new());
    }

    #[test]
    fn test_full_pipeline_order() {
        let mut run = SyncRun::new(SyncMethod::Groups);
        for phase in FULL_PIPELINE {
            run.advance(phase).unwrap();
        }
        run.complete().unwrap();

        assert_eq!(run.phase, SyncPhase::Completed);
        assert!(run.completed_at.is_some());
        assert!(run.duration_secs().is_some());
    }

    #[test]
    fn test_dry_run_completes_after_plan() {
        let mut run = SyncRun::new(SyncMethod::Groups);
        run.advance(SyncPhase::CollectSnapshots).unwrap();
        run.advance(SyncPhase::Plan).unwrap();
        assert!(run.complete().is_ok());
    }

    #[test]
    fn test_independent_passes() {
        let mut run = SyncRun::new(SyncMethod::UsersGroups);
        run.advance(SyncPhase::PurgeDeletedUsers).unwrap();
        run.advance(SyncPhase::UserPass).unwrap();
        run.advance(SyncPhase::GroupPass).unwrap();
        run.complete().unwrap();
    }

    #[test]
    fn test_skipping_phase_is_rejected() {
        let mut run = SyncRun::new(SyncMethod::Groups);
        run.advance(SyncPhase::CollectSnapshots).unwrap();
        run.advance(SyncPhase::Plan).unwrap();
        run.advance(SyncPhase::DeleteUsers).unwrap();

        let err = run.advance(SyncPhase::AddGroups).unwrap_err();
        assert!(matches!(err, SyncError::InvalidPhaseTransition { .. }));
        assert_eq!(run.phase, SyncPhase::DeleteUsers);
    }

    #[test]
    fn test_going_backwards_is_rejected() {
        let mut run = SyncRun::new(SyncMethod::Groups);
        run.advance(SyncPhase::CollectSnapshots).unwrap();
        run.advance(SyncPhase::Plan).unwrap();
        assert!(run.advance(SyncPhase::CollectSnapshots).is_err());
    }

    #[test]
    fn test_fail_records_phase() {
        let mut run = SyncRun::new(SyncMethod::Groups);
        run.advance(SyncPhase::CollectSnapshots).unwrap();
        run.fail(&SyncError::inconsistent("add_member", "a@x.com", "missing"))
            .unwrap();

        assert_eq!(run.phase, SyncPhase::Failed);
        let message = run.error_message.unwrap();
        assert!(message.contains("a@x.com"));
        assert!(message.contains("collect_snapshots"));
    }

    #[test]
    fn test_cancel_and_terminal() {
        let mut run = SyncRun::new(SyncMethod::Groups);
        run.fail(&SyncError::Cancelled).unwrap();
        assert_eq!(run.phase, SyncPhase::Cancelled);
        assert!(run.phase.is_terminal());
        assert!(run.advance(SyncPhase::CollectSnapshots).is_err());
        assert!(run.complete().is_err());
    }

    #[test]
    fn test_phase_round_trip_strings() {
        for phase in FULL_PIPELINE {
            assert_eq!(phase.as_str().parse::<SyncPhase>().unwrap(), phase);
        }
        assert!("bogus".parse::<SyncPhase>().is_err());
    }
}
