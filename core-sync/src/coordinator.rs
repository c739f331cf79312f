//! # Sync Coordinator
//!
//! Runs one reconciliation from start to finish and reports what it did.
//!
//! ## Workflow
//!
//! ### Full Reconciliation (`SyncMethod::Groups`)
//! 1. Purge target users the source marks deleted
//! 2. Collect source and target snapshots
//! 3. Compute the plan
//! 4. Apply it in dependency order (see [`crate::apply`])
//!
//! With `dry_run` set the run stops after step 3 and writes nothing.
//!
//! ### Independent Passes (`SyncMethod::UsersGroups`)
//! 1. Purge target users the source marks deleted
//! 2. User pass, building the user index
//! 3. Group pass over that index
//!
//! ## Usage
//!
//! ```rust,ignore
//! use core_async::sync::CancellationToken;
//! use core_sync::{SyncCoordinator, SyncSettings};
//!
//! let coordinator = SyncCoordinator::new(source, target, SyncSettings::from_config(&config), bus);
//! let report = coordinator.run_sync(CancellationToken::new()).await?;
//! println!("{} changes", report.run.stats.total_changes());
//! ```

use std::sync::Arc;

use bridge_traits::{SourceDirectory, TargetStore};
use core_async::sync::CancellationToken;
use core_runtime::config::{CoreConfig, SyncMethod};
use core_runtime::events::{EventBus, SyncEvent};
use tracing::{error, info, instrument, warn};

use crate::apply::ApplyPipeline;
use crate::context::SyncContext;
use crate::diff::SyncPlan;
use crate::filter::FilterPolicy;
use crate::independent::{IndependentSync, UserIndex};
use crate::phase::{SyncPhase, SyncRun};
use crate::snapshot::SnapshotCollector;
use crate::Result;

/// Per-coordinator run settings, derived from [`CoreConfig`].
#[derive(Debug, Clone)]
pub struct SyncSettings {
    pub method: SyncMethod,
    pub user_match: String,
    pub group_match: String,
    pub filter: FilterPolicy,
    pub probe_concurrency: usize,
    pub dry_run: bool,
}

impl SyncSettings {
    pub fn from_config(config: &CoreConfig) -> Self {
        Self {
            method: config.sync_method,
            user_match: config.user_match.clone(),
            group_match: config.group_match.clone(),
            filter: FilterPolicy::new(
                config.ignore_users.iter().cloned(),
                config.ignore_groups.iter().cloned(),
                config.include_groups.iter().cloned(),
            ),
            probe_concurrency: config.membership_probe_concurrency,
            dry_run: config.dry_run,
        }
    }
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            method: SyncMethod::default(),
            user_match: String::new(),
            group_match: String::new(),
            filter: FilterPolicy::allow_all(),
            probe_concurrency: 1,
            dry_run: false,
        }
    }
}

/// Outcome of a completed run.
#[derive(Debug, Clone)]
pub struct SyncReport {
    pub run: SyncRun,
    /// Present for full reconciliation runs.
    pub plan: Option<SyncPlan>,
    pub dry_run: bool,
}

pub struct SyncCoordinator {
    source: Arc<dyn SourceDirectory>,
    target: Arc<dyn TargetStore>,
    settings: SyncSettings,
    event_bus: EventBus,
}

impl SyncCoordinator {
    pub fn new(
        source: Arc<dyn SourceDirectory>,
        target: Arc<dyn TargetStore>,
        settings: SyncSettings,
        event_bus: EventBus,
    ) -> Self {
        Self {
            source,
            target,
            settings,
            event_bus,
        }
    }

    pub fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    fn context(&self, token: CancellationToken) -> SyncContext {
        SyncContext::new(
            self.source.clone(),
            self.target.clone(),
            self.settings.filter.clone(),
            token,
        )
        .with_probe_concurrency(self.settings.probe_concurrency)
    }

    /// Run the configured sync method.
    pub async fn run_sync(&self, token: CancellationToken) -> Result<SyncReport> {
        match self.settings.method {
            SyncMethod::Groups => {
                self.sync_groups_users(&self.settings.group_match, token)
                    .await
            }
            SyncMethod::UsersGroups => self.sync_users_then_groups(token).await,
        }
    }

    /// Full reconciliation of the groups matching `group_query` and their
    /// members.
    #[instrument(skip(self, token))]
    pub async fn sync_groups_users(
        &self,
        group_query: &str,
        token: CancellationToken,
    ) -> Result<SyncReport> {
        let ctx = self.context(token);
        let mut run = self.begin(SyncMethod::Groups);

        let result = self.execute_full(&ctx, &mut run, group_query).await;
        let plan = self.finish(&mut run, result)?;

        Ok(SyncReport {
            run,
            plan: Some(plan),
            dry_run: self.settings.dry_run,
        })
    }

    /// User pass on its own. The returned index feeds [`Self::sync_groups`].
    #[instrument(skip(self, token))]
    pub async fn sync_users(
        &self,
        user_query: &str,
        token: CancellationToken,
    ) -> Result<(SyncReport, UserIndex)> {
        let ctx = self.context(token);
        let mut run = self.begin(SyncMethod::UsersGroups);

        let result = self.execute_user_pass(&ctx, &mut run, user_query).await;
        let index = self.finish(&mut run, result)?;

        Ok((self.report(run), index))
    }

    /// Group pass on its own, over a user index from [`Self::sync_users`].
    #[instrument(skip(self, index, token))]
    pub async fn sync_groups(
        &self,
        group_query: &str,
        index: &UserIndex,
        token: CancellationToken,
    ) -> Result<SyncReport> {
        let ctx = self.context(token);
        let mut run = self.begin(SyncMethod::UsersGroups);

        let result = self.execute_group_pass(&ctx, &mut run, group_query, index).await;
        self.finish(&mut run, result)?;

        Ok(self.report(run))
    }

    async fn sync_users_then_groups(&self, token: CancellationToken) -> Result<SyncReport> {
        let ctx = self.context(token);
        let mut run = self.begin(SyncMethod::UsersGroups);

        let result = async {
            let index = self
                .execute_user_pass(&ctx, &mut run, &self.settings.user_match)
                .await?;
            self.execute_group_pass(&ctx, &mut run, &self.settings.group_match, &index)
                .await
        }
        .await;
        self.finish(&mut run, result)?;

        Ok(self.report(run))
    }

    async fn execute_full(
        &self,
        ctx: &SyncContext,
        run: &mut SyncRun,
        group_query: &str,
    ) -> Result<SyncPlan> {
        let collector = SnapshotCollector::new(ctx);
        let dry_run = self.settings.dry_run;

        if dry_run {
            info!("Dry run: skipping deleted user purge");
        } else {
            info!("Phase 1: Purging deleted users");
            self.enter(run, SyncPhase::PurgeDeletedUsers)?;
            run.stats.deleted_users_purged = collector.purge_deleted_users().await?;
        }

        info!("Phase 2: Collecting snapshots");
        self.enter(run, SyncPhase::CollectSnapshots)?;
        let source = collector
            .collect_source(group_query, &self.settings.user_match)
            .await?;
        let target = collector.collect_target().await?;

        info!("Phase 3: Computing plan");
        self.enter(run, SyncPhase::Plan)?;
        let plan = SyncPlan::compute(&source, &target);
        self.emit(SyncEvent::PlanComputed {
            run_id: run.id.to_string(),
            users_to_add: plan.users.add.len() as u64,
            users_to_update: plan.users.update.len() as u64,
            users_to_delete: plan.users.delete.len() as u64,
            groups_to_add: plan.groups.add.len() as u64,
            groups_to_delete: plan.groups.delete.len() as u64,
            members_to_add: plan.members_to_add() as u64,
            members_to_remove: plan.members_to_remove() as u64,
        });
        info!(
            users_to_add = plan.users.add.len(),
            users_to_update = plan.users.update.len(),
            users_to_delete = plan.users.delete.len(),
            groups_to_add = plan.groups.add.len(),
            groups_to_delete = plan.groups.delete.len(),
            members_to_add = plan.members_to_add(),
            members_to_remove = plan.members_to_remove(),
            converged = plan.is_converged(),
            "Plan computed"
        );

        if dry_run {
            info!("Dry run: no changes applied");
            return Ok(plan);
        }

        let apply = ApplyPipeline::new(ctx);

        info!("Phase 4: Deleting stale users");
        self.enter(run, SyncPhase::DeleteUsers)?;
        apply.delete_users(&plan.users.delete, &mut run.stats).await?;

        info!("Phase 5: Updating changed users");
        self.enter(run, SyncPhase::UpdateUsers)?;
        apply.update_users(&plan.users.update, &mut run.stats).await?;

        info!("Phase 6: Adding new users");
        self.enter(run, SyncPhase::AddUsers)?;
        apply.add_users(&plan.users.add, &mut run.stats).await?;

        info!("Phase 7: Adding new groups");
        self.enter(run, SyncPhase::AddGroups)?;
        apply.add_groups(&plan, &mut run.stats).await?;

        info!("Phase 8: Reconciling group membership");
        self.enter(run, SyncPhase::ReconcileMembership)?;
        apply.reconcile_membership(&plan, &mut run.stats).await?;

        info!("Phase 9: Deleting stale groups");
        self.enter(run, SyncPhase::DeleteGroups)?;
        apply.delete_groups(&plan.groups.delete, &mut run.stats).await?;

        Ok(plan)
    }

    async fn execute_user_pass(
        &self,
        ctx: &SyncContext,
        run: &mut SyncRun,
        user_query: &str,
    ) -> Result<UserIndex> {
        info!("Phase 1: Purging deleted users");
        self.enter(run, SyncPhase::PurgeDeletedUsers)?;
        run.stats.deleted_users_purged = SnapshotCollector::new(ctx).purge_deleted_users().await?;

        info!("Phase 2: Syncing users");
        self.enter(run, SyncPhase::UserPass)?;
        IndependentSync::new(ctx)
            .sync_users(user_query, &mut run.stats)
            .await
    }

    async fn execute_group_pass(
        &self,
        ctx: &SyncContext,
        run: &mut SyncRun,
        group_query: &str,
        index: &UserIndex,
    ) -> Result<()> {
        info!("Phase 3: Syncing groups");
        self.enter(run, SyncPhase::GroupPass)?;
        IndependentSync::new(ctx)
            .sync_groups(group_query, index, &mut run.stats)
            .await
    }

    fn begin(&self, method: SyncMethod) -> SyncRun {
        let run = SyncRun::new(method);
        info!(run_id = %run.id, method = %method, dry_run = self.settings.dry_run, "Starting sync");
        self.emit(SyncEvent::Started {
            run_id: run.id.to_string(),
            method: method.to_string(),
            dry_run: self.settings.dry_run,
        });
        run
    }

    fn enter(&self, run: &mut SyncRun, phase: SyncPhase) -> Result<()> {
        run.advance(phase)?;
        self.emit(SyncEvent::PhaseChanged {
            run_id: run.id.to_string(),
            phase: phase.to_string(),
        });
        Ok(())
    }

    /// Close the run with the body's outcome and publish the terminal event.
    fn finish<T>(&self, run: &mut SyncRun, result: Result<T>) -> Result<T> {
        let phase = run.phase;
        match result {
            Ok(value) => {
                run.complete()?;
                let stats = run.stats;
                info!(
                    run_id = %run.id,
                    users_added = stats.users_added,
                    users_updated = stats.users_updated,
                    users_deleted = stats.users_deleted,
                    users_conflicted = stats.users_conflicted,
                    groups_added = stats.groups_added,
                    groups_deleted = stats.groups_deleted,
                    members_added = stats.members_added,
                    members_removed = stats.members_removed,
                    deleted_users_purged = stats.deleted_users_purged,
                    "Sync completed"
                );
                self.emit(SyncEvent::Completed {
                    run_id: run.id.to_string(),
                    users_added: stats.users_added,
                    users_updated: stats.users_updated,
                    users_deleted: stats.users_deleted + stats.deleted_users_purged,
                    groups_added: stats.groups_added,
                    groups_deleted: stats.groups_deleted,
                    members_added: stats.members_added,
                    members_removed: stats.members_removed,
                    duration_secs: run.duration_secs().unwrap_or_default(),
                });
                Ok(value)
            }
            Err(e) => {
                if e.is_cancelled() {
                    warn!(run_id = %run.id, %phase, "Sync cancelled");
                } else {
                    error!(run_id = %run.id, %phase, error = %e, "Sync failed");
                }
                run.fail(&e).ok();
                self.emit(SyncEvent::Failed {
                    run_id: run.id.to_string(),
                    phase: phase.to_string(),
                    message: e.to_string(),
                    cancelled: e.is_cancelled(),
                });
                Err(e)
            }
        }
    }

    fn report(&self, run: SyncRun) -> SyncReport {
        SyncReport {
            run,
            plan: None,
            dry_run: false,
        }
    }

    fn emit(&self, event: SyncEvent) {
        self.event_bus.emit(event).ok();
    }
}
