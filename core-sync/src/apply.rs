//! # Apply Pipeline
//!
//! Executes a [`SyncPlan`] against the target store in dependency order:
//!
//! 1. Delete stale users
//! 2. Update changed users
//! 3. Add new users
//! 4. Add new groups with their full membership
//! 5. Reconcile membership of unchanged groups
//! 6. Delete stale groups
//!
//! Later steps assume earlier ones converged the state they depend on: a new
//! group's members must already exist when step 4 runs.
//!
//! ## Tolerated Outcomes
//!
//! - `NotFound` while deleting means someone else already deleted it.
//! - `Conflict` on user creation means the user exists already.
//!
//! Everything else aborts the pipeline and is returned with the operation and
//! entity key. Applied steps are not rolled back.

use bridge_traits::{TargetGroup, TargetUser};
use tracing::{debug, info, instrument, warn};

use crate::context::SyncContext;
use crate::diff::SyncPlan;
use crate::phase::SyncStats;
use crate::{Result, SyncError};

pub struct ApplyPipeline<'a> {
    ctx: &'a SyncContext,
}

impl<'a> ApplyPipeline<'a> {
    pub fn new(ctx: &'a SyncContext) -> Self {
        Self { ctx }
    }

    /// Re-resolve a user right before writing to it.
    ///
    /// `Ok(None)` when the target no longer has the user.
    async fn lookup_user(&self, operation: &'static str, email: &str) -> Result<Option<TargetUser>> {
        match self
            .ctx
            .guarded(self.ctx.target().find_user_by_email(email))
            .await?
        {
            Ok(user) => Ok(Some(user)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(SyncError::transport(operation, email, e)),
        }
    }

    /// Resolve a user that must exist at this point of the pipeline.
    async fn require_user(&self, operation: &'static str, email: &str) -> Result<TargetUser> {
        self.lookup_user(operation, email).await?.ok_or_else(|| {
            SyncError::inconsistent(operation, email, "user does not exist in the target store")
        })
    }

    #[instrument(skip_all, fields(count = users.len()))]
    pub async fn delete_users(&self, users: &[TargetUser], stats: &mut SyncStats) -> Result<()> {
        for user in users {
            let email = user.username.as_str();

            let Some(current) = self.lookup_user("delete_user", email).await? else {
                debug!(email, "User already deleted");
                continue;
            };

            info!(email, "Deleting user");
            match self.ctx.guarded(self.ctx.target().delete_user(&current)).await? {
                Ok(()) => stats.users_deleted += 1,
                Err(e) if e.is_not_found() => debug!(email, "User already deleted"),
                Err(e) => return Err(SyncError::transport("delete_user", email, e)),
            }
        }
        Ok(())
    }

    #[instrument(skip_all, fields(count = users.len()))]
    pub async fn update_users(&self, users: &[TargetUser], stats: &mut SyncStats) -> Result<()> {
        for user in users {
            let email = user.username.as_str();
            let current = self.require_user("update_user", email).await?;

            let mut replacement = user.clone();
            replacement.id = current.id;

            info!(email, active = replacement.active, "Updating user");
            self.ctx
                .call("update_user", email, self.ctx.target().update_user(&replacement))
                .await?;
            stats.users_updated += 1;
        }
        Ok(())
    }

    #[instrument(skip_all, fields(count = users.len()))]
    pub async fn add_users(&self, users: &[TargetUser], stats: &mut SyncStats) -> Result<()> {
        for user in users {
            let email = user.username.as_str();

            info!(email, "Creating user");
            match self.ctx.guarded(self.ctx.target().create_user(user)).await? {
                Ok(_) => stats.users_added += 1,
                Err(e) if e.is_conflict() => {
                    warn!(email, error = %e, "User already exists, skipping");
                    stats.users_conflicted += 1;
                }
                Err(e) => return Err(SyncError::transport("create_user", email, e)),
            }
        }
        Ok(())
    }

    #[instrument(skip_all, fields(count = plan.groups.add.len()))]
    pub async fn add_groups(&self, plan: &SyncPlan, stats: &mut SyncStats) -> Result<()> {
        for group in &plan.groups.add {
            let name = group.display_name.as_str();

            info!(group = name, "Creating group");
            let created = self
                .ctx
                .call("create_group", name, self.ctx.target().create_group(group))
                .await?;
            stats.groups_added += 1;

            let members = plan
                .new_group_members
                .get(name)
                .map(Vec::as_slice)
                .unwrap_or_default();

            for email in members {
                let user = self.require_user("add_member", email).await?;

                debug!(email = %email, group = name, "Adding member to new group");
                self.ctx
                    .call("add_member", email, self.ctx.target().add_member(&user, &created))
                    .await?;
                stats.members_added += 1;
            }
        }
        Ok(())
    }

    #[instrument(skip_all, fields(count = plan.groups.equal.len()))]
    pub async fn reconcile_membership(&self, plan: &SyncPlan, stats: &mut SyncStats) -> Result<()> {
        for group in &plan.groups.equal {
            let name = group.display_name.as_str();
            let Some(ops) = plan.memberships.get(name) else {
                continue;
            };

            for email in &ops.add {
                let user = self.require_user("add_member", email).await?;

                let present = self
                    .ctx
                    .call("is_member", email, self.ctx.target().is_member(&user, group))
                    .await?;
                if present {
                    continue;
                }

                info!(email = %email, group = name, "Adding member");
                self.ctx
                    .call("add_member", email, self.ctx.target().add_member(&user, group))
                    .await?;
                stats.members_added += 1;
            }

            for user in &ops.delete {
                let email = user.username.as_str();
                info!(email, group = name, "Removing member");
                self.remove_member(user, group, stats).await?;
            }
        }
        Ok(())
    }

    async fn remove_member(
        &self,
        user: &TargetUser,
        group: &TargetGroup,
        stats: &mut SyncStats,
    ) -> Result<()> {
        let email = user.username.as_str();
        match self
            .ctx
            .guarded(self.ctx.target().remove_member(user, group))
            .await?
        {
            Ok(()) => stats.members_removed += 1,
            Err(e) if e.is_not_found() => debug!(email, "Membership already removed"),
            Err(e) => return Err(SyncError::transport("remove_member", email, e)),
        }
        Ok(())
    }

    #[instrument(skip_all, fields(count = groups.len()))]
    pub async fn delete_groups(&self, groups: &[TargetGroup], stats: &mut SyncStats) -> Result<()> {
        for group in groups {
            let name = group.display_name.as_str();

            let current = match self
                .ctx
                .guarded(self.ctx.target().find_group_by_name(name))
                .await?
            {
                Ok(current) => current,
                Err(e) if e.is_not_found() => {
                    debug!(group = name, "Group already deleted");
                    continue;
                }
                Err(e) => return Err(SyncError::transport("delete_group", name, e)),
            };

            info!(group = name, "Deleting group");
            match self.ctx.guarded(self.ctx.target().delete_group(&current)).await? {
                Ok(()) => stats.groups_deleted += 1,
                Err(e) if e.is_not_found() => debug!(group = name, "Group already deleted"),
                Err(e) => return Err(SyncError::transport("delete_group", name, e)),
            }
        }
        Ok(())
    }
}
