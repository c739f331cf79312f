//! # Independent Passes
//!
//! Alternate sync mode: a user pass followed by a group pass, without a
//! precomputed diff.
//!
//! The user pass walks the source users matching a query, creating or
//! updating each in the target, and returns a [`UserIndex`] of every target
//! user it touched. The group pass reads that index: only indexed users are
//! added to or removed from groups.
//!
//! Group display names in this mode are the source group's email address.
//!
//! The user pass updates a record only when `target.active == source.suspended`.
//! Name changes alone do not trigger an update here.

use std::collections::{BTreeMap, HashSet};

use bridge_traits::{MemberKind, SourceGroup, SourceUser, TargetGroup, TargetUser};
use tracing::{debug, info, instrument, warn};

use crate::context::SyncContext;
use crate::phase::SyncStats;
use crate::{Result, SyncError};

/// Target users known to the current run, keyed by username.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserIndex {
    users: BTreeMap<String, TargetUser>,
}

impl UserIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, user: TargetUser) {
        self.users.insert(user.username.clone(), user);
    }

    pub fn get(&self, username: &str) -> Option<&TargetUser> {
        self.users.get(username)
    }

    pub fn contains(&self, username: &str) -> bool {
        self.users.contains_key(username)
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TargetUser> {
        self.users.values()
    }
}

impl FromIterator<TargetUser> for UserIndex {
    fn from_iter<I: IntoIterator<Item = TargetUser>>(iter: I) -> Self {
        let mut index = Self::new();
        for user in iter {
            index.insert(user);
        }
        index
    }
}

pub struct IndependentSync<'a> {
    ctx: &'a SyncContext,
}

impl<'a> IndependentSync<'a> {
    pub fn new(ctx: &'a SyncContext) -> Self {
        Self { ctx }
    }

    /// Create or update every source user matching `query`.
    #[instrument(skip(self, stats))]
    pub async fn sync_users(&self, query: &str, stats: &mut SyncStats) -> Result<UserIndex> {
        let ctx = self.ctx;

        let source_users = ctx
            .call("list_users", query, ctx.source().list_users(query))
            .await?;
        info!(count = source_users.len(), "Active source users retrieved");

        let mut index = UserIndex::new();
        for user in &source_users {
            let email = user.primary_email.as_str();
            if !ctx.filter().include_user(email) {
                debug!(email, "Ignoring user based on configuration");
                continue;
            }

            let synced = self.sync_user(user, stats).await?;
            index.insert(synced);
        }

        info!(count = index.len(), "User pass complete");
        Ok(index)
    }

    async fn sync_user(&self, user: &SourceUser, stats: &mut SyncStats) -> Result<TargetUser> {
        let ctx = self.ctx;
        let email = user.primary_email.as_str();

        match ctx.guarded(ctx.target().find_user_by_email(email)).await? {
            Ok(existing) if existing.active == user.suspended => {
                info!(email, id = ?existing.id, "Mismatch active/suspended, updating user");
                let mut replacement = TargetUser::from_source(user);
                replacement.id = existing.id;
                let updated = ctx
                    .call("update_user", email, ctx.target().update_user(&replacement))
                    .await?;
                stats.users_updated += 1;
                Ok(updated)
            }
            Ok(existing) => Ok(existing),
            Err(e) if e.is_not_found() => self.create_user(user, stats).await,
            Err(e) => Err(SyncError::transport("find_user_by_email", email, e)),
        }
    }

    async fn create_user(&self, user: &SourceUser, stats: &mut SyncStats) -> Result<TargetUser> {
        let ctx = self.ctx;
        let email = user.primary_email.as_str();

        info!(email, suspended = user.suspended, "Creating user");
        match ctx
            .guarded(ctx.target().create_user(&TargetUser::from_source(user)))
            .await?
        {
            Ok(created) => {
                stats.users_added += 1;
                Ok(created)
            }
            Err(e) if e.is_conflict() => {
                warn!(email, error = %e, "User already exists, re-reading it");
                stats.users_conflicted += 1;
                ctx.call("find_user_by_email", email, ctx.target().find_user_by_email(email))
                    .await
            }
            Err(e) => Err(SyncError::transport("create_user", email, e)),
        }
    }

    /// Create missing groups and align their membership with the source,
    /// restricted to the users in `index`.
    #[instrument(skip(self, index, stats), fields(indexed_users = index.len()))]
    pub async fn sync_groups(
        &self,
        query: &str,
        index: &UserIndex,
        stats: &mut SyncStats,
    ) -> Result<()> {
        let ctx = self.ctx;

        let groups = ctx
            .call("list_groups", query, ctx.source().list_groups(query))
            .await?;
        info!(count = groups.len(), "Source groups retrieved");

        for group in &groups {
            if !ctx.filter().include_group(&group.email) {
                debug!(group = %group.email, "Ignoring group based on configuration");
                continue;
            }
            self.sync_group(group, index, stats).await?;
        }

        Ok(())
    }

    async fn sync_group(
        &self,
        source: &SourceGroup,
        index: &UserIndex,
        stats: &mut SyncStats,
    ) -> Result<()> {
        let ctx = self.ctx;
        let name = source.email.as_str();

        let group = match ctx.guarded(ctx.target().find_group_by_name(name)).await? {
            Ok(found) => {
                debug!(group = name, "Found group");
                found
            }
            Err(e) if e.is_not_found() => {
                info!(group = name, "Creating group");
                let created = ctx
                    .call("create_group", name, ctx.target().create_group(&TargetGroup::new(name)))
                    .await?;
                stats.groups_added += 1;
                created
            }
            Err(e) => return Err(SyncError::transport("find_group_by_name", name, e)),
        };

        let members = ctx
            .call("list_group_members", name, ctx.source().list_group_members(source))
            .await?;
        info!(group = name, count = members.len(), "Source group members retrieved");

        let wanted: HashSet<&str> = members
            .iter()
            .filter(|m| m.kind != MemberKind::Group && index.contains(&m.email))
            .map(|m| m.email.as_str())
            .collect();

        for user in index.iter() {
            let email = user.username.as_str();
            let present = ctx
                .call("is_member", email, ctx.target().is_member(user, &group))
                .await?;

            match (wanted.contains(email), present) {
                (true, false) => {
                    info!(email, group = name, "Adding user to group");
                    ctx.call("add_member", email, ctx.target().add_member(user, &group))
                        .await?;
                    stats.members_added += 1;
                }
                (false, true) => {
                    info!(email, group = name, "Removing user from group");
                    ctx.call("remove_member", email, ctx.target().remove_member(user, &group))
                        .await?;
                    stats.members_removed += 1;
                }
                _ => {}
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_index_keyed_by_username() {
        let index: UserIndex = vec![
            TargetUser::new("Ann", "Lee", "a@x.com", true).with_id("u1"),
            TargetUser::new("Ann", "Park", "a@x.com", true).with_id("u2"),
            TargetUser::new("Bo", "Kim", "b@x.com", false).with_id("u3"),
        ]
        .into_iter()
        .collect();

        assert_eq!(index.len(), 2);
        assert_eq!(index.get("a@x.com").and_then(|u| u.id.as_deref()), Some("u2"));
        assert!(index.contains("b@x.com"));
        assert!(!index.contains("c@x.com"));
    }
}
