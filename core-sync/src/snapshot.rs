//! # Snapshot Collector
//!
//! Pulls the current state of both directories into in-memory snapshots that
//! the diff engine compares.
//!
//! ## Source Side
//!
//! Groups matching the caller's query are fetched and filtered. For every
//! retained group the members are listed and each member address is resolved
//! to a full user record with an `email:<address>` query. Addresses that are
//! groups themselves, ignored users, and addresses that resolve to nothing are
//! skipped. Resolved users are deduplicated by email.
//!
//! ## Target Side
//!
//! All users and groups are listed. The target has no bulk membership API, so
//! membership is derived by probing every (group, user) pair with
//! `is_member`: O(groups x users) calls. Probes can run with bounded
//! concurrency; results are consumed in input order so the relation is the
//! same as a sequential pass.
//!
//! Any fetch failure is fatal. There is no partial-snapshot mode.

use std::collections::{BTreeMap, HashMap, HashSet};

use bridge_traits::{MemberKind, SourceGroup, SourceUser, TargetGroup, TargetUser};
use futures::stream::{self, StreamExt, TryStreamExt};
use tracing::{debug, info, instrument, warn};

use crate::context::SyncContext;
use crate::{Result, SyncError};

/// Point-in-time view of the source directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceSnapshot {
    /// Unique by primary email.
    pub users: Vec<SourceUser>,
    /// Unique by name.
    pub groups: Vec<SourceGroup>,
    /// Group name to its resolved members.
    pub members: BTreeMap<String, Vec<SourceUser>>,
}

impl SourceSnapshot {
    /// Build a snapshot, collapsing duplicate keys (first occurrence wins).
    pub fn new(
        users: Vec<SourceUser>,
        groups: Vec<SourceGroup>,
        members: BTreeMap<String, Vec<SourceUser>>,
    ) -> Self {
        let members = members
            .into_iter()
            .map(|(group, users)| (group, unique_by(users, |u| u.primary_email.clone())))
            .collect();

        Self {
            users: unique_by(users, |u| u.primary_email.clone()),
            groups: unique_by(groups, |g| g.name.clone()),
            members,
        }
    }

    pub fn members_of(&self, group_name: &str) -> &[SourceUser] {
        self.members
            .get(group_name)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

/// Point-in-time view of the target store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TargetSnapshot {
    /// Unique by username.
    pub users: Vec<TargetUser>,
    /// Unique by display name.
    pub groups: Vec<TargetGroup>,
    /// Group display name to the users the membership probe found in it.
    pub members: BTreeMap<String, Vec<TargetUser>>,
}

impl TargetSnapshot {
    /// Build a snapshot, collapsing duplicate keys (first occurrence wins).
    pub fn new(
        users: Vec<TargetUser>,
        groups: Vec<TargetGroup>,
        members: BTreeMap<String, Vec<TargetUser>>,
    ) -> Self {
        let members = members
            .into_iter()
            .map(|(group, users)| (group, unique_by(users, |u| u.username.clone())))
            .collect();

        Self {
            users: unique_by(users, |u| u.username.clone()),
            groups: unique_by(groups, |g| g.display_name.clone()),
            members,
        }
    }

    pub fn members_of(&self, display_name: &str) -> &[TargetUser] {
        self.members
            .get(display_name)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

fn unique_by<T, F>(items: Vec<T>, key: F) -> Vec<T>
where
    F: Fn(&T) -> String,
{
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| {
            let k = key(item);
            if seen.insert(k.clone()) {
                true
            } else {
                warn!(key = %k, "Duplicate key in snapshot, keeping first occurrence");
                false
            }
        })
        .collect()
}

/// Builds both snapshots through the collaborators in a [`SyncContext`].
pub struct SnapshotCollector<'a> {
    ctx: &'a SyncContext,
}

impl<'a> SnapshotCollector<'a> {
    pub fn new(ctx: &'a SyncContext) -> Self {
        Self { ctx }
    }

    /// Delete target users whose source record is marked deleted.
    ///
    /// Idempotent: a user already missing from the target is skipped.
    /// Returns the number of target users removed.
    #[instrument(skip(self))]
    pub async fn purge_deleted_users(&self) -> Result<u64> {
        let ctx = self.ctx;
        debug!("Listing deleted source users");
        let deleted = ctx
            .call(
                "list_deleted_users",
                "*",
                ctx.source().list_deleted_users(),
            )
            .await?;

        let mut purged = 0;
        for user in deleted {
            let email = user.primary_email.as_str();
            if !ctx.filter().include_user(email) {
                debug!(email, "Ignoring deleted user based on configuration");
                continue;
            }

            let found = match ctx.guarded(ctx.target().find_user_by_email(email)).await? {
                Ok(found) => found,
                Err(e) if e.is_not_found() => {
                    debug!(email, "User already deleted");
                    continue;
                }
                Err(e) => return Err(SyncError::transport("find_user_by_email", email, e)),
            };

            info!(email, id = ?found.id, "Deleting user removed from source");
            match ctx.guarded(ctx.target().delete_user(&found)).await? {
                Ok(()) => purged += 1,
                Err(e) if e.is_not_found() => debug!(email, "User already deleted"),
                Err(e) => return Err(SyncError::transport("delete_user", email, e)),
            }
        }

        info!(count = purged, "Deleted source users purged from target");
        Ok(purged)
    }

    /// Collect the source snapshot.
    ///
    /// `group_query` selects groups; a non-empty `user_query` also seeds users
    /// that are not members of any synced group.
    #[instrument(skip(self))]
    pub async fn collect_source(&self, group_query: &str, user_query: &str) -> Result<SourceSnapshot> {
        let ctx = self.ctx;

        let fetched = ctx
            .call("list_groups", group_query, ctx.source().list_groups(group_query))
            .await?;
        info!(count = fetched.len(), "Source groups retrieved");

        let groups: Vec<SourceGroup> = fetched
            .into_iter()
            .filter(|g| {
                let keep = ctx.filter().include_group(&g.email);
                if !keep {
                    debug!(group = %g.email, "Ignoring group based on configuration");
                }
                keep
            })
            .collect();
        let groups = unique_by(groups, |g| g.name.clone());

        // email -> resolved record, or None when the directory has no such user
        let mut resolved: HashMap<String, Option<SourceUser>> = HashMap::new();
        let mut users: Vec<SourceUser> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        let mut members = BTreeMap::new();

        for group in &groups {
            let refs = ctx
                .call(
                    "list_group_members",
                    &group.email,
                    ctx.source().list_group_members(group),
                )
                .await?;
            debug!(group = %group.name, count = refs.len(), "Source group members retrieved");

            let mut group_users = Vec::new();
            for member in refs {
                if member.kind == MemberKind::Group {
                    debug!(member = %member.email, "Skipping nested group address");
                    continue;
                }
                if !ctx.filter().include_user(&member.email) {
                    debug!(member = %member.email, "Ignoring user based on configuration");
                    continue;
                }

                let user = match resolved.get(&member.email) {
                    Some(cached) => cached.clone(),
                    None => {
                        let lookup = self.resolve_member(&member.email).await?;
                        resolved.insert(member.email.clone(), lookup.clone());
                        lookup
                    }
                };

                let Some(user) = user else {
                    debug!(member = %member.email, "Ignoring unknown user");
                    continue;
                };

                if seen.insert(user.primary_email.clone()) {
                    users.push(user.clone());
                }
                group_users.push(user);
            }

            info!(group = %group.name, count = group_users.len(), "Group members resolved");
            members.insert(group.name.clone(), group_users);
        }

        if !user_query.is_empty() {
            let extra = ctx
                .call("list_users", user_query, ctx.source().list_users(user_query))
                .await?;
            for user in extra {
                if ctx.filter().include_user(&user.primary_email)
                    && seen.insert(user.primary_email.clone())
                {
                    users.push(user);
                }
            }
        }

        info!(users = users.len(), groups = groups.len(), "Source snapshot collected");
        Ok(SourceSnapshot::new(users, groups, members))
    }

    async fn resolve_member(&self, email: &str) -> Result<Option<SourceUser>> {
        let ctx = self.ctx;
        let query = format!("email:{}", email);
        let mut found = ctx
            .call("list_users", email, ctx.source().list_users(&query))
            .await?;

        if found.is_empty() {
            return Ok(None);
        }
        Ok(Some(found.swap_remove(0)))
    }

    /// Collect the target snapshot, including the probed membership relation.
    #[instrument(skip(self))]
    pub async fn collect_target(&self) -> Result<TargetSnapshot> {
        let ctx = self.ctx;

        let groups = ctx
            .call("list_groups", "*", ctx.target().list_groups())
            .await?;
        info!(count = groups.len(), "Target groups retrieved");

        let users: Vec<TargetUser> = ctx
            .call("list_users", "*", ctx.target().list_users())
            .await?
            .into_iter()
            .filter(|u| ctx.filter().include_user(&u.username))
            .collect();
        info!(count = users.len(), "Target users retrieved");

        let groups = unique_by(groups, |g| g.display_name.clone());
        let users = unique_by(users, |u| u.username.clone());

        let mut members = BTreeMap::new();
        for group in &groups {
            let found = self.probe_members(group, &users).await?;
            debug!(group = %group.display_name, count = found.len(), "Target group members probed");
            members.insert(group.display_name.clone(), found);
        }

        info!(
            users = users.len(),
            groups = groups.len(),
            probes = users.len() * groups.len(),
            "Target snapshot collected"
        );
        Ok(TargetSnapshot::new(users, groups, members))
    }

    async fn probe_members(
        &self,
        group: &TargetGroup,
        users: &[TargetUser],
    ) -> Result<Vec<TargetUser>> {
        let ctx = self.ctx;

        let probes: Vec<(&TargetUser, bool)> = stream::iter(users)
            .map(|user| async move {
                let is_member = ctx
                    .call(
                        "is_member",
                        &user.username,
                        ctx.target().is_member(user, group),
                    )
                    .await?;
                Ok::<_, SyncError>((user, is_member))
            })
            .buffered(ctx.probe_concurrency())
            .try_collect()
            .await?;

        Ok(probes
            .into_iter()
            .filter(|(_, is_member)| *is_member)
            .map(|(user, _)| user.clone())
            .collect())
    }
}
