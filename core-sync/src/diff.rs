//! # Diff Engine
//!
//! Pure classification of two snapshots into operation sets. No I/O.
//!
//! - Users are keyed by primary email (source) and username (target).
//! - Groups are keyed by name (source) and display name (target).
//! - Membership is diffed only for groups present on both sides. Groups that
//!   are about to be created get their full source membership at creation.
//!
//! Every key lands in exactly one bucket of its operation set. Add, update and
//! equal follow source order; delete follows target order.

use std::collections::{BTreeMap, HashMap, HashSet};

use bridge_traits::{SourceGroup, SourceUser, TargetGroup, TargetUser};
use serde::Serialize;

use crate::snapshot::{SourceSnapshot, TargetSnapshot};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UserOperations {
    /// Users to create, built from source attributes.
    pub add: Vec<TargetUser>,
    /// Target users with no source counterpart.
    pub delete: Vec<TargetUser>,
    /// Full replacement records carrying the source's current attributes.
    pub update: Vec<TargetUser>,
    pub equal: Vec<TargetUser>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GroupOperations {
    pub add: Vec<TargetGroup>,
    pub delete: Vec<TargetGroup>,
    pub equal: Vec<TargetGroup>,
}

/// Membership changes for one group that exists on both sides.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MembershipOperations {
    /// Source member emails the target group lacks. Apply re-probes each one
    /// before adding.
    pub add: Vec<String>,
    /// Target members to remove.
    pub delete: Vec<TargetUser>,
    /// Emails present on both sides.
    pub equal: Vec<String>,
}

impl MembershipOperations {
    pub fn is_empty(&self) -> bool {
        self.add.is_empty() && self.delete.is_empty()
    }
}

/// Membership operations keyed by group display name.
pub type GroupMembershipPlan = BTreeMap<String, MembershipOperations>;

/// Everything the apply pipeline needs for one full reconciliation run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncPlan {
    pub users: UserOperations,
    pub groups: GroupOperations,
    /// Only groups classified `equal`.
    pub memberships: GroupMembershipPlan,
    /// Source member emails of each group in `groups.add`.
    pub new_group_members: BTreeMap<String, Vec<String>>,
}

impl SyncPlan {
    pub fn compute(source: &SourceSnapshot, target: &TargetSnapshot) -> Self {
        let users = user_operations(&target.users, &source.users);
        let groups = group_operations(&target.groups, &source.groups);

        let memberships = groups
            .equal
            .iter()
            .map(|group| {
                let name = group.display_name.as_str();
                let ops = membership_operations(source.members_of(name), target.members_of(name));
                (name.to_string(), ops)
            })
            .collect();

        let new_group_members = groups
            .add
            .iter()
            .map(|group| {
                let name = group.display_name.as_str();
                let emails = source
                    .members_of(name)
                    .iter()
                    .map(|u| u.primary_email.clone())
                    .collect();
                (name.to_string(), emails)
            })
            .collect();

        Self {
            users,
            groups,
            memberships,
            new_group_members,
        }
    }

    /// True when applying this plan would change nothing.
    pub fn is_converged(&self) -> bool {
        self.users.add.is_empty()
            && self.users.delete.is_empty()
            && self.users.update.is_empty()
            && self.groups.add.is_empty()
            && self.groups.delete.is_empty()
            && self.memberships.values().all(MembershipOperations::is_empty)
    }

    pub fn members_to_remove(&self) -> usize {
        self.memberships.values().map(|ops| ops.delete.len()).sum()
    }

    pub fn members_to_add(&self) -> usize {
        let equal: usize = self.memberships.values().map(|ops| ops.add.len()).sum();
        let new: usize = self.new_group_members.values().map(Vec::len).sum();
        equal + new
    }
}

/// Attribute comparison: active flag first, then given name, then family
/// name. `active == suspended` means the two flags disagree.
fn user_differs(target: &TargetUser, source: &SourceUser) -> bool {
    target.active == source.suspended
        || target.given_name != source.given_name
        || target.family_name != source.family_name
}

pub fn user_operations(target: &[TargetUser], source: &[SourceUser]) -> UserOperations {
    let by_username: HashMap<&str, &TargetUser> =
        target.iter().map(|u| (u.username.as_str(), u)).collect();
    let source_emails: HashSet<&str> = source.iter().map(|u| u.primary_email.as_str()).collect();

    let mut ops = UserOperations::default();

    for user in source {
        match by_username.get(user.primary_email.as_str()) {
            None => ops.add.push(TargetUser::from_source(user)),
            Some(existing) if user_differs(existing, user) => {
                let mut replacement = TargetUser::from_source(user);
                replacement.id = existing.id.clone();
                ops.update.push(replacement);
            }
            Some(existing) => ops.equal.push((*existing).clone()),
        }
    }

    ops.delete = target
        .iter()
        .filter(|u| !source_emails.contains(u.username.as_str()))
        .cloned()
        .collect();

    ops
}

pub fn group_operations(target: &[TargetGroup], source: &[SourceGroup]) -> GroupOperations {
    let by_name: HashMap<&str, &TargetGroup> =
        target.iter().map(|g| (g.display_name.as_str(), g)).collect();
    let source_names: HashSet<&str> = source.iter().map(|g| g.name.as_str()).collect();

    let mut ops = GroupOperations::default();

    for group in source {
        match by_name.get(group.name.as_str()) {
            Some(existing) => ops.equal.push((*existing).clone()),
            None => ops.add.push(TargetGroup::new(group.name.clone())),
        }
    }

    ops.delete = target
        .iter()
        .filter(|g| !source_names.contains(g.display_name.as_str()))
        .cloned()
        .collect();

    ops
}

pub fn membership_operations(
    source_members: &[SourceUser],
    target_members: &[TargetUser],
) -> MembershipOperations {
    let target_usernames: HashSet<&str> =
        target_members.iter().map(|u| u.username.as_str()).collect();
    let source_emails: HashSet<&str> = source_members
        .iter()
        .map(|u| u.primary_email.as_str())
        .collect();

    let (equal, add): (Vec<String>, Vec<String>) = source_members
        .iter()
        .map(|u| u.primary_email.clone())
        .partition(|email| target_usernames.contains(email.as_str()));

    let delete = target_members
        .iter()
        .filter(|u| !source_emails.contains(u.username.as_str()))
        .cloned()
        .collect();

    MembershipOperations { add, delete, equal }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source_user(email: &str, suspended: bool) -> SourceUser {
        SourceUser::new(email, "Ann", "Lee", suspended)
    }

    fn target_user(email: &str, active: bool) -> TargetUser {
        TargetUser::new("Ann", "Lee", email, active).with_id(format!("id-{}", email))
    }

    fn emails(users: &[TargetUser]) -> Vec<&str> {
        users.iter().map(|u| u.username.as_str()).collect()
    }

    #[test]
    fn test_new_source_user_is_added() {
        let ops = user_operations(&[], &[source_user("a@x.com", false)]);

        assert_eq!(emails(&ops.add), vec!["a@x.com"]);
        assert!(ops.add[0].active);
        assert!(ops.add[0].id.is_none());
        assert!(ops.delete.is_empty() && ops.update.is_empty() && ops.equal.is_empty());
    }

    #[test]
    fn test_target_only_user_is_deleted() {
        let ops = user_operations(&[target_user("b@x.com", true)], &[]);
        assert_eq!(emails(&ops.delete), vec!["b@x.com"]);
        assert!(ops.add.is_empty());
    }

    #[test]
    fn test_suspended_source_user_is_updated_to_inactive() {
        let ops = user_operations(&[target_user("c@x.com", true)], &[source_user("c@x.com", true)]);

        assert_eq!(emails(&ops.update), vec!["c@x.com"]);
        assert!(!ops.update[0].active);
        assert_eq!(ops.update[0].id.as_deref(), Some("id-c@x.com"));
    }

    #[test]
    fn test_name_change_triggers_full_update() {
        let mut renamed = source_user("d@x.com", false);
        renamed.family_name = "Park".to_string();

        let ops = user_operations(&[target_user("d@x.com", true)], &[renamed]);

        assert_eq!(ops.update.len(), 1);
        assert_eq!(ops.update[0].family_name, "Park");
        assert_eq!(ops.update[0].given_name, "Ann");
    }

    #[test]
    fn test_matching_user_is_equal() {
        let ops = user_operations(&[target_user("e@x.com", true)], &[source_user("e@x.com", false)]);
        assert_eq!(emails(&ops.equal), vec!["e@x.com"]);
        assert!(ops.update.is_empty());
    }

    #[test]
    fn test_every_user_key_lands_in_one_bucket() {
        let target = vec![
            target_user("keep@x.com", true),
            target_user("stale@x.com", true),
            target_user("change@x.com", true),
        ];
        let source = vec![
            source_user("keep@x.com", false),
            source_user("change@x.com", true),
            source_user("new@x.com", false),
        ];

        let ops = user_operations(&target, &source);

        let mut all: Vec<&str> = emails(&ops.add);
        all.extend(emails(&ops.delete));
        all.extend(emails(&ops.update));
        all.extend(emails(&ops.equal));
        all.sort();
        assert_eq!(all, vec!["change@x.com", "keep@x.com", "new@x.com", "stale@x.com"]);
    }

    #[test]
    fn test_group_operations() {
        let target = vec![TargetGroup::new("eng").with_id("g1"), TargetGroup::new("old").with_id("g2")];
        let source = vec![
            SourceGroup::new("1", "eng", "eng@x.com"),
            SourceGroup::new("2", "ops", "ops@x.com"),
        ];

        let ops = group_operations(&target, &source);

        assert_eq!(ops.add, vec![TargetGroup::new("ops")]);
        assert_eq!(ops.equal, vec![TargetGroup::new("eng").with_id("g1")]);
        assert_eq!(ops.delete, vec![TargetGroup::new("old").with_id("g2")]);
    }

    #[test]
    fn test_membership_operations() {
        let source = vec![source_user("a@x.com", false), source_user("b@x.com", false)];
        let target = vec![target_user("b@x.com", true), target_user("c@x.com", true)];

        let ops = membership_operations(&source, &target);

        assert_eq!(ops.add, vec!["a@x.com".to_string()]);
        assert_eq!(ops.equal, vec!["b@x.com".to_string()]);
        assert_eq!(emails(&ops.delete), vec!["c@x.com"]);
    }

    #[test]
    fn test_plan_diffs_membership_only_for_equal_groups() {
        let mut source_members = BTreeMap::new();
        source_members.insert("eng".to_string(), vec![source_user("a@x.com", false)]);
        source_members.insert("ops".to_string(), vec![source_user("a@x.com", false)]);
        let source = SourceSnapshot::new(
            vec![source_user("a@x.com", false)],
            vec![
                SourceGroup::new("1", "eng", "eng@x.com"),
                SourceGroup::new("2", "ops", "ops@x.com"),
            ],
            source_members,
        );
        let target = TargetSnapshot::new(
            vec![target_user("a@x.com", true)],
            vec![TargetGroup::new("eng").with_id("g1")],
            BTreeMap::new(),
        );

        let plan = SyncPlan::compute(&source, &target);

        assert_eq!(plan.memberships.keys().collect::<Vec<_>>(), vec!["eng"]);
        assert_eq!(plan.memberships["eng"].add, vec!["a@x.com".to_string()]);
        assert_eq!(plan.new_group_members["ops"], vec!["a@x.com".to_string()]);
        assert_eq!(plan.members_to_add(), 2);
        assert!(!plan.is_converged());
    }

    #[test]
    fn test_identical_snapshots_are_converged() {
        let user = target_user("a@x.com", true);
        let mut target_members = BTreeMap::new();
        target_members.insert("eng".to_string(), vec![user.clone()]);
        let mut source_members = BTreeMap::new();
        source_members.insert("eng".to_string(), vec![source_user("a@x.com", false)]);

        let source = SourceSnapshot::new(
            vec![source_user("a@x.com", false)],
            vec![SourceGroup::new("1", "eng", "eng@x.com")],
            source_members,
        );
        let target = TargetSnapshot::new(
            vec![user],
            vec![TargetGroup::new("eng").with_id("g1")],
            target_members,
        );

        let plan = SyncPlan::compute(&source, &target);
        assert!(plan.is_converged());
        assert_eq!(plan, SyncPlan::compute(&source, &target));
    }
}
