//! Directory Capabilities
//!
//! The two collaborators the reconciliation engine talks to:
//!
//! - [`SourceDirectory`]: the upstream identity provider, read-only, treated
//!   as ground truth.
//! - [`TargetStore`]: the downstream identity store that is conformed to the
//!   source.
//!
//! Both sides expose their own record shapes ([`SourceUser`] / [`TargetUser`],
//! [`SourceGroup`] / [`TargetGroup`]). Users are keyed by primary email, which
//! is the target's `username`. Groups are keyed by display name.
//!
//! The target exposes no bulk membership listing, only a per-pair
//! [`TargetStore::is_member`] probe. Deriving target membership therefore costs
//! one call per (group, user) pair.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A user as reported by the source directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceUser {
    pub primary_email: String,
    pub given_name: String,
    pub family_name: String,
    pub suspended: bool,
    /// Set on records returned by [`SourceDirectory::list_deleted_users`].
    #[serde(default)]
    pub deleted: bool,
}

impl SourceUser {
    pub fn new(
        primary_email: impl Into<String>,
        given_name: impl Into<String>,
        family_name: impl Into<String>,
        suspended: bool,
    ) -> Self {
        Self {
            primary_email: primary_email.into(),
            given_name: given_name.into(),
            family_name: family_name.into(),
            suspended,
            deleted: false,
        }
    }
}

/// A group as reported by the source directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceGroup {
    pub id: String,
    pub name: String,
    pub email: String,
}

impl SourceGroup {
    pub fn new(id: impl Into<String>, name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            email: email.into(),
        }
    }
}

/// What a group member address points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberKind {
    User,
    Group,
    Other,
}

/// A member entry of a source group, not yet resolved to a user record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberRef {
    pub email: String,
    pub kind: MemberKind,
}

impl MemberRef {
    pub fn user(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            kind: MemberKind::User,
        }
    }

    pub fn group(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            kind: MemberKind::Group,
        }
    }
}

/// A user record in the target store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetUser {
    /// Target-assigned identifier; `None` until the user has been created.
    pub id: Option<String>,
    /// Key of the record; always the source primary email.
    pub username: String,
    pub given_name: String,
    pub family_name: String,
    pub email: String,
    pub active: bool,
}

impl TargetUser {
    /// Build a not-yet-created target user from its attributes.
    pub fn new(
        given_name: impl Into<String>,
        family_name: impl Into<String>,
        email: impl Into<String>,
        active: bool,
    ) -> Self {
        let email = email.into();
        Self {
            id: None,
            username: email.clone(),
            given_name: given_name.into(),
            family_name: family_name.into(),
            email,
            active,
        }
    }

    /// Target record carrying the source's current attributes.
    pub fn from_source(user: &SourceUser) -> Self {
        Self::new(
            user.given_name.clone(),
            user.family_name.clone(),
            user.primary_email.clone(),
            !user.suspended,
        )
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }
}

/// A group record in the target store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetGroup {
    /// Target-assigned identifier; opaque and only meaningful target-side.
    pub id: Option<String>,
    pub display_name: String,
}

impl TargetGroup {
    pub fn new(display_name: impl Into<String>) -> Self {
        Self {
            id: None,
            display_name: display_name.into(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }
}

/// Read-only access to the upstream identity provider.
///
/// Implementations handle pagination internally and return complete lists.
/// `query` is passed through verbatim in the provider's own search syntax;
/// an empty query means "everything".
#[async_trait]
pub trait SourceDirectory: Send + Sync {
    /// All non-deleted users matching `query`.
    async fn list_users(&self, query: &str) -> Result<Vec<SourceUser>>;

    /// Users the directory reports as deleted.
    async fn list_deleted_users(&self) -> Result<Vec<SourceUser>>;

    /// All groups matching `query`.
    async fn list_groups(&self, query: &str) -> Result<Vec<SourceGroup>>;

    /// Direct and derived members of `group`.
    async fn list_group_members(&self, group: &SourceGroup) -> Result<Vec<MemberRef>>;
}

/// Read-write access to the downstream identity store.
///
/// Lookups that find nothing fail with `BridgeError::NotFound`; creates that
/// collide with an existing record fail with `BridgeError::Conflict`.
#[async_trait]
pub trait TargetStore: Send + Sync {
    async fn find_user_by_email(&self, email: &str) -> Result<TargetUser>;

    async fn create_user(&self, user: &TargetUser) -> Result<TargetUser>;

    /// Replace the whole record identified by `user.id`.
    async fn update_user(&self, user: &TargetUser) -> Result<TargetUser>;

    async fn delete_user(&self, user: &TargetUser) -> Result<()>;

    async fn list_users(&self) -> Result<Vec<TargetUser>>;

    async fn find_group_by_name(&self, name: &str) -> Result<TargetGroup>;

    async fn create_group(&self, group: &TargetGroup) -> Result<TargetGroup>;

    async fn delete_group(&self, group: &TargetGroup) -> Result<()>;

    async fn list_groups(&self) -> Result<Vec<TargetGroup>>;

    async fn is_member(&self, user: &TargetUser, group: &TargetGroup) -> Result<bool>;

    async fn add_member(&self, user: &TargetUser, group: &TargetGroup) -> Result<()>;

    async fn remove_member(&self, user: &TargetUser, group: &TargetGroup) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_user_from_source_inverts_suspension() {
        let source = SourceUser::new("c@x.com", "Cam", "Diaz", true);
        let target = TargetUser::from_source(&source);

        assert_eq!(target.username, "c@x.com");
        assert_eq!(target.email, "c@x.com");
        assert!(!target.active);
        assert_eq!(target.id, None);
    }

    #[test]
    fn test_member_ref_constructors() {
        assert_eq!(MemberRef::user("a@x.com").kind, MemberKind::User);
        assert_eq!(MemberRef::group("team@x.com").kind, MemberKind::Group);
    }

    #[test]
    fn test_source_user_deleted_defaults_to_false() {
        let user: SourceUser = serde_json::from_str(
            r#"{"primary_email":"a@x.com","given_name":"Ann","family_name":"Lee","suspended":false}"#,
        )
        .unwrap();
        assert!(!user.deleted);
    }
}
