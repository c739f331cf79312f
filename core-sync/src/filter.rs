//! # Filter Policy
//!
//! Decides whether a user or group takes part in a sync run. Matching is
//! exact string equality on the email address; there are no patterns.
//!
//! - A user is excluded when its email is on the ignore list.
//! - A group is excluded when its email is on the ignore list, or when an
//!   include list is configured and the email is not on it. An empty include
//!   list means "everything not ignored".

use std::collections::HashSet;

#[derive(Debug, Clone, Default)]
pub struct FilterPolicy {
    ignore_users: HashSet<String>,
    ignore_groups: HashSet<String>,
    include_groups: HashSet<String>,
}

impl FilterPolicy {
    pub fn new<U, G, I>(ignore_users: U, ignore_groups: G, include_groups: I) -> Self
    where
        U: IntoIterator<Item = String>,
        G: IntoIterator<Item = String>,
        I: IntoIterator<Item = String>,
    {
        Self {
            ignore_users: ignore_users.into_iter().collect(),
            ignore_groups: ignore_groups.into_iter().collect(),
            include_groups: include_groups.into_iter().collect(),
        }
    }

    /// Policy that lets everything through.
    pub fn allow_all() -> Self {
        Self::default()
    }

    pub fn include_user(&self, email: &str) -> bool {
        !self.ignore_users.contains(email)
    }

    pub fn include_group(&self, email: &str) -> bool {
        if self.ignore_groups.contains(email) {
            return false;
        }
        self.include_groups.is_empty() || self.include_groups.contains(email)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_allow_all() {
        let policy = FilterPolicy::allow_all();
        assert!(policy.include_user("a@x.com"));
        assert!(policy.include_group("team@x.com"));
    }

    #[test]
    fn test_ignored_user_is_excluded() {
        let policy = FilterPolicy::new(strings(&["bot@x.com"]), vec![], vec![]);
        assert!(!policy.include_user("bot@x.com"));
        assert!(policy.include_user("a@x.com"));
    }

    #[test]
    fn test_matching_is_exact() {
        let policy = FilterPolicy::new(strings(&["bot@x.com"]), strings(&["admins@x.com"]), vec![]);
        assert!(policy.include_user("Bot@x.com"));
        assert!(policy.include_user("bot@x.co"));
        assert!(policy.include_group("admins@x.com.au"));
    }

    #[test]
    fn test_include_list_restricts_groups() {
        let policy = FilterPolicy::new(vec![], vec![], strings(&["aws-dev@x.com"]));
        assert!(policy.include_group("aws-dev@x.com"));
        assert!(!policy.include_group("marketing@x.com"));
    }

    #[test]
    fn test_ignore_wins_over_include() {
        let policy = FilterPolicy::new(
            vec![],
            strings(&["aws-dev@x.com"]),
            strings(&["aws-dev@x.com", "aws-ops@x.com"]),
        );
        assert!(!policy.include_group("aws-dev@x.com"));
        assert!(policy.include_group("aws-ops@x.com"));
    }
}
