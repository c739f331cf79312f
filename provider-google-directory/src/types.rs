//! Directory API response types
//!
//! Data structures for deserializing Admin SDK Directory API v1 responses.
//! Only the fields the sync reads are modelled.

use serde::Deserialize;

/// One page of a list response.
pub(crate) trait Page {
    type Item;

    fn into_parts(self) -> (Vec<Self::Item>, Option<String>);
}

/// See: https://developers.google.com/admin-sdk/directory/reference/rest/v1/users
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct DirectoryUser {
    pub primary_email: String,

    #[serde(default)]
    pub name: UserName,

    #[serde(default)]
    pub suspended: bool,

    /// Present only on deleted users
    #[serde(default)]
    pub deletion_time: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct UserName {
    #[serde(default)]
    pub given_name: String,

    #[serde(default)]
    pub family_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct UsersListResponse {
    /// Omitted entirely when the query matches nothing
    #[serde(default)]
    pub users: Vec<DirectoryUser>,

    pub next_page_token: Option<String>,
}

impl Page for UsersListResponse {
    type Item = DirectoryUser;

    fn into_parts(self) -> (Vec<DirectoryUser>, Option<String>) {
        (self.users, self.next_page_token)
    }
}

/// See: https://developers.google.com/admin-sdk/directory/reference/rest/v1/groups
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct DirectoryGroup {
    pub id: String,
    pub email: String,

    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GroupsListResponse {
    #[serde(default)]
    pub groups: Vec<DirectoryGroup>,

    pub next_page_token: Option<String>,
}

impl Page for GroupsListResponse {
    type Item = DirectoryGroup;

    fn into_parts(self) -> (Vec<DirectoryGroup>, Option<String>) {
        (self.groups, self.next_page_token)
    }
}

/// See: https://developers.google.com/admin-sdk/directory/reference/rest/v1/members
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct DirectoryMember {
    /// Missing for `CUSTOMER` members
    #[serde(default)]
    pub email: Option<String>,

    /// `USER`, `GROUP` or `CUSTOMER`
    #[serde(rename = "type", default)]
    pub member_type: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct MembersListResponse {
    #[serde(default)]
    pub members: Vec<DirectoryMember>,

    pub next_page_token: Option<String>,
}

impl Page for MembersListResponse {
    type Item = DirectoryMember;

    fn into_parts(self) -> (Vec<DirectoryMember>, Option<String>) {
        (self.members, self.next_page_token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_users_page() {
        let page: UsersListResponse = serde_json::from_str(r#"{"kind":"admin#directory#users"}"#).unwrap();
        let (users, next) = page.into_parts();
        assert!(users.is_empty());
        assert!(next.is_none());
    }

    #[test]
    fn test_member_type_field() {
        let member: DirectoryMember =
            serde_json::from_str(r#"{"email":"team@x.com","type":"GROUP","status":"ACTIVE"}"#).unwrap();
        assert_eq!(member.member_type, "GROUP");

        let customer: DirectoryMember =
            serde_json::from_str(r#"{"id":"C01","type":"CUSTOMER"}"#).unwrap();
        assert!(customer.email.is_none());
    }
}
