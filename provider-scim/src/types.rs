//! SCIM 2.0 wire types (RFC 7643 / RFC 7644)

use bridge_traits::{TargetGroup, TargetUser};
use serde::{Deserialize, Serialize};

pub(crate) const USER_SCHEMA: &str = "urn:ietf:params:scim:schemas:core:2.0:User";
pub(crate) const GROUP_SCHEMA: &str = "urn:ietf:params:scim:schemas:core:2.0:Group";
pub(crate) const PATCH_OP_SCHEMA: &str = "urn:ietf:params:scim:api:messages:2.0:PatchOp";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ScimUser {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default)]
    pub schemas: Vec<String>,

    pub user_name: String,

    #[serde(default)]
    pub name: ScimName,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    #[serde(default)]
    pub emails: Vec<ScimEmail>,

    #[serde(default)]
    pub active: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ScimName {
    #[serde(default)]
    pub given_name: String,

    #[serde(default)]
    pub family_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct ScimEmail {
    pub value: String,

    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    #[serde(default)]
    pub primary: bool,
}

impl From<&TargetUser> for ScimUser {
    fn from(user: &TargetUser) -> Self {
        Self {
            id: user.id.clone(),
            schemas: vec![USER_SCHEMA.to_string()],
            user_name: user.username.clone(),
            name: ScimName {
                given_name: user.given_name.clone(),
                family_name: user.family_name.clone(),
            },
            display_name: Some(format!("{} {}", user.given_name, user.family_name)),
            emails: vec![ScimEmail {
                value: user.email.clone(),
                kind: Some("work".to_string()),
                primary: true,
            }],
            active: user.active,
        }
    }
}

impl From<ScimUser> for TargetUser {
    fn from(user: ScimUser) -> Self {
        let primary = user
            .emails
            .iter()
            .position(|e| e.primary)
            .unwrap_or(0);
        let email = user
            .emails
            .into_iter()
            .nth(primary)
            .map(|e| e.value)
            .unwrap_or_else(|| user.user_name.clone());

        Self {
            id: user.id,
            username: user.user_name,
            given_name: user.name.given_name,
            family_name: user.name.family_name,
            email,
            active: user.active,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ScimGroup {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default)]
    pub schemas: Vec<String>,

    pub display_name: String,

    /// Always sent empty on create; membership is patched separately.
    #[serde(default)]
    pub members: Vec<ScimMember>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct ScimMember {
    pub value: String,
}

impl From<&TargetGroup> for ScimGroup {
    fn from(group: &TargetGroup) -> Self {
        Self {
            id: group.id.clone(),
            schemas: vec![GROUP_SCHEMA.to_string()],
            display_name: group.display_name.clone(),
            members: Vec::new(),
        }
    }
}

impl From<ScimGroup> for TargetGroup {
    fn from(group: ScimGroup) -> Self {
        Self {
            id: group.id,
            display_name: group.display_name,
        }
    }
}

/// RFC 7644 Section 3.4.2
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", bound(deserialize = "T: Deserialize<'de>"))]
pub(crate) struct ListResponse<T> {
    #[serde(default)]
    pub total_results: u64,

    #[serde(default, rename = "Resources")]
    pub resources: Vec<T>,
}

#[derive(Debug, Serialize)]
pub(crate) struct PatchRequest {
    pub schemas: Vec<String>,

    #[serde(rename = "Operations")]
    pub operations: Vec<PatchOperation>,
}

#[derive(Debug, Serialize)]
pub(crate) struct PatchOperation {
    pub op: &'static str,
    pub path: &'static str,
    pub value: Vec<ScimMember>,
}

impl PatchRequest {
    /// Single `add` or `remove` on the group's `members` attribute.
    pub fn members(op: &'static str, user_id: &str) -> Self {
        Self {
            schemas: vec![PATCH_OP_SCHEMA.to_string()],
            operations: vec![PatchOperation {
                op,
                path: "members",
                value: vec![ScimMember {
                    value: user_id.to_string(),
                }],
            }],
        }
    }
}

/// RFC 7644 Section 3.12 error body
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    pub detail: Option<String>,
}
