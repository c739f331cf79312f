//! Directory API connector implementation
//!
//! Implements the `SourceDirectory` trait for the Admin SDK Directory API v1.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bridge_traits::{
    HttpClient, HttpRequest, MemberKind, MemberRef, RetryPolicy, SourceDirectory, SourceGroup,
    SourceUser,
};
use serde::de::DeserializeOwned;
use tracing::{debug, info, instrument};

use crate::error::GoogleDirectoryError;
use crate::types::{
    DirectoryGroup, DirectoryMember, DirectoryUser, GroupsListResponse, MembersListResponse, Page,
    UsersListResponse,
};

/// Directory API base URL
pub const DIRECTORY_API_BASE: &str = "https://admin.googleapis.com/admin/directory/v1";

/// Maximum results per page for users (API limit)
const USERS_PAGE_SIZE: u32 = 500;

/// Maximum results per page for groups and members (API limit)
const GROUPS_PAGE_SIZE: u32 = 200;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Directory API connector
///
/// # Example
///
/// ```ignore
/// use provider_google_directory::GoogleDirectoryConnector;
/// use bridge_traits::SourceDirectory;
///
/// let directory = GoogleDirectoryConnector::new(http_client, access_token, "my_customer");
/// let groups = directory.list_groups("email:aws-*").await?;
/// ```
pub struct GoogleDirectoryConnector {
    http_client: Arc<dyn HttpClient>,
    access_token: String,
    customer_id: String,
    base_url: String,
    retry_policy: RetryPolicy,
}

impl GoogleDirectoryConnector {
    /// # Arguments
    ///
    /// * `http_client` - HTTP client implementation
    /// * `access_token` - OAuth 2.0 token with the directory read-only scopes
    /// * `customer_id` - `my_customer` or an explicit customer id
    pub fn new(
        http_client: Arc<dyn HttpClient>,
        access_token: impl Into<String>,
        customer_id: impl Into<String>,
    ) -> Self {
        Self {
            http_client,
            access_token: access_token.into(),
            customer_id: customer_id.into(),
            base_url: DIRECTORY_API_BASE.to_string(),
            retry_policy: RetryPolicy::default(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    fn url(&self, path: &str, params: &[(&str, String)]) -> String {
        let query = params
            .iter()
            .map(|(key, value)| format!("{}={}", key, urlencoding::encode(value)))
            .collect::<Vec<_>>()
            .join("&");
        format!("{}{}?{}", self.base_url, path, query)
    }

    async fn get_page<P>(&self, url: String, resource: &'static str, key: &str) -> Result<P, GoogleDirectoryError>
    where
        P: Page + DeserializeOwned,
    {
        let request = HttpRequest::get(url)
            .bearer_token(self.access_token.as_str())
            .header("Accept", "application/json")
            .timeout(REQUEST_TIMEOUT);

        let response = self
            .http_client
            .execute_with_retry(request, self.retry_policy.clone())
            .await?;

        if !response.is_success() {
            return Err(GoogleDirectoryError::from_status(
                response.status,
                response.text_lossy(),
                resource,
                key,
            ));
        }

        serde_json::from_slice(&response.body).map_err(|e| {
            GoogleDirectoryError::ParseError(format!("Failed to parse {} list: {}", resource, e))
        })
    }

    /// Follow `nextPageToken` until the listing is exhausted.
    async fn list_all<P>(
        &self,
        path: &str,
        params: Vec<(&str, String)>,
        resource: &'static str,
        key: &str,
    ) -> Result<Vec<P::Item>, GoogleDirectoryError>
    where
        P: Page + DeserializeOwned,
    {
        let mut items = Vec::new();
        let mut page_token: Option<String> = None;
        let mut page_count = 0;

        loop {
            let mut page_params = params.clone();
            if let Some(token) = &page_token {
                page_params.push(("pageToken", token.clone()));
            }

            page_count += 1;
            debug!(resource, page = page_count, "Fetching directory page");
            let page: P = self.get_page(self.url(path, &page_params), resource, key).await?;
            let (mut batch, next) = page.into_parts();
            items.append(&mut batch);

            match next {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        Ok(items)
    }

    async fn fetch_users(&self, query: &str, deleted: bool) -> Result<Vec<SourceUser>, GoogleDirectoryError> {
        let mut params = vec![
            ("customer", self.customer_id.clone()),
            ("maxResults", USERS_PAGE_SIZE.to_string()),
        ];
        if !query.is_empty() {
            params.push(("query", query.to_string()));
        }
        if deleted {
            params.push(("showDeleted", "true".to_string()));
        }

        let users = self
            .list_all::<UsersListResponse>("/users", params, "user", query)
            .await?;
        Ok(users.into_iter().map(convert_user).collect())
    }
}

fn convert_user(user: DirectoryUser) -> SourceUser {
    let mut converted = SourceUser::new(
        user.primary_email,
        user.name.given_name,
        user.name.family_name,
        user.suspended,
    );
    converted.deleted = user.deletion_time.is_some();
    converted
}

fn convert_group(group: DirectoryGroup) -> SourceGroup {
    SourceGroup::new(group.id, group.name, group.email)
}

/// `CUSTOMER` members carry no address and cannot be resolved to a user.
fn convert_member(member: DirectoryMember) -> Option<MemberRef> {
    let email = member.email?;
    let kind = match member.member_type.as_str() {
        "USER" => MemberKind::User,
        "GROUP" => MemberKind::Group,
        _ => MemberKind::Other,
    };
    Some(MemberRef { email, kind })
}

#[async_trait]
impl SourceDirectory for GoogleDirectoryConnector {
    #[instrument(skip(self))]
    async fn list_users(&self, query: &str) -> bridge_traits::Result<Vec<SourceUser>> {
        let users = self.fetch_users(query, false).await?;
        debug!(count = users.len(), "Listed directory users");
        Ok(users)
    }

    #[instrument(skip(self))]
    async fn list_deleted_users(&self) -> bridge_traits::Result<Vec<SourceUser>> {
        let users: Vec<SourceUser> = self
            .fetch_users("", true)
            .await?
            .into_iter()
            .map(|mut u| {
                u.deleted = true;
                u
            })
            .collect();
        info!(count = users.len(), "Listed deleted directory users");
        Ok(users)
    }

    #[instrument(skip(self))]
    async fn list_groups(&self, query: &str) -> bridge_traits::Result<Vec<SourceGroup>> {
        let mut params = vec![
            ("customer", self.customer_id.clone()),
            ("maxResults", GROUPS_PAGE_SIZE.to_string()),
        ];
        if !query.is_empty() {
            params.push(("query", query.to_string()));
        }

        let groups: Vec<SourceGroup> = self
            .list_all::<GroupsListResponse>("/groups", params, "group", query)
            .await?
            .into_iter()
            .map(convert_group)
            .collect();
        info!(count = groups.len(), "Listed directory groups");
        Ok(groups)
    }

    #[instrument(skip(self), fields(group = %group.email))]
    async fn list_group_members(&self, group: &SourceGroup) -> bridge_traits::Result<Vec<MemberRef>> {
        let path = format!("/groups/{}/members", urlencoding::encode(&group.id));
        let params = vec![
            ("includeDerivedMembership", "true".to_string()),
            ("maxResults", GROUPS_PAGE_SIZE.to_string()),
        ];

        let members: Vec<MemberRef> = self
            .list_all::<MembersListResponse>(&path, params, "group", &group.email)
            .await?
            .into_iter()
            .filter_map(convert_member)
            .collect();
        debug!(count = members.len(), "Listed group members");
        Ok(members)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::{BridgeError, HttpResponse};
    use bytes::Bytes;
    use mockall::mock;
    use mockall::predicate::function;
    use std::collections::HashMap;

    mock! {
        HttpClient {}

        #[async_trait]
        impl HttpClient for HttpClient {
            async fn execute(&self, request: HttpRequest) -> bridge_traits::Result<HttpResponse>;
            async fn execute_with_retry(
                &self,
                request: HttpRequest,
                policy: RetryPolicy,
            ) -> bridge_traits::Result<HttpResponse>;
        }
    }

    fn json(status: u16, body: &str) -> bridge_traits::Result<HttpResponse> {
        Ok(HttpResponse {
            status,
            headers: HashMap::new(),
            body: Bytes::from(body.to_string()),
        })
    }

    fn connector(mock: MockHttpClient) -> GoogleDirectoryConnector {
        GoogleDirectoryConnector::new(Arc::new(mock), "test_token", "my_customer")
    }

    #[core_async::test]
    async fn test_list_users_follows_pagination() {
        let mut mock_http = MockHttpClient::new();

        mock_http
            .expect_execute_with_retry()
            .with(
                function(|req: &HttpRequest| !req.url.contains("pageToken")),
                mockall::predicate::always(),
            )
            .times(1)
            .returning(|req, _| {
                assert_eq!(
                    req.headers.get("Authorization"),
                    Some(&"Bearer test_token".to_string())
                );
                assert!(req.url.contains("customer=my_customer"));
                assert!(req.url.contains("query=email%3Aa%40x.com"));
                json(
                    200,
                    r#"{
                        "users": [
                            {"primaryEmail": "a@x.com", "name": {"givenName": "Ann", "familyName": "Lee"}, "suspended": false}
                        ],
                        "nextPageToken": "page-2"
                    }"#,
                )
            });
        mock_http
            .expect_execute_with_retry()
            .with(
                function(|req: &HttpRequest| req.url.contains("pageToken=page-2")),
                mockall::predicate::always(),
            )
            .times(1)
            .returning(|_, _| {
                json(
                    200,
                    r#"{"users": [{"primaryEmail": "b@x.com", "name": {"givenName": "Bo", "familyName": "Kim"}, "suspended": true}]}"#,
                )
            });

        let users = connector(mock_http).list_users("email:a@x.com").await.unwrap();

        assert_eq!(users.len(), 2);
        assert_eq!(users[0].primary_email, "a@x.com");
        assert_eq!(users[0].given_name, "Ann");
        assert!(users[1].suspended);
        assert!(!users[1].deleted);
    }

    #[core_async::test]
    async fn test_empty_query_is_not_sent() {
        let mut mock_http = MockHttpClient::new();
        mock_http
            .expect_execute_with_retry()
            .times(1)
            .returning(|req, _| {
                assert!(!req.url.contains("query="));
                json(200, r#"{}"#)
            });

        let users = connector(mock_http).list_users("").await.unwrap();
        assert!(users.is_empty());
    }

    #[core_async::test]
    async fn test_list_deleted_users() {
        let mut mock_http = MockHttpClient::new();
        mock_http
            .expect_execute_with_retry()
            .times(1)
            .returning(|req, _| {
                assert!(req.url.contains("showDeleted=true"));
                json(
                    200,
                    r#"{"users": [{"primaryEmail": "gone@x.com", "deletionTime": "2024-01-01T00:00:00.000Z"}]}"#,
                )
            });

        let users = connector(mock_http).list_deleted_users().await.unwrap();
        assert_eq!(users.len(), 1);
        assert!(users[0].deleted);
        assert_eq!(users[0].given_name, "");
    }

    #[core_async::test]
    async fn test_list_groups() {
        let mut mock_http = MockHttpClient::new();
        mock_http
            .expect_execute_with_retry()
            .times(1)
            .returning(|req, _| {
                assert!(req.url.starts_with(&format!("{}/groups?", DIRECTORY_API_BASE)));
                json(
                    200,
                    r#"{"groups": [{"id": "g1", "email": "aws-dev@x.com", "name": "AWS Dev"}]}"#,
                )
            });

        let groups = connector(mock_http).list_groups("email:aws-*").await.unwrap();
        assert_eq!(groups, vec![SourceGroup::new("g1", "AWS Dev", "aws-dev@x.com")]);
    }

    #[core_async::test]
    async fn test_list_group_members_maps_kinds() {
        let mut mock_http = MockHttpClient::new();
        mock_http
            .expect_execute_with_retry()
            .times(1)
            .returning(|req, _| {
                assert!(req.url.contains("/groups/g1/members?"));
                assert!(req.url.contains("includeDerivedMembership=true"));
                json(
                    200,
                    r#"{"members": [
                        {"email": "a@x.com", "type": "USER"},
                        {"email": "nested@x.com", "type": "GROUP"},
                        {"id": "C01", "type": "CUSTOMER"}
                    ]}"#,
                )
            });

        let group = SourceGroup::new("g1", "AWS Dev", "aws-dev@x.com");
        let members = connector(mock_http).list_group_members(&group).await.unwrap();

        assert_eq!(members, vec![MemberRef::user("a@x.com"), MemberRef::group("nested@x.com")]);
    }

    #[core_async::test]
    async fn test_missing_group_is_not_found() {
        let mut mock_http = MockHttpClient::new();
        mock_http
            .expect_execute_with_retry()
            .times(1)
            .returning(|_, _| json(404, r#"{"error": {"message": "Resource Not Found: groupKey"}}"#));

        let group = SourceGroup::new("g9", "Gone", "gone@x.com");
        let err = connector(mock_http)
            .list_group_members(&group)
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[core_async::test]
    async fn test_server_error_is_http_error() {
        let mut mock_http = MockHttpClient::new();
        mock_http
            .expect_execute_with_retry()
            .times(1)
            .returning(|_, _| json(503, "unavailable"));

        let err = connector(mock_http).list_groups("").await.unwrap_err();
        assert!(matches!(err, BridgeError::Http { status: 503, .. }));
    }
}
