//! SCIM 2.0 client implementation
//!
//! Implements the `TargetStore` trait against a SCIM endpoint.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bridge_traits::{
    HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy, TargetGroup, TargetStore,
    TargetUser,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::error::ScimError;
use crate::types::{ListResponse, PatchRequest, ScimGroup, ScimUser};

pub const SCIM_CONTENT_TYPE: &str = "application/scim+json";

/// Page size for full listings
const PAGE_SIZE: u32 = 100;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// SCIM 2.0 client over the host `HttpClient`
///
/// # Example
///
/// ```ignore
/// use provider_scim::ScimClient;
/// use bridge_traits::TargetStore;
///
/// let store = ScimClient::new(http_client, "https://scim.us-east-1.amazonaws.com/xxxx/scim/v2", token);
/// let user = store.find_user_by_email("a@x.com").await?;
/// ```
pub struct ScimClient {
    http_client: Arc<dyn HttpClient>,
    base_url: String,
    access_token: String,
    retry_policy: RetryPolicy,
}

impl ScimClient {
    pub fn new(
        http_client: Arc<dyn HttpClient>,
        base_url: impl Into<String>,
        access_token: impl Into<String>,
    ) -> Self {
        Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            access_token: access_token.into(),
            retry_policy: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str, params: &[(&str, String)]) -> String {
        if params.is_empty() {
            return format!("{}{}", self.base_url, path);
        }
        let query = params
            .iter()
            .map(|(key, value)| format!("{}={}", key, urlencoding::encode(value)))
            .collect::<Vec<_>>()
            .join("&");
        format!("{}{}?{}", self.base_url, path, query)
    }

    fn request(&self, method: HttpMethod, url: String) -> HttpRequest {
        HttpRequest::new(method, url)
            .bearer_token(self.access_token.as_str())
            .header("Accept", SCIM_CONTENT_TYPE)
            .timeout(REQUEST_TIMEOUT)
    }

    fn with_body<B: Serialize>(&self, request: HttpRequest, body: &B) -> Result<HttpRequest, ScimError> {
        Ok(request.json_with_content_type(body, SCIM_CONTENT_TYPE)?)
    }

    async fn send(
        &self,
        request: HttpRequest,
        resource: &'static str,
        key: &str,
    ) -> Result<HttpResponse, ScimError> {
        debug!(method = %request.method, url = %request.url, "SCIM request");
        let response = self
            .http_client
            .execute_with_retry(request, self.retry_policy.clone())
            .await?;

        if response.is_success() {
            Ok(response)
        } else {
            Err(ScimError::from_response(response.status, &response.body, resource, key))
        }
    }

    fn parse<T: DeserializeOwned>(response: &HttpResponse, resource: &'static str) -> Result<T, ScimError> {
        serde_json::from_slice(&response.body)
            .map_err(|e| ScimError::ParseError(format!("Failed to parse {}: {}", resource, e)))
    }

    async fn query<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
        resource: &'static str,
        key: &str,
    ) -> Result<ListResponse<T>, ScimError> {
        let request = self.request(HttpMethod::Get, self.url(path, params));
        let response = self.send(request, resource, key).await?;
        Self::parse(&response, resource)
    }

    /// First resource matching `filter`; an empty result is `NotFound`.
    async fn find_one<T: DeserializeOwned>(
        &self,
        path: &str,
        filter: String,
        resource: &'static str,
        key: &str,
    ) -> Result<T, ScimError> {
        let list: ListResponse<T> = self
            .query(path, &[("filter", filter)], resource, key)
            .await?;
        list.resources
            .into_iter()
            .next()
            .ok_or_else(|| ScimError::NotFound {
                resource,
                key: key.to_string(),
            })
    }

    /// Walk `startIndex` pages until `totalResults` is reached or a page comes back empty.
    async fn list_all<T: DeserializeOwned>(&self, path: &str, resource: &'static str) -> Result<Vec<T>, ScimError> {
        let mut items = Vec::new();
        let mut start_index: u64 = 1;

        loop {
            let params = [
                ("startIndex", start_index.to_string()),
                ("count", PAGE_SIZE.to_string()),
            ];
            let page: ListResponse<T> = self.query(path, &params, resource, "*").await?;
            let fetched = page.resources.len() as u64;
            items.extend(page.resources);

            if fetched == 0 || items.len() as u64 >= page.total_results {
                break;
            }
            start_index += fetched;
        }

        Ok(items)
    }

    async fn patch_members(
        &self,
        op: &'static str,
        user: &TargetUser,
        group: &TargetGroup,
    ) -> Result<(), ScimError> {
        let user_id = require_id(&user.id, "user", &user.username)?;
        let group_id = require_id(&group.id, "group", &group.display_name)?;

        let path = format!("/Groups/{}", urlencoding::encode(group_id));
        let request = self.with_body(
            self.request(HttpMethod::Patch, self.url(&path, &[])),
            &PatchRequest::members(op, user_id),
        )?;
        self.send(request, "group", &group.display_name).await?;
        Ok(())
    }

    async fn delete_resource(&self, path: String, resource: &'static str, key: &str) -> Result<(), ScimError> {
        let request = self.request(HttpMethod::Delete, self.url(&path, &[]));
        self.send(request, resource, key).await?;
        Ok(())
    }
}

fn require_id<'a>(id: &'a Option<String>, resource: &'static str, key: &str) -> Result<&'a str, ScimError> {
    id.as_deref().ok_or_else(|| ScimError::MissingId {
        resource,
        key: key.to_string(),
    })
}

/// Quote a value for a SCIM filter string literal.
fn filter_literal(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

#[async_trait]
impl TargetStore for ScimClient {
    #[instrument(skip(self))]
    async fn find_user_by_email(&self, email: &str) -> bridge_traits::Result<TargetUser> {
        let filter = format!("userName eq {}", filter_literal(email));
        let user: ScimUser = self.find_one("/Users", filter, "user", email).await?;
        Ok(user.into())
    }

    #[instrument(skip(self, user), fields(user = %user.username))]
    async fn create_user(&self, user: &TargetUser) -> bridge_traits::Result<TargetUser> {
        let request = self.with_body(
            self.request(HttpMethod::Post, self.url("/Users", &[])),
            &ScimUser::from(user),
        )?;
        let response = self.send(request, "user", &user.username).await?;
        let created: ScimUser = Self::parse(&response, "user")?;
        info!("Created SCIM user");
        Ok(created.into())
    }

    #[instrument(skip(self, user), fields(user = %user.username))]
    async fn update_user(&self, user: &TargetUser) -> bridge_traits::Result<TargetUser> {
        let id = require_id(&user.id, "user", &user.username)?;
        let path = format!("/Users/{}", urlencoding::encode(id));
        let request = self.with_body(
            self.request(HttpMethod::Put, self.url(&path, &[])),
            &ScimUser::from(user),
        )?;
        let response = self.send(request, "user", &user.username).await?;
        let updated: ScimUser = Self::parse(&response, "user")?;
        Ok(updated.into())
    }

    #[instrument(skip(self, user), fields(user = %user.username))]
    async fn delete_user(&self, user: &TargetUser) -> bridge_traits::Result<()> {
        let id = require_id(&user.id, "user", &user.username)?;
        self.delete_resource(format!("/Users/{}", urlencoding::encode(id)), "user", &user.username)
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn list_users(&self) -> bridge_traits::Result<Vec<TargetUser>> {
        let users: Vec<ScimUser> = self.list_all("/Users", "user").await?;
        debug!(count = users.len(), "Listed SCIM users");
        Ok(users.into_iter().map(TargetUser::from).collect())
    }

    #[instrument(skip(self))]
    async fn find_group_by_name(&self, name: &str) -> bridge_traits::Result<TargetGroup> {
        let filter = format!("displayName eq {}", filter_literal(name));
        let group: ScimGroup = self.find_one("/Groups", filter, "group", name).await?;
        Ok(group.into())
    }

    #[instrument(skip(self, group), fields(group = %group.display_name))]
    async fn create_group(&self, group: &TargetGroup) -> bridge_traits::Result<TargetGroup> {
        let request = self.with_body(
            self.request(HttpMethod::Post, self.url("/Groups", &[])),
            &ScimGroup::from(group),
        )?;
        let response = self.send(request, "group", &group.display_name).await?;
        let created: ScimGroup = Self::parse(&response, "group")?;
        info!("Created SCIM group");
        Ok(created.into())
    }

    #[instrument(skip(self, group), fields(group = %group.display_name))]
    async fn delete_group(&self, group: &TargetGroup) -> bridge_traits::Result<()> {
        let id = require_id(&group.id, "group", &group.display_name)?;
        self.delete_resource(
            format!("/Groups/{}", urlencoding::encode(id)),
            "group",
            &group.display_name,
        )
        .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn list_groups(&self) -> bridge_traits::Result<Vec<TargetGroup>> {
        let groups: Vec<ScimGroup> = self.list_all("/Groups", "group").await?;
        debug!(count = groups.len(), "Listed SCIM groups");
        Ok(groups.into_iter().map(TargetGroup::from).collect())
    }

    #[instrument(skip(self, user, group), fields(user = %user.username, group = %group.display_name))]
    async fn is_member(&self, user: &TargetUser, group: &TargetGroup) -> bridge_traits::Result<bool> {
        let user_id = require_id(&user.id, "user", &user.username)?;
        let group_id = require_id(&group.id, "group", &group.display_name)?;
        let filter = format!(
            "id eq {} and members eq {}",
            filter_literal(group_id),
            filter_literal(user_id)
        );

        let list: ListResponse<ScimGroup> = self
            .query("/Groups", &[("filter", filter)], "group", &group.display_name)
            .await?;
        Ok(list.total_results > 0 || !list.resources.is_empty())
    }

    #[instrument(skip(self, user, group), fields(user = %user.username, group = %group.display_name))]
    async fn add_member(&self, user: &TargetUser, group: &TargetGroup) -> bridge_traits::Result<()> {
        self.patch_members("add", user, group).await?;
        Ok(())
    }

    #[instrument(skip(self, user, group), fields(user = %user.username, group = %group.display_name))]
    async fn remove_member(&self, user: &TargetUser, group: &TargetGroup) -> bridge_traits::Result<()> {
        self.patch_members("remove", user, group).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::BridgeError;
    use bytes::Bytes;
    use mockall::mock;
    use mockall::predicate::{always, function};
    use std::collections::HashMap;

    const BASE: &str = "https://scim.example.com/scim/v2";

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

    fn respond(status: u16, body: &str) -> bridge_traits::Result<HttpResponse> {
        Ok(HttpResponse {
            status,
            headers: HashMap::new(),
            body: Bytes::from(body.to_string()),
        })
    }

    fn client(mock: MockHttpClient) -> ScimClient {
        ScimClient::new(Arc::new(mock), format!("{}/", BASE), "scim_token")
    }

    fn body_json(req: &HttpRequest) -> serde_json::Value {
        serde_json::from_slice(req.body.as_ref().expect("request body")).unwrap()
    }

    const ANN: &str = r#"{
        "id": "u1",
        "userName": "a@x.com",
        "name": {"givenName": "Ann", "familyName": "Lee"},
        "emails": [{"value": "a@x.com", "type": "work", "primary": true}],
        "active": true
    }"#;

    #[core_async::test]
    async fn test_find_user_by_email() {
        let mut mock_http = MockHttpClient::new();
        mock_http
            .expect_execute_with_retry()
            .times(1)
            .returning(|req, _| {
                assert_eq!(req.method, HttpMethod::Get);
                assert_eq!(
                    req.url,
                    format!("{}/Users?filter=userName%20eq%20%22a%40x.com%22", BASE)
                );
                assert_eq!(
                    req.headers.get("Authorization"),
                    Some(&"Bearer scim_token".to_string())
                );
                respond(200, &format!(r#"{{"totalResults": 1, "Resources": [{}]}}"#, ANN))
            });

        let user = client(mock_http).find_user_by_email("a@x.com").await.unwrap();
        assert_eq!(user.id.as_deref(), Some("u1"));
        assert_eq!(user.given_name, "Ann");
        assert!(user.active);
    }

    #[core_async::test]
    async fn test_empty_filter_result_is_not_found() {
        let mut mock_http = MockHttpClient::new();
        mock_http
            .expect_execute_with_retry()
            .times(1)
            .returning(|_, _| respond(200, r#"{"totalResults": 0, "Resources": []}"#));

        let err = client(mock_http)
            .find_group_by_name("eng")
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::NotFound { kind: "group", .. }));
    }

    #[core_async::test]
    async fn test_create_user_conflict() {
        let mut mock_http = MockHttpClient::new();
        mock_http
            .expect_execute_with_retry()
            .times(1)
            .returning(|req, _| {
                assert_eq!(req.method, HttpMethod::Post);
                assert_eq!(
                    req.headers.get("Content-Type"),
                    Some(&SCIM_CONTENT_TYPE.to_string())
                );
                assert_eq!(body_json(&req)["userName"], "a@x.com");
                respond(409, r#"{"status": "409", "detail": "Duplicate userName"}"#)
            });

        let user = TargetUser::new("Ann", "Lee", "a@x.com", true);
        let err = client(mock_http).create_user(&user).await.unwrap_err();
        assert!(err.is_conflict());
    }

    #[core_async::test]
    async fn test_update_user_replaces_by_id() {
        let mut mock_http = MockHttpClient::new();
        mock_http
            .expect_execute_with_retry()
            .times(1)
            .returning(|req, _| {
                assert_eq!(req.method, HttpMethod::Put);
                assert_eq!(req.url, format!("{}/Users/u1", BASE));
                assert_eq!(body_json(&req)["active"], false);
                respond(200, &ANN.replace("\"active\": true", "\"active\": false"))
            });

        let user = TargetUser::new("Ann", "Lee", "a@x.com", false).with_id("u1");
        let updated = client(mock_http).update_user(&user).await.unwrap();
        assert!(!updated.active);
    }

    #[core_async::test]
    async fn test_update_without_id_is_rejected() {
        let mock_http = MockHttpClient::new();
        let user = TargetUser::new("Ann", "Lee", "a@x.com", true);

        let err = client(mock_http).update_user(&user).await.unwrap_err();
        assert!(matches!(err, BridgeError::OperationFailed(_)));
    }

    #[core_async::test]
    async fn test_is_member_filter() {
        let mut mock_http = MockHttpClient::new();
        mock_http
            .expect_execute_with_retry()
            .with(function(|req: &HttpRequest| req.url.contains("%22u1%22")), always())
            .times(1)
            .returning(|req, _| {
                assert!(req
                    .url
                    .contains("filter=id%20eq%20%22g1%22%20and%20members%20eq%20%22u1%22"));
                respond(200, r#"{"totalResults": 1, "Resources": [{"id": "g1", "displayName": "eng"}]}"#)
            });
        mock_http
            .expect_execute_with_retry()
            .with(function(|req: &HttpRequest| req.url.contains("%22u2%22")), always())
            .times(1)
            .returning(|_, _| respond(200, r#"{"totalResults": 0, "Resources": []}"#));

        let store = client(mock_http);
        let group = TargetGroup::new("eng").with_id("g1");
        let member = TargetUser::new("Ann", "Lee", "a@x.com", true).with_id("u1");
        let other = TargetUser::new("Bo", "Kim", "b@x.com", true).with_id("u2");

        assert!(store.is_member(&member, &group).await.unwrap());
        assert!(!store.is_member(&other, &group).await.unwrap());
    }

    #[core_async::test]
    async fn test_add_and_remove_member_patch() {
        let mut mock_http = MockHttpClient::new();
        mock_http
            .expect_execute_with_retry()
            .times(2)
            .returning(|req, _| {
                assert_eq!(req.method, HttpMethod::Patch);
                assert_eq!(req.url, format!("{}/Groups/g1", BASE));
                let body = body_json(&req);
                assert_eq!(
                    body["schemas"][0],
                    "urn:ietf:params:scim:api:messages:2.0:PatchOp"
                );
                assert_eq!(body["Operations"][0]["path"], "members");
                assert_eq!(body["Operations"][0]["value"][0]["value"], "u1");
                respond(204, "")
            });

        let store = client(mock_http);
        let group = TargetGroup::new("eng").with_id("g1");
        let user = TargetUser::new("Ann", "Lee", "a@x.com", true).with_id("u1");

        store.add_member(&user, &group).await.unwrap();
        store.remove_member(&user, &group).await.unwrap();
    }

    #[core_async::test]
    async fn test_list_users_pages_by_start_index() {
        let mut mock_http = MockHttpClient::new();
        mock_http
            .expect_execute_with_retry()
            .with(function(|req: &HttpRequest| req.url.contains("startIndex=1&")), always())
            .times(1)
            .returning(|_, _| respond(200, &format!(r#"{{"totalResults": 2, "Resources": [{}]}}"#, ANN)));
        mock_http
            .expect_execute_with_retry()
            .with(function(|req: &HttpRequest| req.url.contains("startIndex=2&")), always())
            .times(1)
            .returning(|_, _| {
                respond(
                    200,
                    r#"{"totalResults": 2, "Resources": [{"id": "u2", "userName": "b@x.com", "active": true}]}"#,
                )
            });

        let users = client(mock_http).list_users().await.unwrap();
        let names: Vec<_> = users.iter().map(|u| u.username.as_str()).collect();
        assert_eq!(names, vec!["a@x.com", "b@x.com"]);
    }

    #[core_async::test]
    async fn test_delete_missing_group_is_not_found() {
        let mut mock_http = MockHttpClient::new();
        mock_http
            .expect_execute_with_retry()
            .times(1)
            .returning(|req, _| {
                assert_eq!(req.method, HttpMethod::Delete);
                respond(404, r#"{"status": "404", "detail": "Group not found"}"#)
            });

        let group = TargetGroup::new("stale").with_id("g9");
        let err = client(mock_http).delete_group(&group).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_filter_literal_escapes_quotes() {
        assert_eq!(filter_literal(r#"a"b"#), r#""a\"b""#);
    }
}
