//! # Core Configuration Module
//!
//! Provides configuration management for a sync run.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct a `CoreConfig`
//! holding the credentials, source queries, filter lists and engine knobs for
//! one run. It enforces fail-fast validation so a misconfigured run stops
//! before any request is made.
//!
//! ## Required Settings
//!
//! - `scim_endpoint` - Base URL of the target SCIM service
//! - `scim_access_token` - Bearer token for the SCIM service
//! - `google_access_token` - OAuth bearer token for the directory API
//!
//! ## Usage
//!
//! ```
//! use core_runtime::config::{CoreConfig, SyncMethod};
//!
//! let config = CoreConfig::builder()
//!     .scim_endpoint("https://scim.example.com/scim/v2")
//!     .scim_access_token("scim-token")
//!     .google_access_token("google-token")
//!     .group_match("name:AWS*")
//!     .ignore_groups(["aws-admins@example.com"])
//!     .sync_method(SyncMethod::Groups)
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(config.google_customer_id, "my_customer");
//! ```
//!
//! ## Error Handling
//!
//! The builder names the missing setting and how to provide it:
//!
//! ```should_panic
//! use core_runtime::config::CoreConfig;
//!
//! let config = CoreConfig::builder()
//!     .scim_endpoint("https://scim.example.com/scim/v2")
//!     .build()
//!     .expect("Should fail - missing tokens");
//! ```

use crate::error::{Error, Result};
use crate::logging::redact_if_sensitive;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Default directory customer; resolves to the account the token belongs to.
pub const DEFAULT_CUSTOMER_ID: &str = "my_customer";

/// Upper bound for concurrent membership probes against the target.
pub const MAX_PROBE_CONCURRENCY: usize = 64;

/// Which reconciliation strategy a run uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMethod {
    /// Full snapshot diff of users, groups and membership.
    #[default]
    Groups,
    /// Independent user pass followed by a group pass.
    UsersGroups,
}

impl SyncMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncMethod::Groups => "groups",
            SyncMethod::UsersGroups => "users_groups",
        }
    }
}

impl fmt::Display for SyncMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "groups" => Ok(SyncMethod::Groups),
            "users_groups" => Ok(SyncMethod::UsersGroups),
            other => Err(Error::Config(format!(
                "Unknown sync method '{}', expected 'groups' or 'users_groups'",
                other
            ))),
        }
    }
}

/// Configuration for one sync run.
///
/// Use [`CoreConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct CoreConfig {
    /// SCIM base URL, without trailing slash
    pub scim_endpoint: String,

    /// SCIM bearer token
    pub scim_access_token: String,

    /// Directory API bearer token
    pub google_access_token: String,

    /// Directory customer id
    pub google_customer_id: String,

    pub sync_method: SyncMethod,

    /// Source user query (directory search syntax)
    pub user_match: String,

    /// Source group query (directory search syntax)
    pub group_match: String,

    /// User emails that never take part in sync
    pub ignore_users: Vec<String>,

    /// Group emails that never take part in sync
    pub ignore_groups: Vec<String>,

    /// When non-empty, only these group emails take part in sync
    pub include_groups: Vec<String>,

    /// Concurrent target membership probes; 1 means strictly sequential
    pub membership_probe_concurrency: usize,

    /// Compute the plan without applying it
    pub dry_run: bool,
}

impl fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CoreConfig")
            .field("scim_endpoint", &self.scim_endpoint)
            .field(
                "scim_access_token",
                &redact_if_sensitive("scim_access_token", &self.scim_access_token),
            )
            .field(
                "google_access_token",
                &redact_if_sensitive("google_access_token", &self.google_access_token),
            )
            .field("google_customer_id", &self.google_customer_id)
            .field("sync_method", &self.sync_method)
            .field("user_match", &self.user_match)
            .field("group_match", &self.group_match)
            .field("ignore_users", &self.ignore_users.len())
            .field("ignore_groups", &self.ignore_groups.len())
            .field("include_groups", &self.include_groups.len())
            .field(
                "membership_probe_concurrency",
                &self.membership_probe_concurrency,
            )
            .field("dry_run", &self.dry_run)
            .finish()
    }
}

impl CoreConfig {
    /// Creates a new builder for constructing a `CoreConfig`.
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Validates the configuration.
    ///
    /// Called by [`CoreConfigBuilder::build`]; exposed for configs that were
    /// assembled or modified by hand.
    pub fn validate(&self) -> Result<()> {
        if !(self.scim_endpoint.starts_with("https://")
            || self.scim_endpoint.starts_with("http://"))
        {
            return Err(Error::Config(format!(
                "SCIM endpoint must be an http(s) URL, got '{}'",
                self.scim_endpoint
            )));
        }

        if self.scim_access_token.trim().is_empty() {
            return Err(missing("scim_access_token", "SCIM bearer token is empty."));
        }

        if self.google_access_token.trim().is_empty() {
            return Err(missing(
                "google_access_token",
                "Directory API bearer token is empty.",
            ));
        }

        if self.google_customer_id.trim().is_empty() {
            return Err(Error::Config(
                "Directory customer id cannot be empty".to_string(),
            ));
        }

        if self.membership_probe_concurrency == 0 {
            return Err(Error::Config(
                "Membership probe concurrency must be at least 1".to_string(),
            ));
        }

        if self.membership_probe_concurrency > MAX_PROBE_CONCURRENCY {
            return Err(Error::Config(format!(
                "Membership probe concurrency exceeds maximum of {}",
                MAX_PROBE_CONCURRENCY
            )));
        }

        if self.dry_run && self.sync_method == SyncMethod::UsersGroups {
            return Err(Error::Config(
                "Dry run is only supported with sync method 'groups'".to_string(),
            ));
        }

        Ok(())
    }
}

fn missing(setting: &str, message: &str) -> Error {
    Error::MissingSetting {
        setting: setting.to_string(),
        message: message.to_string(),
    }
}

/// Builder for constructing [`CoreConfig`] instances.
#[derive(Default)]
pub struct CoreConfigBuilder {
    scim_endpoint: Option<String>,
    scim_access_token: Option<String>,
    google_access_token: Option<String>,
    google_customer_id: Option<String>,
    sync_method: SyncMethod,
    user_match: String,
    group_match: String,
    ignore_users: Vec<String>,
    ignore_groups: Vec<String>,
    include_groups: Vec<String>,
    membership_probe_concurrency: Option<usize>,
    dry_run: bool,
}

impl CoreConfigBuilder {
    /// Sets the SCIM base URL (required). A trailing slash is removed.
    pub fn scim_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        let endpoint = endpoint.into();
        self.scim_endpoint = Some(endpoint.trim_end_matches('/').to_string());
        self
    }

    /// Sets the SCIM bearer token (required).
    pub fn scim_access_token(mut self, token: impl Into<String>) -> Self {
        self.scim_access_token = Some(token.into());
        self
    }

    /// Sets the directory API bearer token (required).
    pub fn google_access_token(mut self, token: impl Into<String>) -> Self {
        self.google_access_token = Some(token.into());
        self
    }

    /// Sets the directory customer id. Defaults to `my_customer`.
    pub fn google_customer_id(mut self, customer_id: impl Into<String>) -> Self {
        self.google_customer_id = Some(customer_id.into());
        self
    }

    pub fn sync_method(mut self, method: SyncMethod) -> Self {
        self.sync_method = method;
        self
    }

    pub fn user_match(mut self, query: impl Into<String>) -> Self {
        self.user_match = query.into();
        self
    }

    pub fn group_match(mut self, query: impl Into<String>) -> Self {
        self.group_match = query.into();
        self
    }

    pub fn ignore_users<I, S>(mut self, emails: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ignore_users = emails.into_iter().map(Into::into).collect();
        self
    }

    pub fn ignore_groups<I, S>(mut self, emails: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ignore_groups = emails.into_iter().map(Into::into).collect();
        self
    }

    pub fn include_groups<I, S>(mut self, emails: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.include_groups = emails.into_iter().map(Into::into).collect();
        self
    }

    /// Sets how many target membership probes may be in flight at once.
    pub fn membership_probe_concurrency(mut self, concurrency: usize) -> Self {
        self.membership_probe_concurrency = Some(concurrency);
        self
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Builds the final `CoreConfig` instance.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - A required setting is missing
    /// - A value is out of range or inconsistent with the sync method
    pub fn build(self) -> Result<CoreConfig> {
        let scim_endpoint = self.scim_endpoint.ok_or_else(|| {
            missing(
                "scim_endpoint",
                "Use .scim_endpoint() or set IDSYNC_SCIM_ENDPOINT.",
            )
        })?;

        let scim_access_token = self.scim_access_token.ok_or_else(|| {
            missing(
                "scim_access_token",
                "Use .scim_access_token() or set IDSYNC_SCIM_ACCESS_TOKEN.",
            )
        })?;

        let google_access_token = self.google_access_token.ok_or_else(|| {
            missing(
                "google_access_token",
                "Use .google_access_token() or set IDSYNC_GOOGLE_ACCESS_TOKEN.",
            )
        })?;

        let config = CoreConfig {
            scim_endpoint,
            scim_access_token,
            google_access_token,
            google_customer_id: self
                .google_customer_id
                .unwrap_or_else(|| DEFAULT_CUSTOMER_ID.to_string()),
            sync_method: self.sync_method,
            user_match: self.user_match,
            group_match: self.group_match,
            ignore_users: self.ignore_users,
            ignore_groups: self.ignore_groups,
            include_groups: self.include_groups,
            membership_probe_concurrency: self.membership_probe_concurrency.unwrap_or(1),
            dry_run: self.dry_run,
        };

        config.validate()?;

        Ok(config)
    }
}
