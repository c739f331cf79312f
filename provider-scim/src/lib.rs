//! # SCIM Provider
//!
//! Implements `TargetStore` over a SCIM 2.0 endpoint (RFC 7644), in the
//! subset AWS IAM Identity Center supports:
//!
//! - user and group lookup through `eq` filters
//! - full-record replacement with `PUT /Users/{id}`
//! - membership probes with `id eq ".." and members eq ".."`
//! - membership changes through `PATCH` operations on the `members` path

mod client;
pub mod error;
mod types;

pub use client::{ScimClient, SCIM_CONTENT_TYPE};
pub use error::{Result, ScimError};
