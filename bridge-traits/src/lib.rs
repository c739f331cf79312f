//! # Host Bridge Traits
//!
//! Capability traits the reconciliation engine depends on, implemented by
//! providers and host adapters.
//!
//! ## Traits
//!
//! - [`HttpClient`](http::HttpClient) - Async HTTP with retry, used by the
//!   directory providers
//! - [`SourceDirectory`](directory::SourceDirectory) - Read-only access to the
//!   upstream identity provider
//! - [`TargetStore`](directory::TargetStore) - Read-write access to the
//!   downstream identity store
//!
//! ## Error Handling
//!
//! All bridge traits use [`BridgeError`](error::BridgeError). Implementations
//! should map "does not exist" to `BridgeError::NotFound` and "already exists"
//! to `BridgeError::Conflict` so the engine can tolerate them where it is
//! expected to.
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` bounds so a single provider can be
//! shared across the concurrent membership probes.
//!
//! ## Implementing TargetStore
//!
//! ```ignore
//! use async_trait::async_trait;
//! use bridge_traits::directory::{TargetStore, TargetUser};
//! use bridge_traits::error::{BridgeError, Result};
//!
//! struct MyStore;
//!
//! #[async_trait]
//! impl TargetStore for MyStore {
//!     async fn find_user_by_email(&self, email: &str) -> Result<TargetUser> {
//!         Err(BridgeError::not_found("user", email))
//!     }
//!     // ...
//! }
//! ```

pub mod directory;
pub mod error;
pub mod http;

pub use directory::{
    MemberKind, MemberRef, SourceDirectory, SourceGroup, SourceUser, TargetGroup, TargetStore,
    TargetUser,
};
pub use error::{BridgeError, Result};
pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy};
