//! # Google Directory Provider
//!
//! Implements `SourceDirectory` over the Google Admin SDK Directory API v1.
//!
//! ## Overview
//!
//! This module provides:
//! - Paginated user listing, with a separate listing of deleted users
//! - Group listing by directory search query
//! - Group member listing, including derived (nested) membership
//!
//! Authentication is a bearer token supplied by the host; token acquisition
//! is out of scope here.

mod connector;
pub mod error;
mod types;

pub use connector::{GoogleDirectoryConnector, DIRECTORY_API_BASE};
pub use error::{GoogleDirectoryError, Result};
