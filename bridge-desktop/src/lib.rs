//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for hosts that run the sync as a
//! regular process (CLI, cron job, container).
//!
//! - `HttpClient` using `reqwest` with rustls and retry on 429/5xx
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::ReqwestHttpClient;
//! use std::sync::Arc;
//!
//! let http_client = Arc::new(ReqwestHttpClient::new()?);
//! let directory = GoogleDirectoryConnector::new(http_client.clone(), token, "my_customer");
//! ```

mod http;

pub use http::ReqwestHttpClient;
