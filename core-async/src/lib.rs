//! Runtime facade for the identity sync workspace.
//!
//! Every `core-*`, `bridge-*` and `provider-*` crate goes through this crate
//! instead of depending on Tokio directly, so the runtime choice lives in one
//! place.
//!
//! # Modules
//!
//! - `runtime`: blocking entry points (`block_on`) and runtime handles
//! - `signal`: Ctrl-C notification for graceful shutdown
//! - `sync`: async-aware locks, semaphores, channels and `CancellationToken`
//! - `task`: task spawning
//! - `time`: sleep, timeout, durations
//!
//! # Examples
//!
//! ```rust
//! use core_async::sync::CancellationToken;
//! use core_async::time::{sleep, Duration};
//!
//! async fn poll_until_cancelled(token: CancellationToken) {
//!     while !token.is_cancelled() {
//!         sleep(Duration::from_millis(10)).await;
//!     }
//! }
//! ```

// Re-export the async entry-point/test macros so downstream crates never need
// direct Tokio dependencies.
pub use core_async_macros::{main, test};

pub mod runtime;
pub mod signal;
pub mod sync;
pub mod task;
pub mod time;

pub use task::spawn;
pub use time::{sleep, Duration, Instant};
