//! Runtime entry points.
//!
//! `block_on` drives a future to completion on a fresh current-thread runtime.
//! It backs the `#[core_async::main]` and `#[core_async::test]` macros.

pub use tokio::runtime::{Builder, Handle, Runtime};

/// Run a future to completion on a new current-thread runtime.
///
/// # Panics
///
/// Panics if the Tokio runtime cannot be constructed (e.g. the process is out
/// of file descriptors). There is no meaningful recovery at that point.
pub fn block_on<F>(future: F) -> F::Output
where
    F: std::future::Future,
{
    Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("core_async::runtime::block_on: failed to build Tokio runtime")
        .block_on(future)
}

/// Returns `true` when called from inside a running runtime.
pub fn in_runtime() -> bool {
    Handle::try_current().is_ok()
}
