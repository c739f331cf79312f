//! Workspace placeholder crate.
//!
//! This crate exists to expose shared feature flags that map to the individual
//! workspace crates (e.g., `core-service`, `core-sync`). Host applications can
//! depend on `idsync-workspace` and enable the documented features without
//! needing to wire each crate individually.
//!
//! - `desktop-shims` (default): the full service with the reqwest transport and
//!   the Google Directory / SCIM providers.
//! - `engine-only`: just the reconciliation engine, for callers bringing their
//!   own `SourceDirectory` / `TargetStore` implementations.

#[cfg(feature = "desktop-shims")]
pub use core_service;

#[cfg(feature = "engine-only")]
pub use core_sync;
