//! # Core Runtime Module
//!
//! Provides foundational runtime infrastructure for the identity sync core:
//! - Logging and tracing infrastructure
//! - Configuration management
//! - Event bus system
//!
//! ## Overview
//!
//! This crate contains the runtime utilities the engine and service depend on.
//! It establishes the logging conventions, the validated run configuration,
//! and the broadcast channel sync progress is published on.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
