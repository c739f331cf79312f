//! Process signals.

pub use tokio::signal::ctrl_c;
