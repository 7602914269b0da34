//! Process lifecycle.
//!
//! # Data Flow
//! ```text
//! startup.rs:  config file (or defaults) → --init-store seed → load tasks → bind
//! signals.rs:  SIGINT / SIGTERM → Shutdown::trigger
//! shutdown.rs: broadcast → axum stops accepting and drains in-flight requests
//! ```
//!
//! # Design Decisions
//! - An unreadable task store aborts startup instead of serving an empty list
//! - The listener binds after the store loads, so no request sees a half-started service
//! - Nothing is flushed on exit: every committed mutation is already on disk

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use startup::StartupError;
