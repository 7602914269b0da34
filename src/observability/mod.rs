//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! repository mutations ─┐
//! relay outcomes ───────┼─→ tracing events → EnvFilter → fmt layer (stdout)
//! handled requests ─────┘
//!                       └─→ metrics facade → Prometheus exporter (opt-in)
//! ```
//!
//! # Design Decisions
//! - Per-request spans come from `tower_http::trace` and carry the `x-request-id`
//!   assigned by the outermost layer
//! - Metric recorders are no-ops until an exporter is installed, so tests need no setup

pub mod logging;
pub mod metrics;
