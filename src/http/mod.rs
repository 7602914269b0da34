//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, route table)
//!     → request.rs (request ID, metrics, deadline, body buffering)
//!     → cors.rs (preflight short-circuit, header decoration)
//!     → tasks.rs (CRUD over the repository) | relay.rs (outbound call)
//!     → envelope.rs (status + message + data, errors mapped)
//!     → Send to client
//! ```

pub mod cors;
pub mod envelope;
pub mod relay;
pub mod request;
pub mod server;
pub mod tasks;

pub use envelope::{ApiError, Envelope};
pub use request::X_REQUEST_ID;
pub use server::{build_router, AppState, HttpServer, ServerError};
