//! Task service with a CORS-bypass relay.
//!
//! CRUD over a single persisted task collection under `/api/tasks`, plus
//! `/bypass-cors?url=..` which forwards a request to any origin and answers
//! with the upstream body wrapped in the same JSON envelope.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod store;

pub use config::ServiceConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use store::TaskRepository;
