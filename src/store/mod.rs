//! Task storage subsystem.
//!
//! # Data Flow
//! ```text
//! Startup:
//!     document.rs (load durable JSON, fatal on failure)
//!     → repository.rs (owns the in-memory collection)
//!
//! Mutation (create / update / delete):
//!     repository.rs takes the collection lock
//!     → applies the change to a copy
//!     → document.rs persists the copy (temp file + rename)
//!     → copy replaces the in-memory collection
//! ```
//!
//! # Design Decisions
//! - One async mutex serializes every read-modify-write
//! - Ids come from a persisted monotonic counter, never reused
//! - A failed persist leaves memory and disk unchanged

pub mod document;
pub mod repository;
pub mod task;

pub use document::{DocumentStore, JsonFileStore, MemoryStore, StoreError};
pub use repository::{RepositoryError, TaskRepository};
pub use task::{parse_bool_token, Task, TaskDocument, TaskFilter, TaskId};
