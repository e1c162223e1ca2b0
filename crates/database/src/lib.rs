//! # Rowstream Database Crate
//!
//! This crate is the application's data-access layer for PostgreSQL and the
//! home of its two engineered operations: the cursor-backed streaming read
//! and the cancellation-aware atomic multi-statement write.
//!
//! ## Architectural Principles
//!
//! - **Adapter:** encapsulates all database-specific logic and SQL behind a
//!   clean API, so the HTTP layer never sees a driver type beyond the pool.
//! - **Bounded resources:** one pooled connection per in-flight operation,
//!   returned on every exit path; the streaming read additionally bounds
//!   memory to a single decoded row.
//! - **Cooperative cancellation:** the write path observes its token at
//!   statement boundaries only, and guarantees rollback even when the token
//!   fires during cleanup.
//!
//! ## Public API
//!
//! - `connect` / `connect_to`: establish the shared connection pool.
//! - `run_migrations`: apply the embedded schema migrations.
//! - `DbRepository`: the data-access methods (`stream_records`,
//!   `atomic_operation`).
//! - `DbError`: the error taxonomy returned from this crate.

// Declare the modules that constitute this crate.
pub mod connection;
pub mod error;
pub mod repository;

// Re-export the key components to create a clean, public-facing API.
pub use connection::{connect, connect_to, run_migrations};
pub use error::DbError;
pub use repository::DbRepository;
