//! # backoffice-database
//!
//! Persistence for sessions and refresh tokens. Defines the
//! [`SessionStore`] contract used by the session lifecycle, a PostgreSQL
//! implementation backed by sqlx, and an in-memory implementation for tests
//! and local runs.

pub mod connection;
pub mod memory;
pub mod migration;
pub mod repositories;
pub mod store;

pub use connection::DatabasePool;
pub use memory::MemorySessionStore;
pub use repositories::PgSessionStore;
pub use store::{RevocationOutcome, RotationOutcome, SessionStore};
