//! Concrete PostgreSQL repository implementations.

pub mod session;

pub use session::PgSessionStore;
