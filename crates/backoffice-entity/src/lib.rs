//! # backoffice-entity
//!
//! Entity models for the session & token integrity subsystem. Every struct
//! in this crate represents a database table row or a domain value object.
//! Database entities derive `sqlx::FromRow`.

pub mod session;
