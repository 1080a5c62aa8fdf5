//! Background tasks for the back-office backend.
//!
//! This crate provides the session sweeper: a long-lived loop that
//! periodically deletes session rows past the retention window.

pub mod sweeper;

pub use sweeper::{SessionSweeper, SweeperState};
