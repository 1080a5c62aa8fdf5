//! Back-office server wiring: shared state and the HTTP router.

pub mod router;
pub mod state;

pub use router::build_router;
pub use state::AppState;
