//! Session lifecycle management including registration, invalidation,
//! renewal, refresh-token redemption, and retention cleanup.

pub mod cleanup;
pub mod manager;
pub mod refresh;

pub use cleanup::SessionCleanup;
pub use manager::{SessionManager, SessionMetadata, parse_user_id};
pub use refresh::{IssuedRefreshToken, RefreshTokenService};
