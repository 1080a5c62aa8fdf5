//! # backoffice-auth
//!
//! Token integrity and session lifecycle for the back-office backend.
//!
//! ## Modules
//!
//! - `crypto`: HMAC-SHA256 token digests, AES-256-GCM token encryption,
//!   and the startup key provider
//! - `session`: Session registration, invalidation, renewal, status checks,
//!   refresh-token redemption, and the retention cleanup cycle

pub mod crypto;
pub mod session;

pub use crypto::{CryptoError, KeyProvider};
pub use session::{RefreshTokenService, SessionCleanup, SessionManager, SessionMetadata};
