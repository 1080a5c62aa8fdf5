//! Session domain entities.

pub mod model;
pub mod refresh_token;
pub mod status;

pub use model::{NewSession, Session};
pub use refresh_token::{NewRefreshToken, RefreshToken};
pub use status::SessionStatus;
