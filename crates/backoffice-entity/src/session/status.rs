//! Coarse session status reported to callers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Result of a session status check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// Active and not yet expired.
    Valid,
    /// Active but past its expiry (or expiry never computed).
    Expired,
    /// Missing or deactivated.
    Invalid,
    /// The status could not be determined.
    Error,
}

impl SessionStatus {
    /// Return the status as a lowercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Valid => "valid",
            Self::Expired => "expired",
            Self::Invalid => "invalid",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
