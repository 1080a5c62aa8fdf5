//! Error type shared by every back-office crate.
//!
//! Lower layers keep their own error enums (`CryptoError`, `GatewayError`)
//! and convert into [`AppError`] at the crate boundary, so `?` works across
//! the whole call chain.

use std::error::Error as StdError;
use std::fmt;

use thiserror::Error;

/// Coarse error category. Callers branch on this, never on messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ErrorKind {
    /// No row or resource matched.
    NotFound,
    /// A credential was missing, unknown, expired, revoked, or tampered with.
    Authentication,
    /// Caller input was rejected before any side effect.
    Validation,
    /// Startup configuration or key material is unusable.
    Configuration,
    /// The persistence layer failed.
    Database,
    /// A downstream service could not be reached or answered badly.
    ExternalService,
    /// Anything else.
    Internal,
}

impl ErrorKind {
    /// Stable upper-case code, suitable for logs and API bodies.
    pub const fn code(self) -> &'static str {
        match self {
            Self::NotFound => "NOT_FOUND",
            Self::Authentication => "AUTHENTICATION",
            Self::Validation => "VALIDATION",
            Self::Configuration => "CONFIGURATION",
            Self::Database => "DATABASE",
            Self::ExternalService => "EXTERNAL_SERVICE",
            Self::Internal => "INTERNAL",
        }
    }

    /// Whether the caller can fix the problem by changing the request.
    pub const fn is_client_error(self) -> bool {
        matches!(self, Self::NotFound | Self::Authentication | Self::Validation)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Application error: a kind, a message safe to log, and an optional cause.
#[derive(Debug, Error)]
#[error("{kind}: {message}")]
pub struct AppError {
    /// Category used for branching.
    pub kind: ErrorKind,
    /// Human-readable description. Never contains secrets.
    pub message: String,
    /// Underlying cause, if any.
    #[source]
    pub source: Option<Box<dyn StdError + Send + Sync>>,
}

impl AppError {
    /// Create an error without a cause.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    /// Create an error wrapping `source`.
    pub fn with_source(
        kind: ErrorKind,
        message: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self {
            kind,
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

macro_rules! kind_constructors {
    ($($(#[$doc:meta])* $name:ident => $kind:ident;)*) => {
        impl AppError {
            $(
                $(#[$doc])*
                pub fn $name(message: impl Into<String>) -> Self {
                    Self::new(ErrorKind::$kind, message)
                }
            )*
        }
    };
}

kind_constructors! {
    /// `NotFound` error.
    not_found => NotFound;
    /// `Authentication` error.
    authentication => Authentication;
    /// `Validation` error.
    validation => Validation;
    /// `Configuration` error.
    configuration => Configuration;
    /// `Database` error.
    database => Database;
    /// `ExternalService` error.
    external_service => ExternalService;
    /// `Internal` error.
    internal => Internal;
}

/// Clones keep kind and message; the boxed cause is not clonable and is
/// dropped.
impl Clone for AppError {
    fn clone(&self) -> Self {
        Self::new(self.kind, self.message.clone())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::with_source(ErrorKind::Internal, format!("I/O error: {err}"), err)
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        Self::with_source(
            ErrorKind::Configuration,
            format!("Failed to load configuration: {err}"),
            err,
        )
    }
}
