//! # backoffice-gateway
//!
//! Forwards service-prefixed requests to downstream backends. Encrypted
//! bearer credentials are unwrapped on the way through so downstream
//! services only ever see plain JWTs.

pub mod error;
pub mod forwarder;
pub mod jwt;
pub mod middleware;
pub mod transport;

pub use error::GatewayError;
pub use forwarder::GatewayForwarder;
pub use middleware::{GatewayState, gateway_middleware};
pub use transport::{HttpTransport, ReqwestTransport};
