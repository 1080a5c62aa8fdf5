//! Application state shared across handlers and middleware.

use backoffice_database::DatabasePool;
use backoffice_gateway::GatewayState;

/// Everything a request handler may need.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Database pool. Absent when running against the in-memory store.
    pub db_pool: Option<DatabasePool>,
    /// Gateway middleware state.
    pub gateway: GatewayState,
}
