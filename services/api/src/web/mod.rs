pub mod auth;
pub mod comments;
pub mod live;
pub mod middleware;
pub mod parties;
pub mod profile;
pub mod protocol;
pub mod state;

// Re-export the pieces the binary needs to build the router.
pub use middleware::require_auth;
pub use parties::ApiDoc;

use axum::http::StatusCode;
use baliseboxd_core::ports::PortError;
use tracing::error;

/// Maps a port failure onto the (status, message) pair handlers return.
/// `context` doubles as the opaque client-facing message for unexpected
/// failures, whose details only go to the log.
pub(crate) fn port_error(context: &str, e: PortError) -> (StatusCode, String) {
    match e {
        PortError::NotFound(what) => (StatusCode::NOT_FOUND, what),
        PortError::Conflict(what) => (StatusCode::CONFLICT, what),
        PortError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized".to_string()),
        PortError::Unexpected(detail) => {
            error!("{}: {}", context, detail);
            (StatusCode::INTERNAL_SERVER_ERROR, context.to_string())
        }
    }
}
