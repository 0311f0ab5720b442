//! Request logging and connection authentication

use axum::{extract::Request, middleware::Next, response::Response};
use kestrel_chats::StaticId;

use crate::error::{GatewayError, GatewayResult};
use crate::state::GatewayState;

/// Log method, path, status and latency of every HTTP request
pub async fn logging_middleware(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();

    let start = std::time::Instant::now();
    let response = next.run(request).await;
    let duration = start.elapsed();

    tracing::info!(
        method = %method,
        uri = %uri,
        status = %response.status(),
        duration_ms = duration.as_millis(),
        "Request completed"
    );

    response
}

/// Resolve who is connecting.
///
/// A session token always wins. Without one, devel builds accept a bare
/// `static_id`; prod requires the token.
pub async fn authenticate(
    state: &GatewayState,
    token: Option<&str>,
    static_id: Option<&str>,
) -> GatewayResult<StaticId> {
    if let Some(token) = token.filter(|t| !t.is_empty()) {
        let owner = state
            .sessions
            .resolve_token(token)
            .await
            .map_err(|e| GatewayError::DatabaseError(e.to_string()))?
            .ok_or_else(|| {
                GatewayError::AuthenticationFailed("invalid or expired token".to_string())
            })?;
        return Ok(StaticId::from(owner));
    }

    match static_id.filter(|id| !id.is_empty()) {
        Some(id) if state.environment.is_devel() => {
            tracing::debug!(static_id = %id, "accepting unauthenticated static id in devel");
            Ok(StaticId::from(id))
        }
        _ => Err(GatewayError::AuthenticationFailed(
            "missing authentication token".to_string(),
        )),
    }
}
