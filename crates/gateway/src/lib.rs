//! # Kestrel Gateway Crate
//!
//! Real-time edge of Kestrel: a WebSocket endpoint whose text frames carry
//! `{ "event", "data" }` envelopes, routed by the [`EventDispatcher`] to the
//! chat service, plus a health route.
//!
//! ## Architecture
//!
//! - **Dispatcher**: event name to handler, typed payloads, responses
//! - **WebSocket**: per-connection read loop and writer task
//! - **REST**: health check
//! - **State**: shared services and environment
//!
//! ## Usage
//!
//! ```no_run
//! use kestrel_config::Environment;
//! use kestrel_gateway::{create_router, GatewayState};
//!
//! # async fn run(pool: sqlx::SqlitePool) -> std::io::Result<()> {
//! let app = create_router(GatewayState::new(pool, Environment::Devel));
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:7070").await?;
//! axum::serve(listener, app).await
//! # }
//! ```

pub mod dispatcher;
pub mod error;
pub mod middleware;
pub mod presenter;
pub mod requests;
pub mod rest;
pub mod state;
pub mod websocket;

pub use dispatcher::{events, DispatchOutcome, EventDispatcher, ResponseSink};
pub use error::{GatewayError, GatewayResult};
pub use requests::{InboundMessage, PayloadError};
pub use state::GatewayState;

use std::sync::Arc;

use axum::{http::Method, middleware as axum_middleware, routing::get, Router};
use tower_http::cors::{Any, CorsLayer};

/// Create the main application router with all routes
pub fn create_router(state: GatewayState) -> Router {
    let state = Arc::new(state);

    Router::new()
        .merge(rest::create_rest_routes())
        .route("/ws", get(websocket::websocket_handler))
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([Method::GET])
                .allow_headers(Any),
        )
        .layer(axum_middleware::from_fn(middleware::logging_middleware))
}
