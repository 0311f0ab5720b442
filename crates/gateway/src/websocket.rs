//! WebSocket endpoint: one task per connection, messages handled in order.

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use kestrel_chats::StaticId;
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::error::GatewayResult;
use crate::middleware::authenticate;
use crate::requests::InboundMessage;
use crate::state::GatewayState;

#[derive(Debug, Default, Deserialize)]
pub struct ConnectQuery {
    pub token: Option<String>,
    pub static_id: Option<String>,
}

/// Authenticate, then upgrade to a WebSocket
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<GatewayState>>,
    Query(query): Query<ConnectQuery>,
) -> GatewayResult<Response> {
    let static_id = authenticate(
        &state,
        query.token.as_deref(),
        query.static_id.as_deref(),
    )
    .await?;

    Ok(ws.on_upgrade(move |socket| handle_socket(socket, state, static_id)))
}

async fn handle_socket(socket: WebSocket, state: Arc<GatewayState>, static_id: StaticId) {
    let (mut sender, mut receiver) = socket.split();
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Value>();

    // Responses leave in the order they were produced.
    let writer = tokio::spawn(async move {
        while let Some(value) = out_rx.recv().await {
            if sender.send(Message::Text(value.to_string())).await.is_err() {
                break;
            }
        }
    });

    info!(static_id = %static_id, "websocket connected");

    while let Some(frame) = receiver.next().await {
        let text = match frame {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                debug!(static_id = %static_id, error = %e, "websocket read failed");
                break;
            }
        };

        match InboundMessage::parse(&text) {
            Ok(message) => {
                let outcome = state.dispatcher.dispatch(&message, &static_id, &out_tx).await;
                debug!(static_id = %static_id, event = %message.event, ?outcome, "processed event");
            }
            Err(e) => debug!(static_id = %static_id, error = %e, "dropping undecodable frame"),
        }
    }

    drop(out_tx);
    let _ = writer.await;

    info!(static_id = %static_id, "websocket disconnected");
}
