//! services/api/src/web/live.rs
//!
//! The WebSocket feed of live rating summaries for one party.
//!
//! This is a one-directional pipeline: the repository's subscription
//! emits full party snapshots, each snapshot is run through the pure
//! aggregator, and the recomputed summary is pushed to the client.
//! Nothing is patched in place, so reconnecting always converges on the
//! same figures a fresh page load would compute.

use axum::{
    extract::{
        ws::{Message, WebSocket},
        Path, State, WebSocketUpgrade,
    },
    response::Response,
    Extension,
};
use baliseboxd_core::ratings::RatingScale;
use futures::{
    stream::{SplitSink, StreamExt},
    SinkExt,
};
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::web::protocol::{RatingSummary, ServerMessage};
use crate::web::state::AppState;

/// The handler for upgrading HTTP requests to WebSocket connections.
pub async fn live_ratings_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(party_id): Path<Uuid>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state, party_id, user_id))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>, party_id: Uuid, user_id: Uuid) {
    info!(
        "Live rating feed opened for party {} by user {}",
        party_id, user_id
    );
    let scale = RatingScale::HALF_STARS;
    let (mut sender, mut receiver) = socket.split();

    // --- 1. Initial snapshot ---
    // Sent up front so the client renders without waiting for a mutation.
    let initial = match state.parties.get_party(party_id).await {
        Ok(party) => ServerMessage::RatingsUpdated {
            summary: RatingSummary::compute(&party, &scale),
        },
        Err(e) => {
            error!("Failed to load party {}: {:?}", party_id, e);
            let msg = ServerMessage::Error {
                message: "Failed to load party data.".to_string(),
            };
            let _ = send_message(&mut sender, &msg).await;
            return;
        }
    };
    if send_message(&mut sender, &initial).await.is_err() {
        return;
    }

    // --- 2. Subscribe and pump snapshots through the aggregator ---
    let mut feed = match state.parties.subscribe(party_id).await {
        Ok(feed) => feed,
        Err(e) => {
            error!("Failed to subscribe to party {}: {:?}", party_id, e);
            let msg = ServerMessage::Error {
                message: "Failed to subscribe to party updates.".to_string(),
            };
            let _ = send_message(&mut sender, &msg).await;
            return;
        }
    };

    loop {
        tokio::select! {
            snapshot = feed.next() => {
                match snapshot {
                    Some(party) => {
                        let msg = ServerMessage::RatingsUpdated {
                            summary: RatingSummary::compute(&party, &scale),
                        };
                        if send_message(&mut sender, &msg).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }
            incoming = receiver.next() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | None => {
                        info!("Live rating feed client disconnected.");
                        break;
                    }
                    Some(Ok(_)) => {} // the feed is one-directional; ignore chatter
                    Some(Err(e)) => {
                        warn!("WebSocket receive error: {}", e);
                        break;
                    }
                }
            }
        }
    }

    info!("Live rating feed closed for party {}", party_id);
}

async fn send_message(
    sender: &mut SplitSink<WebSocket, Message>,
    msg: &ServerMessage,
) -> Result<(), axum::Error> {
    let json = serde_json::to_string(msg).unwrap_or_default();
    sender.send(Message::Text(json.into())).await
}
