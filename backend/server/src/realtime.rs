//! # Real-time Channel
//!
//! WebSocket transport for live observers.
//!
//! - On connect: one `voteUpdate` carrying the current tally
//! - After that: one `voteUpdate` per admitted vote the observer keeps up with
//! - On disconnect: the subscription is removed before the task ends
//!
//! Clients never need to send anything. Incoming frames are only read to notice a close.
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::{state::State, tally::Tally};

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum ServerEvent {
    VoteUpdate { votes: Tally },
}

impl ServerEvent {
    pub fn to_message(&self) -> Result<Message, serde_json::Error> {
        serde_json::to_string(self).map(Message::Text)
    }
}

pub async fn serve_observer(socket: WebSocket, state: Arc<State>) {
    let mut observer = state.hub.subscribe();
    let id = observer.id();

    info!("A user connected: {id}");

    let (mut sink, mut stream) = socket.split();

    loop {
        tokio::select! {
            update = observer.next() => {
                let Some(votes) = update else {
                    break;
                };

                let message = match (ServerEvent::VoteUpdate { votes }).to_message() {
                    Ok(message) => message,
                    Err(e) => {
                        warn!("Failed to encode update for {id}: {e}");
                        break;
                    }
                };

                if let Err(e) = sink.send(message).await {
                    debug!("Send to {id} failed: {e}");
                    break;
                }
            }
            incoming = stream.next() => match incoming {
                Some(Ok(Message::Close(_))) | None => break,
                Some(Err(e)) => {
                    debug!("WebSocket error for {id}: {e}");
                    break;
                }
                Some(Ok(_)) => {}
            }
        }
    }

    state.hub.unsubscribe(observer);

    info!("A user disconnected: {id}");
}
