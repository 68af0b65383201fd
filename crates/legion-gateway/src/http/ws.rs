// Copyright (c) 2025-2026 The Legion Project Authors
//
// SPDX-License-Identifier: Apache-2.0
//! Real-time event push — translates the internal event bus into a JSON
//! WebSocket stream. Browsers subscribe by connecting;
//! there is no client-to-server command channel here, unlike the control
//! socket this bridge is modeled on — the gateway's HTTP endpoints already
//! cover every write path.

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use chrono::{DateTime, Utc};
use legion_bus::{Event, EventFilter, EventType};
use serde::Serialize;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::state::GatewayState;

/// Event types pushed to WebSocket clients — `MessagePosted` plus the
/// agent/channel lifecycle events. `TurnStarted` / `TurnCompleted` /
/// `TurnFailed` are left internal for now since no UI needs them yet.
const PUSHED_EVENT_TYPES: &[EventType] = &[
    EventType::MessagePosted,
    EventType::ChannelCreated,
    EventType::ChannelDeleted,
    EventType::MemberJoined,
    EventType::MemberLeft,
    EventType::AgentSpawned,
    EventType::AgentDespawned,
    EventType::AgentStatusChanged,
    EventType::AgentEmotionalStateUpdated,
    EventType::AgentPersonaUpdated,
];

/// Envelope shape for pushed events: every envelope carries
/// `message_id` when applicable so clients can dedup against whatever they
/// already rendered optimistically.
#[derive(Debug, Clone, Serialize)]
struct EventEnvelope {
    event_type: EventType,
    payload: serde_json::Value,
    timestamp: DateTime<Utc>,
    event_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    message_id: Option<Uuid>,
}

impl From<Event> for EventEnvelope {
    fn from(event: Event) -> Self {
        let message_id = event
            .payload
            .get("message")
            .and_then(|m| m.get("message_id"))
            .and_then(|id| id.as_str())
            .and_then(|s| Uuid::parse_str(s).ok());
        Self {
            event_type: event.event_type,
            payload: event.payload,
            timestamp: event.timestamp,
            event_id: event.event_id,
            message_id,
        }
    }
}

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<GatewayState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(mut socket: WebSocket, state: GatewayState) {
    let (tx, mut rx) = tokio::sync::mpsc::channel::<Event>(256);
    let handle = state.bus.subscribe(
        EventFilter::Types(PUSHED_EVENT_TYPES.to_vec()),
        std::sync::Arc::new(ForwardingHandler { tx }),
    );

    loop {
        tokio::select! {
            msg = socket.recv() => {
                match msg {
                    Some(Ok(Message::Ping(data))) => {
                        if socket.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {} // clients have nothing to send us but pings
                    Some(Err(e)) => {
                        debug!("WebSocket recv error: {e}");
                        break;
                    }
                }
            }
            event = rx.recv() => {
                match event {
                    Some(event) => send_event(&mut socket, event).await,
                    None => break,
                }
            }
        }
    }

    state.bus.unsubscribe(handle);
    debug!("WebSocket connection closed");
}

struct ForwardingHandler {
    tx: tokio::sync::mpsc::Sender<Event>,
}

#[async_trait]
impl legion_bus::EventHandler for ForwardingHandler {
    async fn handle(&self, event: Event) {
        if self.tx.send(event).await.is_err() {
            warn!("WebSocket client dropped before forwarding finished");
        }
    }
}

async fn send_event(socket: &mut WebSocket, event: Event) {
    let envelope = EventEnvelope::from(event);
    if let Ok(json) = serde_json::to_string(&envelope) {
        let _ = socket.send(Message::Text(json)).await;
    }
}
