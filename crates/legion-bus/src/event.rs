// Copyright (c) 2025-2026 The Legion Project Authors
//
// SPDX-License-Identifier: Apache-2.0
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Closed set of internal event types. The bus is the
/// only internal propagation channel; components must not call each
/// other's mutators directly in response to the same logical event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    ChannelCreated,
    ChannelDeleted,
    MemberJoined,
    MemberLeft,
    MessagePosted,
    AgentSpawned,
    AgentDespawned,
    AgentStatusChanged,
    AgentEmotionalStateUpdated,
    AgentPersonaUpdated,
    TurnStarted,
    TurnCompleted,
    TurnFailed,
}

/// An immutable fact published on the bus. `payload` is left as a
/// generic JSON value rather than a closed enum so `legion-bus` carries
/// no dependency on domain crates (`legion-channels`, `legion-persona`,
/// …) that would otherwise need it — those crates build the payload
/// with `serde_json::json!` and consumers deserialize it back into
/// their own domain type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub event_id: Uuid,
    pub event_type: EventType,
    pub payload: serde_json::Value,
    pub timestamp: DateTime<Utc>,
    /// Component that produced this event, e.g. `"channel_service"`.
    pub source: String,
}

impl Event {
    pub fn new(event_type: EventType, source: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            event_type,
            payload,
            timestamp: Utc::now(),
            source: source.into(),
        }
    }
}
