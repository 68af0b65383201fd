// Copyright (c) 2025-2026 The Legion Project Authors
//
// SPDX-License-Identifier: Apache-2.0
use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Channel kind. DM channels carry exactly two members for
/// their entire lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelType {
    Public,
    Private,
    Dm,
}

/// Who originated a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SenderKind {
    User,
    Agent,
    System,
}

/// Message category; `chat` is the default conversational kind, the
/// others mark system/task/status notices that share the same transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Chat,
    System,
    Task,
    Status,
}

/// A single posted message. `message_id` is globally
/// unique and stable for the lifetime of the process — every downstream
/// consumer of `MessagePosted` sees the same id for the same message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub message_id: uuid::Uuid,
    pub channel_id: String,
    pub sender_id: String,
    pub sender_kind: SenderKind,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub kind: MessageKind,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

/// A channel's identity and membership. `members` holds
/// both agent ids and user ids — the set is entity-kind-agnostic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Channel {
    pub channel_id: String,
    pub channel_type: ChannelType,
    pub name: String,
    pub description: String,
    pub members: HashSet<String>,
    pub created_at: DateTime<Utc>,
    pub created_by: String,
}

impl Channel {
    pub fn is_member(&self, entity_id: &str) -> bool {
        self.members.contains(entity_id)
    }
}

/// Request payload for `ChannelService::create_channel`.
#[derive(Debug, Clone)]
pub struct ChannelSpec {
    pub channel_id: String,
    pub channel_type: ChannelType,
    pub name: String,
    pub description: String,
    pub members: HashSet<String>,
    pub created_by: String,
}
