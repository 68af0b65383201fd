// Copyright (c) 2025-2026 The Legion Project Authors
//
// SPDX-License-Identifier: Apache-2.0
use std::collections::HashMap;
use std::sync::Arc;

use legion_bus::{Event, EventBus, EventType, LegionError};
use tokio::sync::Mutex as AsyncMutex;
use tracing::debug;

use crate::channel::{Channel, ChannelSpec, ChannelType, Message, MessageKind, SenderKind};

struct ChannelRecord {
    channel: Channel,
    messages: Vec<Message>,
}

/// Owns channels and messages exclusively.
/// `post_message` is the only path that produces a `Message` and the
/// only publisher of `MessagePosted` — the single-source-of-truth rule
/// that replaces the source system's dual notification/broadcast paths.
pub struct ChannelService {
    bus: EventBus,
    channels: std::sync::Mutex<HashMap<String, Arc<AsyncMutex<ChannelRecord>>>>,
}

impl ChannelService {
    pub fn new(bus: EventBus) -> Self {
        Self {
            bus,
            channels: std::sync::Mutex::new(HashMap::new()),
        }
    }

    fn record(&self, channel_id: &str) -> Option<Arc<AsyncMutex<ChannelRecord>>> {
        self.channels.lock().unwrap().get(channel_id).cloned()
    }

    pub fn create_channel(&self, spec: ChannelSpec) -> Result<Channel, LegionError> {
        if spec.channel_type == ChannelType::Dm && spec.members.len() != 2 {
            return Err(LegionError::ValidationFailed(
                "dm channels must have exactly two members".to_string(),
            ));
        }
        let mut channels = self.channels.lock().unwrap();
        if channels.contains_key(&spec.channel_id) {
            return Err(LegionError::ValidationFailed(format!(
                "channel already exists: {}",
                spec.channel_id
            )));
        }
        let channel = Channel {
            channel_id: spec.channel_id.clone(),
            channel_type: spec.channel_type,
            name: spec.name,
            description: spec.description,
            members: spec.members,
            created_at: chrono::Utc::now(),
            created_by: spec.created_by,
        };
        channels.insert(
            spec.channel_id.clone(),
            Arc::new(AsyncMutex::new(ChannelRecord { channel: channel.clone(), messages: Vec::new() })),
        );
        drop(channels);

        debug!(channel_id = %channel.channel_id, "channel created");
        self.bus.publish(Event::new(
            EventType::ChannelCreated,
            "channel_service",
            serde_json::json!({ "channel": channel }),
        ));
        Ok(channel)
    }

    pub async fn delete_channel(&self, channel_id: &str) -> Result<(), LegionError> {
        let removed = self.channels.lock().unwrap().remove(channel_id);
        removed.ok_or_else(|| LegionError::NotFound(channel_id.to_string()))?;

        debug!(channel_id = %channel_id, "channel deleted");
        self.bus.publish(Event::new(
            EventType::ChannelDeleted,
            "channel_service",
            serde_json::json!({ "channel_id": channel_id }),
        ));
        Ok(())
    }

    pub async fn get_channel(&self, channel_id: &str) -> Result<Channel, LegionError> {
        let cell = self.record(channel_id).ok_or_else(|| LegionError::NotFound(channel_id.to_string()))?;
        Ok(cell.lock().await.channel.clone())
    }

    /// All channels currently known, for `GET /channels`.
    pub async fn list_channels(&self) -> Vec<Channel> {
        let cells: Vec<_> = self.channels.lock().unwrap().values().cloned().collect();
        let mut out = Vec::with_capacity(cells.len());
        for cell in cells {
            out.push(cell.lock().await.channel.clone());
        }
        out
    }

    pub async fn add_member(&self, channel_id: &str, entity_id: &str) -> Result<(), LegionError> {
        let cell = self.record(channel_id).ok_or_else(|| LegionError::NotFound(channel_id.to_string()))?;
        let mut guard = cell.lock().await;
        if guard.channel.channel_type == ChannelType::Dm {
            return Err(LegionError::ValidationFailed(
                "cannot add members to a dm channel".to_string(),
            ));
        }
        guard.channel.members.insert(entity_id.to_string());
        drop(guard);

        self.bus.publish(Event::new(
            EventType::MemberJoined,
            "channel_service",
            serde_json::json!({ "channel_id": channel_id, "entity_id": entity_id }),
        ));
        Ok(())
    }

    pub async fn remove_member(&self, channel_id: &str, entity_id: &str) -> Result<(), LegionError> {
        let cell = self.record(channel_id).ok_or_else(|| LegionError::NotFound(channel_id.to_string()))?;
        let mut guard = cell.lock().await;
        guard.channel.members.remove(entity_id);
        drop(guard);

        self.bus.publish(Event::new(
            EventType::MemberLeft,
            "channel_service",
            serde_json::json!({ "channel_id": channel_id, "entity_id": entity_id }),
        ));
        Ok(())
    }

    /// Admit a message. Non-members are rejected with `NotAuthorized`
    /// unless `sender_kind` is `System` — the system sender may always
    /// post (e.g. turn-failure notices), matching "non-members cannot
    /// post except the system sender".
    pub async fn post_message(
        &self,
        channel_id: &str,
        sender_id: &str,
        sender_kind: SenderKind,
        content: &str,
        kind: MessageKind,
        metadata: serde_json::Map<String, serde_json::Value>,
    ) -> Result<Message, LegionError> {
        let cell = self.record(channel_id).ok_or_else(|| LegionError::NotFound(channel_id.to_string()))?;
        let mut guard = cell.lock().await;

        if sender_kind != SenderKind::System && !guard.channel.is_member(sender_id) {
            return Err(LegionError::NotAuthorized(format!(
                "{sender_id} is not a member of {channel_id}"
            )));
        }

        let message = Message {
            message_id: uuid::Uuid::new_v4(),
            channel_id: channel_id.to_string(),
            sender_id: sender_id.to_string(),
            sender_kind,
            content: content.to_string(),
            timestamp: chrono::Utc::now(),
            kind,
            metadata,
        };
        guard.messages.push(message.clone());
        drop(guard);

        debug!(channel_id = %channel_id, sender_id = %sender_id, "message posted");
        self.bus.publish(Event::new(
            EventType::MessagePosted,
            "channel_service",
            serde_json::json!({ "message": message }),
        ));
        Ok(message)
    }

    /// Return up to `limit` messages, most recent first, optionally only
    /// those strictly before `before` (exclusive cursor pagination).
    pub async fn list_messages(
        &self,
        channel_id: &str,
        before: Option<uuid::Uuid>,
        limit: usize,
    ) -> Result<Vec<Message>, LegionError> {
        let cell = self.record(channel_id).ok_or_else(|| LegionError::NotFound(channel_id.to_string()))?;
        let guard = cell.lock().await;
        let mut messages: Vec<Message> = match before {
            Some(cursor) => {
                let cutoff = guard.messages.iter().position(|m| m.message_id == cursor);
                match cutoff {
                    Some(idx) => guard.messages[..idx].to_vec(),
                    None => guard.messages.clone(),
                }
            }
            None => guard.messages.clone(),
        };
        messages.reverse();
        messages.truncate(limit);
        Ok(messages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(id: &str, members: &[&str]) -> ChannelSpec {
        ChannelSpec {
            channel_id: id.to_string(),
            channel_type: ChannelType::Public,
            name: id.to_string(),
            description: String::new(),
            members: members.iter().map(|m| m.to_string()).collect(),
            created_by: "commander".to_string(),
        }
    }

    #[tokio::test]
    async fn create_then_get_channel_round_trips() {
        let svc = ChannelService::new(EventBus::new(16));
        svc.create_channel(spec("general", &["commander", "echo"])).unwrap();
        let channel = svc.get_channel("general").await.unwrap();
        assert_eq!(channel.channel_id, "general");
    }

    #[tokio::test]
    async fn creating_duplicate_channel_fails() {
        let svc = ChannelService::new(EventBus::new(16));
        svc.create_channel(spec("general", &["commander"])).unwrap();
        let result = svc.create_channel(spec("general", &["commander"]));
        assert!(matches!(result, Err(LegionError::ValidationFailed(_))));
    }

    #[tokio::test]
    async fn dm_channel_requires_exactly_two_members() {
        let svc = ChannelService::new(EventBus::new(16));
        let mut s = spec("dm-1", &["commander"]);
        s.channel_type = ChannelType::Dm;
        let result = svc.create_channel(s);
        assert!(matches!(result, Err(LegionError::ValidationFailed(_))));
    }

    #[tokio::test]
    async fn member_can_post_message() {
        let svc = ChannelService::new(EventBus::new(16));
        svc.create_channel(spec("general", &["commander", "echo"])).unwrap();
        let message = svc
            .post_message(
                "general",
                "commander",
                SenderKind::User,
                "Hello, Legion.",
                MessageKind::Chat,
                serde_json::Map::new(),
            )
            .await
            .unwrap();
        assert_eq!(message.content, "Hello, Legion.");
    }

    #[tokio::test]
    async fn non_member_cannot_post_message() {
        let svc = ChannelService::new(EventBus::new(16));
        svc.create_channel(spec("general", &["commander"])).unwrap();
        let result = svc
            .post_message(
                "general",
                "stranger",
                SenderKind::User,
                "hi",
                MessageKind::Chat,
                serde_json::Map::new(),
            )
            .await;
        assert!(matches!(result, Err(LegionError::NotAuthorized(_))));
    }

    #[tokio::test]
    async fn system_sender_can_post_without_membership() {
        let svc = ChannelService::new(EventBus::new(16));
        svc.create_channel(spec("general", &["commander"])).unwrap();
        let result = svc
            .post_message(
                "general",
                "system",
                SenderKind::System,
                "turn failed",
                MessageKind::System,
                serde_json::Map::new(),
            )
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn each_posted_message_gets_a_unique_id() {
        let svc = ChannelService::new(EventBus::new(16));
        svc.create_channel(spec("general", &["commander"])).unwrap();
        let a = svc
            .post_message("general", "commander", SenderKind::User, "a", MessageKind::Chat, serde_json::Map::new())
            .await
            .unwrap();
        let b = svc
            .post_message("general", "commander", SenderKind::User, "b", MessageKind::Chat, serde_json::Map::new())
            .await
            .unwrap();
        assert_ne!(a.message_id, b.message_id);
    }

    #[tokio::test]
    async fn list_messages_returns_most_recent_first() {
        let svc = ChannelService::new(EventBus::new(16));
        svc.create_channel(spec("general", &["commander"])).unwrap();
        for i in 0..3 {
            svc.post_message(
                "general",
                "commander",
                SenderKind::User,
                &format!("m{i}"),
                MessageKind::Chat,
                serde_json::Map::new(),
            )
            .await
            .unwrap();
        }
        let messages = svc.list_messages("general", None, 10).await.unwrap();
        assert_eq!(messages[0].content, "m2");
    }

    #[tokio::test]
    async fn list_messages_respects_limit() {
        let svc = ChannelService::new(EventBus::new(16));
        svc.create_channel(spec("general", &["commander"])).unwrap();
        for i in 0..5 {
            svc.post_message(
                "general",
                "commander",
                SenderKind::User,
                &format!("m{i}"),
                MessageKind::Chat,
                serde_json::Map::new(),
            )
            .await
            .unwrap();
        }
        let messages = svc.list_messages("general", None, 2).await.unwrap();
        assert_eq!(messages.len(), 2);
    }

    #[tokio::test]
    async fn remove_member_prevents_further_posting() {
        let svc = ChannelService::new(EventBus::new(16));
        svc.create_channel(spec("general", &["commander", "echo"])).unwrap();
        svc.remove_member("general", "echo").await.unwrap();
        let result = svc
            .post_message("general", "echo", SenderKind::Agent, "hi", MessageKind::Chat, serde_json::Map::new())
            .await;
        assert!(matches!(result, Err(LegionError::NotAuthorized(_))));
    }

    #[tokio::test]
    async fn list_channels_returns_every_created_channel() {
        let svc = ChannelService::new(EventBus::new(16));
        svc.create_channel(spec("general", &["commander"])).unwrap();
        svc.create_channel(spec("random", &["commander"])).unwrap();
        let mut ids: Vec<String> = svc.list_channels().await.into_iter().map(|c| c.channel_id).collect();
        ids.sort();
        assert_eq!(ids, vec!["general".to_string(), "random".to_string()]);
    }

    #[tokio::test]
    async fn delete_unknown_channel_returns_not_found() {
        let svc = ChannelService::new(EventBus::new(16));
        let result = svc.delete_channel("ghost").await;
        assert!(matches!(result, Err(LegionError::NotFound(_))));
    }
}
