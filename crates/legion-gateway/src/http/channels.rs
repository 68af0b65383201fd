// Copyright (c) 2025-2026 The Legion Project Authors
//
// SPDX-License-Identifier: Apache-2.0
use std::collections::HashSet;

use axum::extract::{Path, Query, State};
use axum::Json;
use legion_channels::{Channel, ChannelSpec, ChannelType, Message, MessageKind, SenderKind};
use serde::Deserialize;

use crate::error::ApiError;
use crate::state::GatewayState;

#[derive(Debug, Deserialize)]
pub struct CreateChannelRequest {
    pub channel_id: String,
    #[serde(default = "default_channel_type")]
    pub channel_type: ChannelType,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub members: HashSet<String>,
    pub created_by: String,
}

fn default_channel_type() -> ChannelType {
    ChannelType::Public
}

pub async fn create_channel(
    State(state): State<GatewayState>,
    Json(req): Json<CreateChannelRequest>,
) -> Result<Json<Channel>, ApiError> {
    let channel = state.channels.create_channel(ChannelSpec {
        channel_id: req.channel_id,
        channel_type: req.channel_type,
        name: req.name,
        description: req.description,
        members: req.members,
        created_by: req.created_by,
    })?;
    Ok(Json(channel))
}

/// Optional `member_of` filter narrows the listing to channels a given
/// entity belongs to; omitted, every channel is returned.
#[derive(Debug, Deserialize)]
pub struct ListChannelsQuery {
    #[serde(default)]
    pub member_of: Option<String>,
}

pub async fn list_channels(State(state): State<GatewayState>, Query(query): Query<ListChannelsQuery>) -> Json<Vec<Channel>> {
    let channels = state.channels.list_channels().await;
    let filtered = match query.member_of {
        Some(entity_id) => channels.into_iter().filter(|c| c.is_member(&entity_id)).collect(),
        None => channels,
    };
    Json(filtered)
}

pub async fn get_channel(
    State(state): State<GatewayState>,
    Path(channel_id): Path<String>,
) -> Result<Json<Channel>, ApiError> {
    Ok(Json(state.channels.get_channel(&channel_id).await?))
}

#[derive(Debug, Deserialize)]
pub struct AddMemberRequest {
    pub entity_id: String,
}

pub async fn add_member(
    State(state): State<GatewayState>,
    Path(channel_id): Path<String>,
    Json(req): Json<AddMemberRequest>,
) -> Result<(), ApiError> {
    state.channels.add_member(&channel_id, &req.entity_id).await?;
    Ok(())
}

pub async fn remove_member(
    State(state): State<GatewayState>,
    Path((channel_id, entity_id)): Path<(String, String)>,
) -> Result<(), ApiError> {
    state.channels.remove_member(&channel_id, &entity_id).await?;
    Ok(())
}

#[derive(Debug, Deserialize)]
pub struct PostMessageRequest {
    pub sender: String,
    pub content: String,
}

pub async fn post_message(
    State(state): State<GatewayState>,
    Path(channel_id): Path<String>,
    Json(req): Json<PostMessageRequest>,
) -> Result<Json<Message>, ApiError> {
    let message = state
        .channels
        .post_message(&channel_id, &req.sender, SenderKind::User, &req.content, MessageKind::Chat, serde_json::Map::new())
        .await?;
    Ok(Json(message))
}

#[derive(Debug, Deserialize)]
pub struct ListMessagesQuery {
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub before: Option<uuid::Uuid>,
}

fn default_limit() -> usize {
    50
}

pub async fn list_messages(
    State(state): State<GatewayState>,
    Path(channel_id): Path<String>,
    Query(query): Query<ListMessagesQuery>,
) -> Result<Json<Vec<Message>>, ApiError> {
    let messages = state.channels.list_messages(&channel_id, query.before, query.limit).await?;
    Ok(Json(messages))
}
