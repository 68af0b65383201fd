// Copyright (c) 2025-2026 The Legion Project Authors
//
// SPDX-License-Identifier: Apache-2.0
use std::sync::Arc;

use async_trait::async_trait;
use legion_bus::LegionError;
use legion_tools::ChannelPoster;

use crate::channel::{MessageKind, SenderKind};
use crate::service::ChannelService;

/// Adapts [`ChannelService`] to the [`ChannelPoster`] seam
/// `legion-tools::SendChannelMessageTool` calls through, keeping the tool
/// crate decoupled from the channel crate's own types.
pub struct ServiceChannelPoster {
    service: Arc<ChannelService>,
}

impl ServiceChannelPoster {
    pub fn new(service: Arc<ChannelService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl ChannelPoster for ServiceChannelPoster {
    async fn post_message(&self, channel_id: &str, agent_id: &str, text: &str) -> Result<(), LegionError> {
        self.service
            .post_message(
                channel_id,
                agent_id,
                SenderKind::Agent,
                text,
                MessageKind::Chat,
                serde_json::Map::new(),
            )
            .await
            .map(|_| ())
    }
}
