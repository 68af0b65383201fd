// Copyright (c) 2025-2026 The Legion Project Authors
//
// SPDX-License-Identifier: Apache-2.0
use std::sync::Arc;

use async_trait::async_trait;
use legion_bus::LegionError;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::tool::{Tool, ToolCall, ToolOutput};

/// Narrow seam onto the Channel Service. `legion-tools`
/// never depends on `legion-channels` directly — that would make the
/// channel layer depend on the tool layer depend on the channel layer.
/// The agent runtime wires a concrete `ChannelPoster` (backed by the real
/// `ChannelService`) in at startup; tests wire in a stub.
#[async_trait]
pub trait ChannelPoster: Send + Sync {
    async fn post_message(&self, channel_id: &str, agent_id: &str, text: &str) -> Result<(), LegionError>;
}

#[derive(Debug, Deserialize)]
struct Args {
    channel_id: String,
    text: String,
}

/// The sole built-in tool: post a message into a channel
/// as the invoking agent. Always goes through `ChannelPoster` so
/// membership/authorization is enforced exactly once, in the Channel
/// Service, and `MessagePosted` is published from exactly one place.
pub struct SendChannelMessageTool {
    agent_id: String,
    poster: Arc<dyn ChannelPoster>,
}

impl SendChannelMessageTool {
    pub fn new(agent_id: impl Into<String>, poster: Arc<dyn ChannelPoster>) -> Self {
        Self { agent_id: agent_id.into(), poster }
    }
}

#[async_trait]
impl Tool for SendChannelMessageTool {
    fn name(&self) -> &str {
        "send_channel_message"
    }

    fn description(&self) -> &str {
        "Post a message into a channel as yourself."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "channel_id": { "type": "string", "description": "Target channel id" },
                "text": { "type": "string", "description": "Message body" },
            },
            "required": ["channel_id", "text"],
        })
    }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let args: Args = match serde_json::from_value(call.args.clone()) {
            Ok(a) => a,
            Err(e) => return ToolOutput::err(&call.id, format!("invalid arguments: {e}")),
        };
        if args.text.trim().is_empty() {
            return ToolOutput::err(&call.id, "text must not be empty");
        }
        match self.poster.post_message(&args.channel_id, &self.agent_id, &args.text).await {
            Ok(()) => ToolOutput::ok(&call.id, "message posted"),
            Err(e) => ToolOutput::err(&call.id, e.to_string()),
        }
    }
}
