// Copyright (c) 2025-2026 The Legion Project Authors
//
// SPDX-License-Identifier: Apache-2.0
use async_trait::async_trait;
use serde_json::Value;

/// A single tool invocation requested by the model, surfaced by
/// `legion-model::ResponseEvent::ToolCall` and threaded through the turn
/// state machine.
#[derive(Debug, Clone)]
pub struct ToolCall {
    /// Opaque identifier returned by the model, forwarded verbatim.
    pub id: String,
    pub name: String,
    pub args: Value,
}

/// Result of executing a tool. `is_error` lets a failed tool invocation
/// flow back into the conversation as a tool result rather than aborting
/// the turn.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub call_id: String,
    pub content: String,
    pub is_error: bool,
}

impl ToolOutput {
    pub fn ok(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            call_id: call_id.into(),
            content: content.into(),
            is_error: false,
        }
    }

    pub fn err(call_id: impl Into<String>, msg: impl Into<String>) -> Self {
        Self {
            call_id: call_id.into(),
            content: msg.into(),
            is_error: true,
        }
    }
}

/// Trait every built-in tool implements. Kept deliberately small relative
/// to a general-purpose coding agent's tool surface: Gemini Legion's only
/// tool-shaped side effect is posting a channel message.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    /// JSON Schema for the tool's parameters, surfaced to the model via
    /// `legion_model::ToolSchema`.
    fn parameters_schema(&self) -> Value;
    /// Errors are wrapped in `ToolOutput::err`, never propagated — a tool
    /// failure is reported back to the model, not the caller of the turn.
    async fn execute(&self, call: &ToolCall) -> ToolOutput;
}
