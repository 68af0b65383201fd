// Copyright (c) 2025-2026 The Legion Project Authors
//
// SPDX-License-Identifier: Apache-2.0
use serde_json::Value;

/// Agent-runtime-level turn event — distinct from
/// `legion_model::ResponseEvent`, which is the raw model-wire vocabulary.
/// A stream yields zero or more non-terminal events followed by exactly
/// one of the two terminal variants.
#[derive(Debug, Clone)]
pub enum TurnEvent {
    PartialText(String),
    ToolCallRequested { id: String, name: String, arguments: Value },
    ToolResult { id: String, content: String, is_error: bool },
    FinalText(String),
    Failed(String),
}

impl TurnEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TurnEvent::FinalText(_) | TurnEvent::Failed(_))
    }
}
