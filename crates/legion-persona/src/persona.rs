// Copyright (c) 2025-2026 The Legion Project Authors
//
// SPDX-License-Identifier: Apache-2.0
use serde::{Deserialize, Serialize};

/// Static persona, fixed for the agent's lifetime. Mutable
/// emotional state lives separately in [`crate::EmotionalState`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Persona {
    pub agent_id: String,
    pub name: String,
    pub base_personality: String,
    #[serde(default)]
    pub quirks: Vec<String>,
    #[serde(default)]
    pub catchphrases: Vec<String>,
    #[serde(default)]
    pub expertise_tags: Vec<String>,
    #[serde(default)]
    pub allowed_tools: Vec<String>,
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    1024
}

impl Persona {
    /// Fields an update request is never allowed to change (`PUT
    /// /agents/{id}/persona` rejects writes to these).
    pub fn immutable_field_names() -> &'static [&'static str] {
        &["agent_id"]
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.agent_id.trim().is_empty() {
            return Err("agent_id must not be empty".into());
        }
        if self.name.trim().is_empty() {
            return Err("name must not be empty".into());
        }
        if self.base_personality.trim().is_empty() {
            return Err("base_personality must not be empty".into());
        }
        Ok(())
    }
}
