// Copyright (c) 2025-2026 The Legion Project Authors
//
// SPDX-License-Identifier: Apache-2.0
use serde::{Deserialize, Serialize};

/// Recognized configuration keys plus the
/// `auto_subscribe_defaults` field that resolves the Design Notes'
/// auto-subscription open question.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub runtime: RuntimeConfig,
    #[serde(default)]
    pub memory: MemoryConfig,
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
    /// Named provider configurations — lets an operator point different
    /// agents at different vendor endpoints without recompiling.
    #[serde(default)]
    pub providers: std::collections::HashMap<String, ModelConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            runtime: RuntimeConfig::default(),
            memory: MemoryConfig::default(),
            orchestrator: OrchestratorConfig::default(),
            model: ModelConfig::default(),
            gateway: GatewayConfig::default(),
            providers: Default::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    #[serde(default = "default_max_history_per_session")]
    pub max_history_per_session: usize,
    #[serde(default = "default_max_concurrent_invocations")]
    pub max_concurrent_invocations: usize,
    #[serde(default = "default_max_responders_per_message")]
    pub max_responders_per_message: usize,
    #[serde(default = "default_max_consecutive_agent_turns")]
    pub max_consecutive_agent_turns: u32,
    #[serde(default = "default_max_tool_depth")]
    pub max_tool_depth: u32,
    #[serde(default = "default_llm_timeout_seconds")]
    pub llm_timeout_seconds: u64,
    /// Tool execution timeout (`T_tool`, default 30s).
    #[serde(default = "default_tool_timeout_seconds")]
    pub tool_timeout_seconds: u64,
    /// Event-handler slowness watchdog (`T_handler`, default 5s).
    #[serde(default = "default_handler_watchdog_seconds")]
    pub handler_watchdog_seconds: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_history_per_session: default_max_history_per_session(),
            max_concurrent_invocations: default_max_concurrent_invocations(),
            max_responders_per_message: default_max_responders_per_message(),
            max_consecutive_agent_turns: default_max_consecutive_agent_turns(),
            max_tool_depth: default_max_tool_depth(),
            llm_timeout_seconds: default_llm_timeout_seconds(),
            tool_timeout_seconds: default_tool_timeout_seconds(),
            handler_watchdog_seconds: default_handler_watchdog_seconds(),
        }
    }
}

fn default_max_history_per_session() -> usize {
    100
}
fn default_max_concurrent_invocations() -> usize {
    16
}
fn default_max_responders_per_message() -> usize {
    8
}
fn default_max_consecutive_agent_turns() -> u32 {
    4
}
fn default_max_tool_depth() -> u32 {
    5
}
fn default_llm_timeout_seconds() -> u64 {
    60
}
fn default_tool_timeout_seconds() -> u64 {
    30
}
fn default_handler_watchdog_seconds() -> u64 {
    5
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    #[serde(default = "default_working_memory_size")]
    pub working_memory_size: usize,
    #[serde(default = "default_episodic_salience_threshold")]
    pub episodic_salience_threshold: f32,
    /// Number of episodic inserts between opportunistic semantic
    /// consolidation passes.
    #[serde(default = "default_consolidation_interval")]
    pub consolidation_interval: usize,
    /// Optional SQLite+FTS5 backing store path. `None` keeps everything
    /// in-memory, the default.
    #[serde(default)]
    pub sqlite_path: Option<std::path::PathBuf>,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            working_memory_size: default_working_memory_size(),
            episodic_salience_threshold: default_episodic_salience_threshold(),
            consolidation_interval: default_consolidation_interval(),
            sqlite_path: None,
        }
    }
}

fn default_working_memory_size() -> usize {
    50
}
fn default_episodic_salience_threshold() -> f32 {
    0.5
}
fn default_consolidation_interval() -> usize {
    10
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    #[serde(default = "default_mood_delta_cap")]
    pub mood_delta_cap: f32,
    #[serde(default = "default_opinion_delta_cap")]
    pub opinion_delta_cap: f32,
    /// Agent ids automatically joined to every newly created channel.
    /// Explicitly configurable, never hard-coded.
    #[serde(default)]
    pub auto_subscribe_defaults: Vec<String>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            mood_delta_cap: default_mood_delta_cap(),
            opinion_delta_cap: default_opinion_delta_cap(),
            auto_subscribe_defaults: Vec::new(),
        }
    }
}

fn default_mood_delta_cap() -> f32 {
    0.2
}
fn default_opinion_delta_cap() -> f32 {
    10.0
}

/// Default model provider selection; per-agent personas may override
/// `provider`/`name` (see `legion-persona::Persona`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model_name")]
    pub name: String,
    pub api_key_env: Option<String>,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            name: default_model_name(),
            api_key_env: None,
            api_key: None,
            base_url: None,
            max_tokens: None,
            temperature: None,
        }
    }
}

fn default_provider() -> String {
    "mock".to_string()
}
fn default_model_name() -> String {
    "mock-model".to_string()
}

/// HTTP/WebSocket edge listener configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// `host:port` to bind the REST + WebSocket server to. Default:
    /// `127.0.0.1:8080` (loopback only).
    #[serde(default = "default_gateway_bind")]
    pub bind: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self { bind: default_gateway_bind() }
    }
}

fn default_gateway_bind() -> String {
    "127.0.0.1:8080".to_string()
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_values() {
        let c = Config::default();
        assert_eq!(c.runtime.max_history_per_session, 100);
        assert_eq!(c.runtime.max_concurrent_invocations, 16);
        assert_eq!(c.runtime.max_responders_per_message, 8);
        assert_eq!(c.runtime.max_consecutive_agent_turns, 4);
        assert_eq!(c.runtime.max_tool_depth, 5);
        assert_eq!(c.runtime.llm_timeout_seconds, 60);
        assert_eq!(c.runtime.tool_timeout_seconds, 30);
        assert_eq!(c.runtime.handler_watchdog_seconds, 5);
        assert_eq!(c.memory.working_memory_size, 50);
        assert_eq!(c.memory.episodic_salience_threshold, 0.5);
        assert_eq!(c.orchestrator.mood_delta_cap, 0.2);
        assert_eq!(c.orchestrator.opinion_delta_cap, 10.0);
    }

    #[test]
    fn auto_subscribe_defaults_is_empty_by_default() {
        assert!(Config::default().orchestrator.auto_subscribe_defaults.is_empty());
    }

    #[test]
    fn gateway_binds_to_loopback_by_default() {
        assert_eq!(Config::default().gateway.bind, "127.0.0.1:8080");
    }

    #[test]
    fn deserializes_partial_yaml_with_defaults() {
        let yaml = "runtime:\n  max_tool_depth: 9\n";
        let c: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(c.runtime.max_tool_depth, 9);
        assert_eq!(c.runtime.max_history_per_session, 100);
    }
}
