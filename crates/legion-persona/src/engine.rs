// Copyright (c) 2025-2026 The Legion Project Authors
//
// SPDX-License-Identifier: Apache-2.0
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use legion_bus::{Event, EventBus, EventFilter, EventHandler, EventType, LegionError};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex as AsyncMutex;
use tracing::debug;

use crate::emotional_state::{Appraisal, EmotionalState};
use crate::persona::Persona;

/// Lifecycle status of a spawned agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Idle,
    Busy,
    Despawned,
}

struct AgentRecord {
    persona: Persona,
    emotional_state: EmotionalState,
    status: AgentStatus,
}

/// Registry of spawned agents: personas, emotional state, and liveness.
/// Each agent's record sits behind its own async mutex; the outer
/// `std::sync::Mutex` only guards the registry map itself, mirroring the
/// locking shape in `legion_sessions::SessionStore`.
pub struct PersonaEngine {
    bus: EventBus,
    agents: std::sync::Mutex<HashMap<String, Arc<AsyncMutex<AgentRecord>>>>,
    mood_delta_cap: f32,
    opinion_delta_cap: f32,
}

impl PersonaEngine {
    pub fn new(bus: EventBus, mood_delta_cap: f32, opinion_delta_cap: f32) -> Self {
        Self {
            bus,
            agents: std::sync::Mutex::new(HashMap::new()),
            mood_delta_cap,
            opinion_delta_cap,
        }
    }

    fn record(&self, agent_id: &str) -> Option<Arc<AsyncMutex<AgentRecord>>> {
        self.agents.lock().unwrap().get(agent_id).cloned()
    }

    /// Register a new agent with an initial emotional state and publish
    /// `AgentSpawned`. Re-spawning an already-live agent_id replaces its
    /// persona and resets emotional state, matching "spawn is idempotent
    /// on agent_id".
    pub fn spawn(&self, persona: Persona) -> Result<(), LegionError> {
        persona.validate().map_err(LegionError::ValidationFailed)?;
        let agent_id = persona.agent_id.clone();
        let record = AgentRecord {
            persona: persona.clone(),
            emotional_state: EmotionalState::initial(),
            status: AgentStatus::Idle,
        };
        self.agents
            .lock()
            .unwrap()
            .insert(agent_id.clone(), Arc::new(AsyncMutex::new(record)));

        debug!(agent_id = %agent_id, "agent spawned");
        self.bus.publish(Event::new(
            EventType::AgentSpawned,
            "persona_engine",
            serde_json::json!({ "agent_id": agent_id, "persona": persona }),
        ));
        Ok(())
    }

    /// Remove an agent from the registry and publish `AgentDespawned`.
    /// Any turn in flight for this agent is expected to observe
    /// `Cancelled` from the agent runtime independently — the engine
    /// itself holds no handle to in-flight turns.
    pub async fn despawn(&self, agent_id: &str) -> Result<(), LegionError> {
        let removed = self.agents.lock().unwrap().remove(agent_id);
        let record = removed.ok_or_else(|| LegionError::NotFound(agent_id.to_string()))?;
        record.lock().await.status = AgentStatus::Despawned;

        debug!(agent_id = %agent_id, "agent despawned");
        self.bus.publish(Event::new(
            EventType::AgentDespawned,
            "persona_engine",
            serde_json::json!({ "agent_id": agent_id }),
        ));
        Ok(())
    }

    /// All agent ids currently registered, spawned or despawned. Used by
    /// the Orchestrator to tell agent members apart from human/system
    /// members when selecting responders.
    pub fn agent_ids(&self) -> Vec<String> {
        self.agents.lock().unwrap().keys().cloned().collect()
    }

    pub async fn persona(&self, agent_id: &str) -> Result<Persona, LegionError> {
        let cell = self.record(agent_id).ok_or_else(|| LegionError::NotFound(agent_id.to_string()))?;
        Ok(cell.lock().await.persona.clone())
    }

    /// Replace the mutable fields of a persona, rejecting any attempt to
    /// change an immutable field.
    pub async fn update_persona(&self, agent_id: &str, updated: Persona) -> Result<Persona, LegionError> {
        let cell = self.record(agent_id).ok_or_else(|| LegionError::NotFound(agent_id.to_string()))?;
        updated.validate().map_err(LegionError::ValidationFailed)?;

        let mut guard = cell.lock().await;
        if updated.agent_id != guard.persona.agent_id {
            return Err(LegionError::ValidationFailed(
                "agent_id is immutable".to_string(),
            ));
        }
        guard.persona = updated.clone();
        drop(guard);

        self.bus.publish(Event::new(
            EventType::AgentPersonaUpdated,
            "persona_engine",
            serde_json::json!({ "agent_id": agent_id, "persona": updated }),
        ));
        Ok(cell.lock().await.persona.clone())
    }

    pub async fn emotional_state(&self, agent_id: &str) -> Result<EmotionalState, LegionError> {
        let cell = self.record(agent_id).ok_or_else(|| LegionError::NotFound(agent_id.to_string()))?;
        Ok(cell.lock().await.emotional_state.clone())
    }

    /// All personas currently registered, for `GET /agents`.
    pub async fn list_personas(&self) -> Vec<Persona> {
        let ids = self.agent_ids();
        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            if let Ok(p) = self.persona(&id).await {
                out.push(p);
            }
        }
        out
    }

    /// Administrative override of an agent's full emotional state
    /// (`POST /agents/{id}/emotional-state`). Bypasses the bounded-delta
    /// path in `observe_turn` — callers are trusted to supply an
    /// already-valid state.
    pub async fn override_emotional_state(&self, agent_id: &str, state: EmotionalState) -> Result<(), LegionError> {
        let cell = self.record(agent_id).ok_or_else(|| LegionError::NotFound(agent_id.to_string()))?;
        cell.lock().await.emotional_state = state.clone();
        self.bus.publish(Event::new(
            EventType::AgentEmotionalStateUpdated,
            "persona_engine",
            serde_json::json!({ "agent_id": agent_id, "emotional_state": state }),
        ));
        Ok(())
    }

    pub async fn set_status(&self, agent_id: &str, status: AgentStatus) -> Result<(), LegionError> {
        let cell = self.record(agent_id).ok_or_else(|| LegionError::NotFound(agent_id.to_string()))?;
        cell.lock().await.status = status;
        self.bus.publish(Event::new(
            EventType::AgentStatusChanged,
            "persona_engine",
            serde_json::json!({ "agent_id": agent_id, "status": status }),
        ));
        Ok(())
    }

    pub async fn status(&self, agent_id: &str) -> Result<AgentStatus, LegionError> {
        let cell = self.record(agent_id).ok_or_else(|| LegionError::NotFound(agent_id.to_string()))?;
        Ok(cell.lock().await.status)
    }

    /// Apply a turn's appraisal to the agent's emotional state and
    /// publish `AgentEmotionalStateUpdated` with the resulting snapshot.
    pub async fn observe_turn(&self, agent_id: &str, appraisal: &Appraisal) -> Result<EmotionalState, LegionError> {
        let cell = self.record(agent_id).ok_or_else(|| LegionError::NotFound(agent_id.to_string()))?;
        let mut guard = cell.lock().await;
        guard
            .emotional_state
            .observe_turn(appraisal, self.mood_delta_cap, self.opinion_delta_cap);
        let snapshot = guard.emotional_state.clone();
        drop(guard);

        self.bus.publish(Event::new(
            EventType::AgentEmotionalStateUpdated,
            "persona_engine",
            serde_json::json!({ "agent_id": agent_id, "emotional_state": snapshot }),
        ));
        Ok(snapshot)
    }

    /// Deterministic emotional cue for the next turn's prompt, optionally
    /// informed by the opinion held of `addressee`.
    pub async fn emotional_cue(&self, agent_id: &str, addressee: Option<&str>) -> Result<String, LegionError> {
        let cell = self.record(agent_id).ok_or_else(|| LegionError::NotFound(agent_id.to_string()))?;
        Ok(cell.lock().await.emotional_state.compose_cue(addressee))
    }
}
