// Copyright (c) 2025-2026 The Legion Project Authors
//
// SPDX-License-Identifier: Apache-2.0
use axum::extract::{Path, State};
use axum::Json;
use legion_persona::{EmotionalState, Persona};

use crate::error::ApiError;
use crate::state::GatewayState;

pub async fn spawn_agent(
    State(state): State<GatewayState>,
    Json(persona): Json<Persona>,
) -> Result<Json<Persona>, ApiError> {
    state.personas.spawn(persona.clone())?;
    Ok(Json(persona))
}

pub async fn list_agents(State(state): State<GatewayState>) -> Json<Vec<Persona>> {
    Json(state.personas.list_personas().await)
}

pub async fn get_agent(
    State(state): State<GatewayState>,
    Path(agent_id): Path<String>,
) -> Result<Json<Persona>, ApiError> {
    Ok(Json(state.personas.persona(&agent_id).await?))
}

pub async fn despawn_agent(
    State(state): State<GatewayState>,
    Path(agent_id): Path<String>,
) -> Result<(), ApiError> {
    state.personas.despawn(&agent_id).await?;
    Ok(())
}

pub async fn update_persona(
    State(state): State<GatewayState>,
    Path(agent_id): Path<String>,
    Json(persona): Json<Persona>,
) -> Result<Json<Persona>, ApiError> {
    let updated = state.personas.update_persona(&agent_id, persona).await?;
    Ok(Json(updated))
}

pub async fn override_emotional_state(
    State(state): State<GatewayState>,
    Path(agent_id): Path<String>,
    Json(new_state): Json<EmotionalState>,
) -> Result<(), ApiError> {
    state.personas.override_emotional_state(&agent_id, new_state).await?;
    Ok(())
}
