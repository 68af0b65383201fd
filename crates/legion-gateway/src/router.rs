// Copyright (c) 2025-2026 The Legion Project Authors
//
// SPDX-License-Identifier: Apache-2.0
use axum::routing::{delete, get, post, put};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};

use crate::http::{agents, channels, ws};
use crate::state::GatewayState;

/// Builds the full HTTP REST + WebSocket surface. No
/// bearer-token or TLS layer here — those belong to a deployment-specific
/// reverse proxy, not this crate.
pub fn build_router(state: GatewayState) -> Router {
    Router::new()
        .route("/channels", post(channels::create_channel).get(channels::list_channels))
        .route("/channels/:channel_id", get(channels::get_channel))
        .route("/channels/:channel_id/members", post(channels::add_member))
        .route("/channels/:channel_id/members/:entity_id", delete(channels::remove_member))
        .route("/channels/:channel_id/messages", post(channels::post_message).get(channels::list_messages))
        .route("/agents", post(agents::spawn_agent).get(agents::list_agents))
        .route("/agents/:agent_id", get(agents::get_agent).delete(agents::despawn_agent))
        .route("/agents/:agent_id/persona", put(agents::update_persona))
        .route("/agents/:agent_id/emotional-state", post(agents::override_emotional_state))
        .route("/ws", get(ws::ws_handler))
        .with_state(state)
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(CorsLayer::permissive())
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use legion_bus::EventBus;
    use legion_channels::{ChannelService, ChannelSpec, ChannelType};
    use legion_persona::{Persona, PersonaEngine};
    use tower::ServiceExt;

    use super::*;

    fn new_state() -> GatewayState {
        let bus = EventBus::new(16);
        let channels = Arc::new(ChannelService::new(bus.clone()));
        let personas = Arc::new(PersonaEngine::new(bus.clone(), 0.2, 10.0));
        GatewayState::new(channels, personas, bus)
    }

    fn persona(agent_id: &str) -> Persona {
        Persona {
            agent_id: agent_id.to_string(),
            name: "Echo".into(),
            base_personality: "repeats the last message".into(),
            quirks: vec![],
            catchphrases: vec![],
            expertise_tags: vec![],
            allowed_tools: vec![],
            model: "mock".into(),
            temperature: 0.7,
            max_tokens: 1024,
        }
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn create_channel_then_get_it_round_trips() {
        let state = new_state();
        let router = build_router(state);

        let create_body = serde_json::json!({
            "channel_id": "general",
            "channel_type": "public",
            "name": "General",
            "members": ["commander"],
            "created_by": "commander",
        });
        let response = router
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/channels")
                    .header("content-type", "application/json")
                    .body(Body::from(create_body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = router
            .oneshot(Request::builder().uri("/channels/general").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["channel_id"], "general");
    }

    #[tokio::test]
    async fn get_unknown_channel_returns_404() {
        let router = build_router(new_state());
        let response = router
            .oneshot(Request::builder().uri("/channels/ghost").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn spawn_agent_then_list_agents() {
        let state = new_state();
        let router = build_router(state);

        let response = router
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/agents")
                    .header("content-type", "application/json")
                    .body(Body::from(serde_json::to_string(&persona("echo")).unwrap()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = router
            .oneshot(Request::builder().uri("/agents").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let json = body_json(response).await;
        assert_eq!(json.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn post_message_requires_membership() {
        let state = new_state();
        state
            .channels
            .create_channel(ChannelSpec {
                channel_id: "general".into(),
                channel_type: ChannelType::Public,
                name: "General".into(),
                description: String::new(),
                members: HashSet::new(),
                created_by: "commander".into(),
            })
            .unwrap();
        let router = build_router(state);

        let response = router
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/channels/general/messages")
                    .header("content-type", "application/json")
                    .body(Body::from(serde_json::json!({ "sender": "stranger", "content": "hi" }).to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }
}
