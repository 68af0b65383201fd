// Copyright (c) 2025-2026 The Legion Project Authors
//
// SPDX-License-Identifier: Apache-2.0
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use legion_agent_runtime::{AgentRuntime, InvokeRequest, TurnEvent};
use legion_bus::{Event, EventBus, EventFilter, EventHandler, EventType};
use legion_channels::{Channel, ChannelService, ChannelType, Message as ChannelMessage, MessageKind, SenderKind, ServiceChannelPoster};
use legion_memory::{estimate_salience, MemoryEngine, TurnRecord};
use legion_model::ModelProvider;
use legion_persona::{AgentStatus, Appraisal, PersonaEngine};
use legion_tools::{ChannelPoster, SendChannelMessageTool, ToolRegistry};
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::selection::{select_responders, Candidate};

/// Tunables the Orchestrator needs from configuration.
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub max_consecutive_agent_turns: u32,
    pub max_responders_per_message: usize,
    pub history_cue_window: usize,
    pub history_cue_retrieved_items: usize,
    pub auto_subscribe_defaults: Vec<String>,
}

/// Wires C2–C6 together around `MessagePosted`: selects responders,
/// opens a turn per selected agent, and re-publishes agent replies back
/// into the channel.
pub struct Orchestrator {
    bus: EventBus,
    channels: Arc<ChannelService>,
    personas: Arc<PersonaEngine>,
    memory: Arc<MemoryEngine>,
    runtime: Arc<AgentRuntime>,
    poster: Arc<dyn ChannelPoster>,
    models: std::sync::Mutex<HashMap<String, Arc<dyn ModelProvider>>>,
    default_model: Arc<dyn ModelProvider>,
    settings: OrchestratorSettings,
    cycle_state: std::sync::Mutex<HashMap<String, HashMap<String, u32>>>,
    in_flight: std::sync::Mutex<HashMap<String, Vec<oneshot::Sender<()>>>>,
}

impl Orchestrator {
    pub fn new(
        bus: EventBus,
        channels: Arc<ChannelService>,
        personas: Arc<PersonaEngine>,
        memory: Arc<MemoryEngine>,
        runtime: Arc<AgentRuntime>,
        default_model: Arc<dyn ModelProvider>,
        settings: OrchestratorSettings,
    ) -> Arc<Self> {
        let poster: Arc<dyn ChannelPoster> = Arc::new(ServiceChannelPoster::new(channels.clone()));
        Arc::new(Self {
            bus,
            channels,
            personas,
            memory,
            runtime,
            poster,
            models: std::sync::Mutex::new(HashMap::new()),
            default_model,
            settings,
            cycle_state: std::sync::Mutex::new(HashMap::new()),
            in_flight: std::sync::Mutex::new(HashMap::new()),
        })
    }

    /// Register a model provider under a name a persona's `model` field
    /// can reference; personas whose `model` has no registered provider
    /// fall back to the default.
    pub fn register_model(&self, name: impl Into<String>, provider: Arc<dyn ModelProvider>) {
        self.models.lock().unwrap().insert(name.into(), provider);
    }

    fn model_for(&self, name: &str) -> Arc<dyn ModelProvider> {
        self.models
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .unwrap_or_else(|| self.default_model.clone())
    }

    /// Subscribe to the bus and start reacting to events. Returned
    /// handles must be kept alive for as long as the orchestrator should
    /// run; dropping them does not stop delivery (see
    /// `legion_bus::EventBus::subscribe`), call `unsubscribe` explicitly.
    pub fn start(self: &Arc<Self>) -> Vec<legion_bus::SubscriptionHandle> {
        let message_handle = self.bus.subscribe(
            EventFilter::Types(vec![EventType::MessagePosted]),
            Arc::new(MessagePostedHandler { orchestrator: self.clone() }),
        );
        let channel_handle = self.bus.subscribe(
            EventFilter::Types(vec![EventType::ChannelCreated]),
            Arc::new(ChannelCreatedHandler { orchestrator: self.clone() }),
        );
        let despawn_handle = self.bus.subscribe(
            EventFilter::Types(vec![EventType::AgentDespawned]),
            Arc::new(AgentDespawnedHandler { orchestrator: self.clone() }),
        );
        vec![message_handle, channel_handle, despawn_handle]
    }

    /// Cancel every in-flight turn for `agent_id`.
    pub fn cancel_agent(&self, agent_id: &str) {
        if let Some(senders) = self.in_flight.lock().unwrap().remove(agent_id) {
            for sender in senders {
                let _ = sender.send(());
            }
        }
    }

    fn register_cancel(&self) -> (oneshot::Sender<()>, oneshot::Receiver<()>) {
        oneshot::channel()
    }

    fn consecutive_turns_for(&self, channel_id: &str) -> HashMap<String, u32> {
        self.cycle_state.lock().unwrap().get(channel_id).cloned().unwrap_or_default()
    }

    fn record_agent_turn(&self, channel_id: &str, agent_id: &str) {
        let mut state = self.cycle_state.lock().unwrap();
        let channel_counts = state.entry(channel_id.to_string()).or_default();
        *channel_counts.entry(agent_id.to_string()).or_insert(0) += 1;
    }

    fn reset_cycle_on_human_message(&self, channel_id: &str) {
        self.cycle_state.lock().unwrap().insert(channel_id.to_string(), HashMap::new());
    }

    async fn handle_message_posted(self: Arc<Self>, message: ChannelMessage) {
        if message.sender_kind != SenderKind::Agent {
            self.reset_cycle_on_human_message(&message.channel_id);
        }

        let channel = match self.channels.get_channel(&message.channel_id).await {
            Ok(c) => c,
            Err(e) => {
                warn!(error = %e, "orchestrator could not load channel for MessagePosted");
                return;
            }
        };

        let agent_ids = self.personas.agent_ids();
        let candidates: Vec<Candidate> = {
            let mut out = Vec::new();
            for agent_id in &agent_ids {
                if agent_id == &message.sender_id || !channel.is_member(agent_id) {
                    continue;
                }
                let name = self.personas.persona(agent_id).await.map(|p| p.name).unwrap_or_else(|_| agent_id.clone());
                out.push(Candidate { agent_id: agent_id.clone(), name });
            }
            out
        };

        let selected = select_responders(
            &candidates,
            &message.content,
            &self.consecutive_turns_for(&message.channel_id),
            self.settings.max_consecutive_agent_turns,
            self.settings.max_responders_per_message,
        );

        for agent_id in selected {
            let this = self.clone();
            let channel_id = message.channel_id.clone();
            let conversation_id = conversation_id_for(&channel, &agent_id);
            let content = message.content.clone();
            let sender_id = message.sender_id.clone();
            tokio::spawn(async move {
                this.dispatch_turn(&agent_id, &channel_id, &conversation_id, &content, &sender_id).await;
            });
        }
    }

    async fn dispatch_turn(self: Arc<Self>, agent_id: &str, channel_id: &str, conversation_id: &str, incoming_text: &str, sender_id: &str) {
        let persona = match self.personas.persona(agent_id).await {
            Ok(p) => p,
            Err(e) => {
                warn!(agent_id, error = %e, "cannot dispatch turn: unknown persona");
                return;
            }
        };

        self.bus.publish(Event::new(
            EventType::TurnStarted,
            "orchestrator",
            serde_json::json!({ "agent_id": agent_id, "channel_id": channel_id }),
        ));

        let emotional_cue = self.personas.emotional_cue(agent_id, Some(sender_id)).await.unwrap_or_default();
        let history_cue = self
            .memory
            .compose_history_cue(agent_id, &[incoming_text.to_string()], self.settings.history_cue_window, self.settings.history_cue_retrieved_items)
            .await;

        let mut registry = ToolRegistry::new();
        registry.register(SendChannelMessageTool::new(agent_id, self.poster.clone()));

        let base_instruction = render_base_instruction(&persona);
        let model = self.model_for(&persona.model);

        let request = InvokeRequest {
            agent_id: agent_id.to_string(),
            conversation_id: conversation_id.to_string(),
            new_message: incoming_text.to_string(),
            base_instruction,
            emotional_cue,
            history_cue,
            model,
            tools: Arc::new(registry),
            allowed_tools: persona.allowed_tools.clone(),
        };

        let (cancel_tx, cancel_rx) = self.register_cancel();
        self.in_flight.lock().unwrap().entry(agent_id.to_string()).or_default().push(cancel_tx);

        let _ = self.personas.set_status(agent_id, AgentStatus::Busy).await;

        let mut stream = self.runtime.invoke(request, cancel_rx);
        let mut outcome = None;
        while let Some(event) = stream.next().await {
            if let TurnEvent::FinalText(_) | TurnEvent::Failed(_) = &event {
                outcome = Some(event);
            }
        }

        let _ = self.personas.set_status(agent_id, AgentStatus::Idle).await;

        match outcome {
            Some(TurnEvent::FinalText(text)) if !text.trim().is_empty() => {
                let posted = self
                    .channels
                    .post_message(channel_id, agent_id, SenderKind::Agent, &text, MessageKind::Chat, serde_json::Map::new())
                    .await;
                if posted.is_ok() {
                    self.record_agent_turn(channel_id, agent_id);
                }
                self.bus.publish(Event::new(
                    EventType::TurnCompleted,
                    "orchestrator",
                    serde_json::json!({ "agent_id": agent_id, "channel_id": channel_id }),
                ));

                let appraisal = Appraisal { valence_delta: 0.0, arousal_delta: 0.0, opinion_deltas: HashMap::new() };
                let _ = self.personas.observe_turn(agent_id, &appraisal).await;
                self.memory
                    .observe_turn(TurnRecord {
                        agent_id: agent_id.to_string(),
                        channel_id: channel_id.to_string(),
                        content: text.clone(),
                        salience: estimate_salience(&text),
                    })
                    .await;
            }
            Some(TurnEvent::FinalText(_)) => {
                self.bus.publish(Event::new(
                    EventType::TurnCompleted,
                    "orchestrator",
                    serde_json::json!({ "agent_id": agent_id, "channel_id": channel_id, "reply": "empty" }),
                ));
            }
            Some(TurnEvent::Failed(reason)) => {
                debug!(agent_id, %reason, "turn failed");
                self.bus.publish(Event::new(
                    EventType::TurnFailed,
                    "orchestrator",
                    serde_json::json!({ "agent_id": agent_id, "channel_id": channel_id, "reason": reason }),
                ));
            }
            _ => {}
        }
    }

    async fn handle_channel_created(self: Arc<Self>, channel: Channel) {
        if channel.channel_type == ChannelType::Dm {
            return;
        }
        for agent_id in &self.settings.auto_subscribe_defaults {
            if let Err(e) = self.channels.add_member(&channel.channel_id, agent_id).await {
                warn!(channel_id = %channel.channel_id, agent_id, error = %e, "auto-subscribe failed");
            }
        }
    }
}

fn render_base_instruction(persona: &legion_persona::Persona) -> String {
    let mut instruction = persona.base_personality.clone();
    if !persona.quirks.is_empty() {
        instruction.push_str(&format!("\nQuirks: {}", persona.quirks.join(", ")));
    }
    if !persona.catchphrases.is_empty() {
        instruction.push_str(&format!("\nYou sometimes say: {}", persona.catchphrases.join(", ")));
    }
    instruction.push_str("\n{{emotional_cue}}\n{{history_cue}}");
    instruction
}

fn conversation_id_for(channel: &Channel, agent_id: &str) -> String {
    if channel.channel_type == ChannelType::Dm {
        let mut members: Vec<&String> = channel.members.iter().collect();
        members.sort();
        members.iter().map(|m| m.as_str()).collect::<Vec<_>>().join(":")
    } else {
        let _ = agent_id;
        channel.channel_id.clone()
    }
}

struct MessagePostedHandler {
    orchestrator: Arc<Orchestrator>,
}

#[async_trait]
impl EventHandler for MessagePostedHandler {
    async fn handle(&self, event: Event) {
        if let Ok(message) = serde_json::from_value::<ChannelMessage>(event.payload.get("message").cloned().unwrap_or_default()) {
            self.orchestrator.clone().handle_message_posted(message).await;
        }
    }
}

struct ChannelCreatedHandler {
    orchestrator: Arc<Orchestrator>,
}

#[async_trait]
impl EventHandler for ChannelCreatedHandler {
    async fn handle(&self, event: Event) {
        if let Ok(channel) = serde_json::from_value::<Channel>(event.payload.get("channel").cloned().unwrap_or_default()) {
            self.orchestrator.clone().handle_channel_created(channel).await;
        }
    }
}

struct AgentDespawnedHandler {
    orchestrator: Arc<Orchestrator>,
}

#[async_trait]
impl EventHandler for AgentDespawnedHandler {
    async fn handle(&self, event: Event) {
        if let Some(agent_id) = event.payload.get("agent_id").and_then(|v| v.as_str()) {
            self.orchestrator.cancel_agent(agent_id);
        }
    }
}
