// SPDX-License-Identifier: Apache-2.0
//! End-to-end scenarios wiring the full runtime together with mock model
//! providers, matching the testable properties a complete deployment must
//! satisfy: echo, addressing, cycle-guard, dedup, transient model recovery,
//! and despawn cancellation.
use std::sync::Arc;
use std::time::{Duration, Instant};

use legion_agent_runtime::AgentRuntime;
use legion_bus::{Event, EventBus, EventFilter, EventHandler, EventType};
use legion_channels::{Channel, ChannelService, ChannelSpec, ChannelType, MessageKind, SenderKind};
use legion_memory::MemoryEngine;
use legion_model::{MockProvider, ScriptedMockProvider};
use legion_orchestrator::{Orchestrator, OrchestratorSettings};
use legion_persona::{Persona, PersonaEngine};
use legion_sessions::SessionStore;
use tokio::sync::Mutex as AsyncMutex;

struct Harness {
    orchestrator: Arc<Orchestrator>,
    channels: Arc<ChannelService>,
    personas: Arc<PersonaEngine>,
    bus: EventBus,
    _subscriptions: Vec<legion_bus::SubscriptionHandle>,
}

fn settings() -> OrchestratorSettings {
    OrchestratorSettings {
        max_consecutive_agent_turns: 2,
        max_responders_per_message: 8,
        history_cue_window: 10,
        history_cue_retrieved_items: 3,
        auto_subscribe_defaults: vec![],
    }
}

fn persona(agent_id: &str, name: &str) -> Persona {
    Persona {
        agent_id: agent_id.to_string(),
        name: name.to_string(),
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

fn harness_with_model(settings: OrchestratorSettings, model: Arc<dyn legion_model::ModelProvider>) -> Harness {
    let bus = EventBus::new(128);
    let channels = Arc::new(ChannelService::new(bus.clone()));
    let personas = Arc::new(PersonaEngine::new(bus.clone(), 0.2, 10.0));
    let memory = Arc::new(MemoryEngine::new(50, 0.5, 10));
    let runtime = Arc::new(AgentRuntime::new(Arc::new(SessionStore::new(100)), 4, 5, Duration::from_secs(5), Duration::from_secs(5)));
    let orchestrator = Orchestrator::new(bus.clone(), channels.clone(), personas.clone(), memory, runtime, model, settings);
    let subscriptions = orchestrator.start();
    Harness { orchestrator, channels, personas, bus, _subscriptions: subscriptions }
}

async fn wait_for_reply(channels: &ChannelService, channel_id: &str, sender_id: &str, timeout: Duration) -> Option<String> {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        let messages = channels.list_messages(channel_id, None, 20).await.unwrap();
        if let Some(m) = messages.iter().find(|m| m.sender_id == sender_id) {
            return Some(m.content.clone());
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    None
}

async fn create_channel(channels: &ChannelService, channel_id: &str, members: &[&str]) -> Channel {
    channels
        .create_channel(ChannelSpec {
            channel_id: channel_id.to_string(),
            channel_type: ChannelType::Public,
            name: channel_id.to_string(),
            description: String::new(),
            members: members.iter().map(|m| m.to_string()).collect(),
            created_by: "commander".to_string(),
        })
        .unwrap()
}

// S1 — a lone agent member echoes the commander's message back into the channel.
#[tokio::test]
async fn s1_echo() {
    let h = harness_with_model(settings(), Arc::new(MockProvider));
    h.personas.spawn(persona("echo", "Echo")).unwrap();
    create_channel(&h.channels, "general", &["commander", "echo"]).await;

    h.channels
        .post_message("general", "commander", SenderKind::User, "Hello, Legion.", MessageKind::Chat, serde_json::Map::new())
        .await
        .unwrap();

    let reply = wait_for_reply(&h.channels, "general", "echo", Duration::from_secs(2)).await;
    assert_eq!(reply.as_deref(), Some("Hello, Legion."));
}

// S2 — addressing one agent by name in a multi-agent channel excludes the other.
#[tokio::test]
async fn s2_addressing() {
    let h = harness_with_model(settings(), Arc::new(MockProvider));
    h.personas.spawn(persona("echo", "Echo")).unwrap();
    h.personas.spawn(persona("alice", "Alice")).unwrap();
    create_channel(&h.channels, "general", &["commander", "echo", "alice"]).await;

    h.channels
        .post_message(
            "general",
            "commander",
            SenderKind::User,
            "@Echo only you should answer this.",
            MessageKind::Chat,
            serde_json::Map::new(),
        )
        .await
        .unwrap();

    let echo_reply = wait_for_reply(&h.channels, "general", "echo", Duration::from_secs(2)).await;
    assert!(echo_reply.is_some());

    tokio::time::sleep(Duration::from_millis(200)).await;
    let messages = h.channels.list_messages("general", None, 20).await.unwrap();
    assert!(!messages.iter().any(|m| m.sender_id == "alice"));
}

// S3 — two agents that keep responding to each other's replies (a bounce
// that would otherwise run forever) each stop after the configured
// consecutive-turn cap, without any human message resetting the count.
#[tokio::test]
async fn s3_cycle_guard() {
    let mut cfg = settings();
    cfg.max_consecutive_agent_turns = 2;
    let h = harness_with_model(cfg, Arc::new(ScriptedMockProvider::always_text("still going")));
    h.personas.spawn(persona("echo", "Echo")).unwrap();
    h.personas.spawn(persona("alice", "Alice")).unwrap();
    create_channel(&h.channels, "general", &["commander", "echo", "alice"]).await;

    h.channels
        .post_message("general", "commander", SenderKind::User, "start", MessageKind::Chat, serde_json::Map::new())
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(800)).await;
    let messages = h.channels.list_messages("general", None, 50).await.unwrap();
    let echo_replies = messages.iter().filter(|m| m.sender_id == "echo").count();
    let alice_replies = messages.iter().filter(|m| m.sender_id == "alice").count();
    assert!(echo_replies <= 2, "echo replied {echo_replies} times, cycle guard should cap consecutive turns");
    assert!(alice_replies <= 2, "alice replied {alice_replies} times, cycle guard should cap consecutive turns");
}

// S4 — the bus delivers MessagePosted to all subscribers exactly once; a
// counting handler observes a single event per post, not a duplicate.
#[tokio::test]
async fn s4_dedup() {
    struct CountingHandler {
        count: Arc<std::sync::atomic::AtomicUsize>,
    }
    #[async_trait::async_trait]
    impl EventHandler for CountingHandler {
        async fn handle(&self, event: Event) {
            if event.event_type == EventType::MessagePosted {
                self.count.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            }
        }
    }

    let h = harness_with_model(settings(), Arc::new(MockProvider));
    h.personas.spawn(persona("echo", "Echo")).unwrap();
    create_channel(&h.channels, "general", &["commander", "echo"]).await;

    let count = Arc::new(std::sync::atomic::AtomicUsize::new(0));
    let _handle = h.bus.subscribe(EventFilter::Types(vec![EventType::MessagePosted]), Arc::new(CountingHandler { count: count.clone() }));
    tokio::task::yield_now().await;

    h.channels
        .post_message("general", "commander", SenderKind::User, "only once", MessageKind::Chat, serde_json::Map::new())
        .await
        .unwrap();
    wait_for_reply(&h.channels, "general", "echo", Duration::from_secs(2)).await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    // One post from the commander, one reply from echo: exactly two MessagePosted events.
    assert_eq!(count.load(std::sync::atomic::Ordering::SeqCst), 2);
}

// S5 — two consecutive transient model errors are retried with backoff
// before the third call succeeds; three calls happen and elapsed time
// reflects the sum of the backoff delays.
#[tokio::test]
async fn s5_transient_model_error_recovers() {
    let provider = Arc::new(ScriptedMockProvider::failing_n_times(2, "recovered"));
    let last_request = provider.last_request.clone();
    let h = harness_with_model(settings(), provider);
    h.personas.spawn(persona("echo", "Echo")).unwrap();
    create_channel(&h.channels, "general", &["commander", "echo"]).await;

    let started = Instant::now();
    h.channels
        .post_message("general", "commander", SenderKind::User, "will it recover?", MessageKind::Chat, serde_json::Map::new())
        .await
        .unwrap();

    let reply = wait_for_reply(&h.channels, "general", "echo", Duration::from_secs(5)).await;
    let elapsed = started.elapsed();

    assert_eq!(reply.as_deref(), Some("recovered"));
    // BASE_DELAY_MS=500, BACKOFF_FACTOR=2: 500ms + 1000ms between the three attempts.
    assert!(elapsed >= Duration::from_millis(1500), "elapsed {elapsed:?} should cover both backoff sleeps");
    assert!(last_request.lock().unwrap().is_some());
}

// S6 — despawning an agent mid-turn cancels it: no reply is ever posted for
// that turn even though the scripted provider would otherwise answer.
#[tokio::test]
async fn s6_despawn_cancels_in_flight_turn() {
    let started: Arc<AsyncMutex<bool>> = Arc::new(AsyncMutex::new(false));
    let h = harness_with_model(settings(), Arc::new(ScriptedMockProvider::always_text("too late")));
    h.personas.spawn(persona("echo", "Echo")).unwrap();
    create_channel(&h.channels, "general", &["commander", "echo"]).await;

    h.channels
        .post_message("general", "commander", SenderKind::User, "hello", MessageKind::Chat, serde_json::Map::new())
        .await
        .unwrap();

    // Despawn immediately, before the turn has a realistic chance to finish.
    h.personas.despawn("echo").await.unwrap();
    *started.lock().await = true;

    tokio::time::sleep(Duration::from_millis(300)).await;
    let messages = h.channels.list_messages("general", None, 20).await.unwrap();
    assert!(!messages.iter().any(|m| m.sender_id == "echo"), "a despawned agent must not post a reply for its in-flight turn");
}
