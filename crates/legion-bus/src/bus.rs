// Copyright (c) 2025-2026 The Legion Project Authors
//
// SPDX-License-Identifier: Apache-2.0
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{error, warn};

use crate::event::{Event, EventType};

/// Default per-subscriber queue depth. A slow subscriber that falls this
/// far behind drops the oldest undelivered events (`broadcast::Receiver`
/// semantics) rather than stalling the publisher — publication must stay
/// non-blocking from the publisher's point of view.
const DEFAULT_CAPACITY: usize = 1024;

/// Default handler slowness watchdog threshold (`T_handler`).
const DEFAULT_WATCHDOG: Duration = Duration::from_secs(5);

/// Which event types a subscription wants to see.
#[derive(Debug, Clone)]
pub enum EventFilter {
    All,
    Types(Vec<EventType>),
}

impl EventFilter {
    fn matches(&self, t: EventType) -> bool {
        match self {
            EventFilter::All => true,
            EventFilter::Types(types) => types.contains(&t),
        }
    }
}

#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, event: Event);
}

/// Handle returned by `subscribe`. Dropping it does not cancel the
/// subscription — call `EventBus::unsubscribe` explicitly.
pub struct SubscriptionHandle {
    task: JoinHandle<()>,
}

/// In-process publish/subscribe fabric built on `tokio::sync::broadcast`.
/// Per-topic order is preserved because every subscriber reads from the
/// same ordered channel and only filters locally; at-least-once delivery
/// holds as
/// long as the subscriber keeps pace with `DEFAULT_CAPACITY`.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<Event>,
    watchdog: Duration,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender, watchdog: DEFAULT_WATCHDOG }
    }

    /// Override the handler-slowness watchdog threshold (`T_handler`,
    /// configured via `RuntimeConfig::handler_watchdog_seconds`).
    pub fn with_watchdog(mut self, watchdog: Duration) -> Self {
        self.watchdog = watchdog;
        self
    }

    /// Publish is synchronous and non-blocking: it hands the event to the
    /// channel and returns immediately regardless of subscriber speed.
    /// An error here only means there are currently no subscribers.
    pub fn publish(&self, event: Event) {
        let _ = self.sender.send(event);
    }

    /// Subscribe a handler to events matching `filter`. Each delivery
    /// runs in its own isolated poll inside the subscription's task: a
    /// handler panic is caught and logged so it cannot take down other
    /// subscriptions or the publisher.
    pub fn subscribe(&self, filter: EventFilter, handler: Arc<dyn EventHandler>) -> SubscriptionHandle {
        let mut rx = self.sender.subscribe();
        let watchdog = self.watchdog;
        let task = tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => {
                        if !filter.matches(event.event_type) {
                            continue;
                        }
                        let event_id = event.event_id;
                        let fut = AssertUnwindSafe(handler.handle(event)).catch_unwind();
                        tokio::pin!(fut);

                        // Race the handler against the watchdog without
                        // cancelling it: if the sleep wins, warn and keep
                        // polling the pinned future to completion.
                        let result = tokio::select! {
                            res = &mut fut => res,
                            _ = tokio::time::sleep(watchdog) => {
                                warn!(%event_id, threshold_secs = watchdog.as_secs(), "event handler exceeded watchdog, still waiting");
                                fut.await
                            }
                        };
                        if result.is_err() {
                            error!(%event_id, "event handler panicked; subscription remains active");
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(lagged = n, "subscriber fell behind, events dropped");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
        SubscriptionHandle { task }
    }

    pub fn unsubscribe(&self, handle: SubscriptionHandle) {
        handle.task.abort();
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    struct CountingHandler {
        count: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl EventHandler for CountingHandler {
        async fn handle(&self, _event: Event) {
            self.count.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct PanickingHandler;

    #[async_trait]
    impl EventHandler for PanickingHandler {
        async fn handle(&self, _event: Event) {
            panic!("boom");
        }
    }

    #[tokio::test]
    async fn subscriber_receives_published_event() {
        let bus = EventBus::new(16);
        let count = Arc::new(AtomicUsize::new(0));
        let _handle = bus.subscribe(
            EventFilter::All,
            Arc::new(CountingHandler { count: count.clone() }),
        );
        tokio::task::yield_now().await;

        bus.publish(Event::new(EventType::MessagePosted, "test", serde_json::json!({})));
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn filter_excludes_non_matching_types() {
        let bus = EventBus::new(16);
        let count = Arc::new(AtomicUsize::new(0));
        let _handle = bus.subscribe(
            EventFilter::Types(vec![EventType::TurnCompleted]),
            Arc::new(CountingHandler { count: count.clone() }),
        );
        tokio::task::yield_now().await;

        bus.publish(Event::new(EventType::MessagePosted, "test", serde_json::json!({})));
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn handler_panic_does_not_kill_subscription() {
        let bus = EventBus::new(16);
        let _handle = bus.subscribe(EventFilter::All, Arc::new(PanickingHandler));
        tokio::task::yield_now().await;

        bus.publish(Event::new(EventType::MessagePosted, "test", serde_json::json!({})));
        bus.publish(Event::new(EventType::MessagePosted, "test", serde_json::json!({})));
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        // No assertion beyond "did not panic the test" — the subscription
        // task survives both panicking deliveries.
    }

    struct SlowHandler {
        count: Arc<AtomicUsize>,
        delay: std::time::Duration,
    }

    #[async_trait]
    impl EventHandler for SlowHandler {
        async fn handle(&self, _event: Event) {
            tokio::time::sleep(self.delay).await;
            self.count.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn handler_exceeding_watchdog_still_runs_to_completion() {
        let bus = EventBus::new(16).with_watchdog(std::time::Duration::from_millis(10));
        let count = Arc::new(AtomicUsize::new(0));
        let _handle = bus.subscribe(
            EventFilter::All,
            Arc::new(SlowHandler { count: count.clone(), delay: std::time::Duration::from_millis(40) }),
        );
        tokio::task::yield_now().await;

        bus.publish(Event::new(EventType::MessagePosted, "test", serde_json::json!({})));
        tokio::time::sleep(std::time::Duration::from_millis(80)).await;

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn two_subscribers_both_see_the_same_event() {
        let bus = EventBus::new(16);
        let c1 = Arc::new(AtomicUsize::new(0));
        let c2 = Arc::new(AtomicUsize::new(0));
        let _h1 = bus.subscribe(EventFilter::All, Arc::new(CountingHandler { count: c1.clone() }));
        let _h2 = bus.subscribe(EventFilter::All, Arc::new(CountingHandler { count: c2.clone() }));
        tokio::task::yield_now().await;

        bus.publish(Event::new(EventType::AgentSpawned, "test", serde_json::json!({})));
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        assert_eq!(c1.load(Ordering::SeqCst), 1);
        assert_eq!(c2.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unsubscribe_stops_delivery() {
        let bus = EventBus::new(16);
        let count = Arc::new(AtomicUsize::new(0));
        let handle = bus.subscribe(
            EventFilter::All,
            Arc::new(CountingHandler { count: count.clone() }),
        );
        tokio::task::yield_now().await;
        bus.unsubscribe(handle);
        tokio::task::yield_now().await;

        bus.publish(Event::new(EventType::MessagePosted, "test", serde_json::json!({})));
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        assert_eq!(count.load(Ordering::SeqCst), 0);
    }
}
