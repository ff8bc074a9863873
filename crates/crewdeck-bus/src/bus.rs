use crate::event::{Event, Topic, TopicFilter};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use tracing::{debug, warn};
use uuid::Uuid;

/// Default per-topic ring buffer capacity.
pub const DEFAULT_HISTORY_CAPACITY: usize = 100;

/// Opaque handle identifying one subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(Uuid);

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Error returned by a subscriber handler during delivery.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    /// The subscriber's sink is gone (closed or stalled); the bus removes
    /// the registration and attempts no further delivery to it.
    #[error("subscriber gone: {0}")]
    Gone(String),

    /// The handler failed for this event only; the registration is kept and
    /// delivery continues to the remaining subscribers.
    #[error("handler failed: {0}")]
    Failed(String),
}

type Handler = Box<dyn Fn(&Event) -> Result<(), DeliveryError> + Send + Sync>;

struct Subscriber {
    id: SubscriptionId,
    filter: TopicFilter,
    handler: Handler,
}

struct Inner {
    /// Registration order; delivery iterates in this order, which gives
    /// per-topic FIFO for handlers registered before the publish call.
    subscribers: Vec<Subscriber>,
    /// Bounded recent-event buffer per topic.
    history: HashMap<Topic, VecDeque<(u64, Event)>>,
    /// Monotonic publish sequence, used to merge per-topic buffers.
    next_seq: u64,
}

/// In-process publish/subscribe hub keyed by topic.
///
/// Delivery is synchronous and runs under the bus lock: handlers must be
/// cheap and must not call back into the bus. The streaming transport's
/// handlers only `try_send` into bounded per-connection queues, which never
/// blocks.
pub struct EventBus {
    inner: Mutex<Inner>,
    history_capacity: usize,
}

impl EventBus {
    /// Create a bus with the default per-topic history capacity.
    pub fn new() -> Self {
        Self::with_history_capacity(DEFAULT_HISTORY_CAPACITY)
    }

    /// Create a bus keeping at most `capacity` recent events per topic.
    pub fn with_history_capacity(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                subscribers: Vec::new(),
                history: HashMap::new(),
                next_seq: 0,
            }),
            history_capacity: capacity,
        }
    }

    /// Register a handler for the topics selected by `filter`.
    ///
    /// Returns a token that removes exactly this registration when passed
    /// to [`EventBus::unsubscribe`].
    pub fn subscribe<F>(&self, filter: TopicFilter, handler: F) -> SubscriptionId
    where
        F: Fn(&Event) -> Result<(), DeliveryError> + Send + Sync + 'static,
    {
        let id = SubscriptionId(Uuid::new_v4());
        let mut inner = self.inner.lock();
        inner.subscribers.push(Subscriber {
            id,
            filter,
            handler: Box::new(handler),
        });
        debug!(subscription_id = %id, total = inner.subscribers.len(), "Subscriber added");
        id
    }

    /// Register a handler and snapshot the matching backlog under one lock,
    /// so no event can fall between the replay and live delivery.
    ///
    /// Returns the subscription token and the most recent `limit` matching
    /// events, oldest first.
    pub fn subscribe_with_replay<F>(
        &self,
        filter: TopicFilter,
        limit: usize,
        handler: F,
    ) -> (SubscriptionId, Vec<Event>)
    where
        F: Fn(&Event) -> Result<(), DeliveryError> + Send + Sync + 'static,
    {
        let id = SubscriptionId(Uuid::new_v4());
        let mut inner = self.inner.lock();
        let backlog = inner.recent(&filter, limit);
        inner.subscribers.push(Subscriber {
            id,
            filter,
            handler: Box::new(handler),
        });
        debug!(
            subscription_id = %id,
            backlog = backlog.len(),
            total = inner.subscribers.len(),
            "Subscriber added with replay"
        );
        (id, backlog)
    }

    /// Remove a registration. Returns whether it was present.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut inner = self.inner.lock();
        let before = inner.subscribers.len();
        inner.subscribers.retain(|s| s.id != id);
        let removed = inner.subscribers.len() < before;
        if removed {
            debug!(subscription_id = %id, "Subscriber removed");
        }
        removed
    }

    /// Publish an event to every currently registered matching handler.
    ///
    /// The event is appended to the topic's ring buffer first, then handlers
    /// are invoked in registration order. A handler returning
    /// [`DeliveryError::Failed`] is logged and skipped for this event; one
    /// returning [`DeliveryError::Gone`] is removed with no further delivery
    /// attempts.
    pub fn publish(&self, topic: Topic, data: serde_json::Value) {
        let event = Event::new(topic, data);
        let mut inner = self.inner.lock();

        let seq = inner.next_seq;
        inner.next_seq += 1;
        let buffer = inner.history.entry(topic).or_default();
        buffer.push_back((seq, event.clone()));
        while buffer.len() > self.history_capacity {
            buffer.pop_front();
        }

        let mut gone: Vec<SubscriptionId> = Vec::new();
        for subscriber in &inner.subscribers {
            if !subscriber.filter.matches(topic) {
                continue;
            }
            match (subscriber.handler)(&event) {
                Ok(()) => {}
                Err(DeliveryError::Failed(reason)) => {
                    warn!(
                        subscription_id = %subscriber.id,
                        topic = %topic,
                        reason = %reason,
                        "Event handler failed; delivery continues"
                    );
                }
                Err(DeliveryError::Gone(reason)) => {
                    warn!(
                        subscription_id = %subscriber.id,
                        topic = %topic,
                        reason = %reason,
                        "Subscriber gone; dropping registration"
                    );
                    gone.push(subscriber.id);
                }
            }
        }

        if !gone.is_empty() {
            inner.subscribers.retain(|s| !gone.contains(&s.id));
        }
    }

    /// The most recent `limit` events matching `filter`, oldest first.
    pub fn recent(&self, filter: &TopicFilter, limit: usize) -> Vec<Event> {
        self.inner.lock().recent(filter, limit)
    }

    /// Number of live registrations.
    pub fn subscriber_count(&self) -> usize {
        self.inner.lock().subscribers.len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl Inner {
    fn recent(&self, filter: &TopicFilter, limit: usize) -> Vec<Event> {
        let mut merged: Vec<(u64, Event)> = self
            .history
            .iter()
            .filter(|(topic, _)| filter.matches(**topic))
            .flat_map(|(_, buffer)| buffer.iter().cloned())
            .collect();
        merged.sort_by_key(|(seq, _)| *seq);
        if merged.len() > limit {
            merged.drain(..merged.len() - limit);
        }
        merged.into_iter().map(|(_, event)| event).collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::sync::Mutex as StdMutex;

    fn payload(n: u64) -> serde_json::Value {
        serde_json::json!({ "n": n })
    }

    #[test]
    fn test_publish_reaches_topic_and_all_subscribers_only() {
        let bus = EventBus::new();
        let agents_hits = Arc::new(AtomicUsize::new(0));
        let all_hits = Arc::new(AtomicUsize::new(0));
        let tasks_hits = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&agents_hits);
        bus.subscribe(TopicFilter::from_names(["agents"]), move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        let counter = Arc::clone(&all_hits);
        bus.subscribe(TopicFilter::all(), move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        let counter = Arc::clone(&tasks_hits);
        bus.subscribe(TopicFilter::from_names(["tasks"]), move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        bus.publish(Topic::Agents, payload(1));

        assert_eq!(agents_hits.load(Ordering::SeqCst), 1);
        assert_eq!(all_hits.load(Ordering::SeqCst), 1);
        assert_eq!(tasks_hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_fifo_order_within_topic() {
        let bus = EventBus::new();
        let seen = Arc::new(StdMutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        bus.subscribe(TopicFilter::from_names(["tasks"]), move |event| {
            sink.lock().unwrap().push(event.data["n"].as_u64().unwrap());
            Ok(())
        });

        for n in 0..5 {
            bus.publish(Topic::Tasks, payload(n));
        }
        assert_eq!(*seen.lock().unwrap(), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_failed_handler_does_not_block_remaining_delivery() {
        let bus = EventBus::new();
        let delivered = Arc::new(AtomicUsize::new(0));

        bus.subscribe(TopicFilter::all(), |_| {
            Err(DeliveryError::Failed("boom".into()))
        });
        let counter = Arc::clone(&delivered);
        bus.subscribe(TopicFilter::all(), move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        bus.publish(Topic::Activity, payload(1));
        bus.publish(Topic::Activity, payload(2));

        assert_eq!(delivered.load(Ordering::SeqCst), 2);
        // A transient failure keeps the registration alive.
        assert_eq!(bus.subscriber_count(), 2);
    }

    #[test]
    fn test_gone_subscriber_removed_and_never_called_again() {
        let bus = EventBus::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        bus.subscribe(TopicFilter::all(), move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(DeliveryError::Gone("client disconnected".into()))
        });

        bus.publish(Topic::Agents, payload(1));
        bus.publish(Topic::Agents, payload(2));
        bus.publish(Topic::Agents, payload(3));

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn test_subscriber_dropped_after_failed_third_write() {
        let bus = EventBus::new();
        let writes = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&writes);
        bus.subscribe(TopicFilter::from_names(["tasks"]), move |_| {
            let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
            if n >= 3 {
                Err(DeliveryError::Gone("write failed".into()))
            } else {
                Ok(())
            }
        });

        for n in 0..6 {
            bus.publish(Topic::Tasks, payload(n));
        }

        // Two deliveries, one failed write, then no further attempts.
        assert_eq!(writes.load(Ordering::SeqCst), 3);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn test_unsubscribe_removes_exactly_one_registration() {
        let bus = EventBus::new();
        let id_a = bus.subscribe(TopicFilter::all(), |_| Ok(()));
        let _id_b = bus.subscribe(TopicFilter::all(), |_| Ok(()));

        assert!(bus.unsubscribe(id_a));
        assert!(!bus.unsubscribe(id_a));
        assert_eq!(bus.subscriber_count(), 1);
    }

    #[test]
    fn test_history_bounded_per_topic() {
        let bus = EventBus::with_history_capacity(3);
        for n in 0..10 {
            bus.publish(Topic::Tasks, payload(n));
        }
        let recent = bus.recent(&TopicFilter::from_names(["tasks"]), 50);
        let ns: Vec<u64> = recent.iter().map(|e| e.data["n"].as_u64().unwrap()).collect();
        assert_eq!(ns, vec![7, 8, 9]);
    }

    #[test]
    fn test_recent_merges_topics_in_publish_order() {
        let bus = EventBus::new();
        bus.publish(Topic::Agents, payload(0));
        bus.publish(Topic::Tasks, payload(1));
        bus.publish(Topic::Agents, payload(2));

        let recent = bus.recent(&TopicFilter::all(), 10);
        let ns: Vec<u64> = recent.iter().map(|e| e.data["n"].as_u64().unwrap()).collect();
        assert_eq!(ns, vec![0, 1, 2]);

        let limited = bus.recent(&TopicFilter::all(), 2);
        let ns: Vec<u64> = limited.iter().map(|e| e.data["n"].as_u64().unwrap()).collect();
        assert_eq!(ns, vec![1, 2]);
    }

    #[test]
    fn test_subscribe_with_replay_returns_backlog() {
        let bus = EventBus::new();
        bus.publish(Topic::Agents, payload(1));
        bus.publish(Topic::Tasks, payload(2));

        let (id, backlog) =
            bus.subscribe_with_replay(TopicFilter::from_names(["agents"]), 50, |_| Ok(()));
        assert_eq!(backlog.len(), 1);
        assert_eq!(backlog[0].data["n"], 1);
        assert!(bus.unsubscribe(id));
    }
}
