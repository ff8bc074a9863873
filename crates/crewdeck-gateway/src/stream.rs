use crate::server::AppState;
use axum::extract::{Query, State};
use axum::response::sse::{Event as SseEvent, Sse};
use crewdeck_bus::{DeliveryError, Event, EventBus, SubscriptionId, Topic, TopicFilter};
use serde::Deserialize;
use std::convert::Infallible;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::{IntervalStream, ReceiverStream};
use tokio_stream::{Stream, StreamExt};
use tracing::{debug, info};

/// Topic interest, as `?channel=a` or `?channels=a,b`. Both forms accept a
/// comma-separated list; absent means every topic.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct StreamQuery {
    channel: Option<String>,
    channels: Option<String>,
}

fn parse_filter(query: &StreamQuery) -> TopicFilter {
    let mut names: Vec<&str> = Vec::new();
    for raw in [&query.channels, &query.channel].into_iter().flatten() {
        names.extend(raw.split(','));
    }
    TopicFilter::from_names(names)
}

/// Map a queue write onto the delivery contract: a full queue means the
/// client has stalled, a closed queue means it is gone; either way the bus
/// must drop the subscription and attempt no further writes.
fn forward(tx: &mpsc::Sender<Event>, event: &Event) -> Result<(), DeliveryError> {
    match tx.try_send(event.clone()) {
        Ok(()) => Ok(()),
        Err(mpsc::error::TrySendError::Full(_)) => Err(DeliveryError::Gone(
            "outbound queue full, client stalled".to_string(),
        )),
        Err(mpsc::error::TrySendError::Closed(_)) => {
            Err(DeliveryError::Gone("connection closed".to_string()))
        }
    }
}

/// Unsubscribes when the SSE stream is dropped, so a disconnect always
/// unregisters the viewer even if no further event is ever published.
struct StreamGuard {
    bus: Arc<EventBus>,
    id: SubscriptionId,
}

impl Drop for StreamGuard {
    fn drop(&mut self) {
        self.bus.unsubscribe(self.id);
        debug!(subscription_id = %self.id, "Viewer disconnected");
    }
}

fn sse_frame(event: &Event) -> SseEvent {
    let data = serde_json::to_string(event).unwrap_or_else(|_| "{}".to_string());
    SseEvent::default().event(event.topic.as_str()).data(data)
}

/// `GET /api/events` — the per-viewer push stream.
///
/// The connection immediately receives the recent backlog for its topics,
/// then every matching event live, interleaved with heartbeat frames on a
/// fixed interval. Each connection writes through its own bounded queue;
/// one stalled viewer is dropped rather than delaying the others.
pub(crate) async fn stream_events(
    State(state): State<Arc<AppState>>,
    Query(query): Query<StreamQuery>,
) -> Sse<impl Stream<Item = Result<SseEvent, Infallible>> + Send> {
    let filter = parse_filter(&query);
    let (tx, rx) = mpsc::channel::<Event>(state.config.queue_capacity);

    let (subscription, backlog) = state.bus.subscribe_with_replay(
        filter.clone(),
        state.config.replay_limit,
        move |event| forward(&tx, event),
    );
    info!(
        subscription_id = %subscription,
        channels = ?filter.names(),
        backlog = backlog.len(),
        "Viewer connected"
    );
    let guard = StreamGuard {
        bus: Arc::clone(&state.bus),
        id: subscription,
    };

    let keepalive = state.config.keepalive_interval;
    let first_tick = tokio::time::Instant::now() + keepalive;
    let heartbeat = IntervalStream::new(tokio::time::interval_at(first_tick, keepalive))
        .map(|_| Event::new(Topic::Heartbeat, serde_json::json!({ "alive": true })));

    let live = ReceiverStream::new(rx).merge(heartbeat);
    let frames = tokio_stream::iter(backlog).chain(live).map(move |event| {
        // The guard lives inside the stream; dropping the response
        // unsubscribes deterministically.
        let _connected = &guard;
        Ok::<SseEvent, Infallible>(sse_frame(&event))
    });

    Sse::new(frames)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_filter_accepts_both_parameters() {
        let query = StreamQuery {
            channel: Some("agents".to_string()),
            channels: Some("tasks,activity".to_string()),
        };
        let filter = parse_filter(&query);
        assert!(filter.matches(Topic::Agents));
        assert!(filter.matches(Topic::Tasks));
        assert!(filter.matches(Topic::Activity));
        assert!(!filter.matches(Topic::Heartbeat));
    }

    #[test]
    fn test_parse_filter_empty_means_all() {
        let filter = parse_filter(&StreamQuery::default());
        assert!(filter.is_all());
    }

    #[test]
    fn test_forward_full_queue_reports_gone() {
        let (tx, _rx) = mpsc::channel::<Event>(1);
        let event = Event::new(Topic::Agents, serde_json::json!({}));
        assert!(forward(&tx, &event).is_ok());
        // Queue bound reached and nobody is draining: the client is stalled.
        let result = forward(&tx, &event);
        assert!(matches!(result, Err(DeliveryError::Gone(_))));
    }

    #[test]
    fn test_forward_closed_queue_reports_gone() {
        let (tx, rx) = mpsc::channel::<Event>(1);
        drop(rx);
        let event = Event::new(Topic::Agents, serde_json::json!({}));
        assert!(matches!(
            forward(&tx, &event),
            Err(DeliveryError::Gone(_))
        ));
    }
}
