use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The closed set of event categories viewers can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Topic {
    /// Agent runtime-state changes.
    Agents,
    /// Session lifecycle transitions.
    Tasks,
    /// Human-readable activity feed entries.
    Activity,
    /// Per-connection keepalive frames (synthesized by the transport,
    /// never published through the bus).
    Heartbeat,
}

impl Topic {
    /// Lowercase name, matching the serialized form and the `channels`
    /// query parameter values.
    pub fn as_str(&self) -> &'static str {
        match self {
            Topic::Agents => "agents",
            Topic::Tasks => "tasks",
            Topic::Activity => "activity",
            Topic::Heartbeat => "heartbeat",
        }
    }
}

impl std::fmt::Display for Topic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An immutable event record.
///
/// Events are never mutated after publication; subscribers receive shared
/// references and clone what they keep.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// The topic this event was published under.
    pub topic: Topic,
    /// Arbitrary JSON payload.
    pub data: serde_json::Value,
    /// UTC timestamp assigned at publish time.
    pub timestamp: DateTime<Utc>,
}

impl Event {
    /// Create an event stamped with the current time.
    pub fn new(topic: Topic, data: serde_json::Value) -> Self {
        Self {
            topic,
            data,
            timestamp: Utc::now(),
        }
    }
}

/// A subscriber's topic interest set.
///
/// The empty filter matches every topic. Names that do not correspond to a
/// real topic are kept verbatim and simply never match — an unknown channel
/// is accepted, not rejected, and must not widen the filter to "all".
#[derive(Debug, Clone, Default)]
pub struct TopicFilter {
    names: Vec<String>,
}

impl TopicFilter {
    /// The match-everything filter.
    pub fn all() -> Self {
        Self::default()
    }

    /// Build a filter from raw channel names, dropping blanks and duplicates.
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut out: Vec<String> = Vec::new();
        for name in names {
            let name = name.as_ref().trim();
            if !name.is_empty() && !out.iter().any(|n| n == name) {
                out.push(name.to_string());
            }
        }
        Self { names: out }
    }

    /// Whether events on `topic` should be delivered through this filter.
    pub fn matches(&self, topic: Topic) -> bool {
        self.names.is_empty() || self.names.iter().any(|n| n == topic.as_str())
    }

    /// Whether this filter matches every topic.
    pub fn is_all(&self) -> bool {
        self.names.is_empty()
    }

    /// The raw channel names, in first-seen order.
    pub fn names(&self) -> &[String] {
        &self.names
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_topic_serialized_lowercase() {
        assert_eq!(serde_json::to_string(&Topic::Agents).unwrap(), "\"agents\"");
        assert_eq!(serde_json::to_string(&Topic::Tasks).unwrap(), "\"tasks\"");
    }

    #[test]
    fn test_empty_filter_matches_everything() {
        let filter = TopicFilter::all();
        assert!(filter.matches(Topic::Agents));
        assert!(filter.matches(Topic::Heartbeat));
    }

    #[test]
    fn test_filter_matches_only_named_topics() {
        let filter = TopicFilter::from_names(["tasks"]);
        assert!(filter.matches(Topic::Tasks));
        assert!(!filter.matches(Topic::Agents));
    }

    #[test]
    fn test_unknown_name_does_not_widen_to_all() {
        let filter = TopicFilter::from_names(["no-such-topic"]);
        assert!(!filter.is_all());
        assert!(!filter.matches(Topic::Agents));
        assert!(!filter.matches(Topic::Tasks));
    }

    #[test]
    fn test_blank_and_duplicate_names_dropped() {
        let filter = TopicFilter::from_names(["agents", " ", "agents", ""]);
        assert_eq!(filter.names(), ["agents"]);
    }

    #[test]
    fn test_event_serializes_topic_data_timestamp() {
        let event = Event::new(Topic::Activity, serde_json::json!({"text": "hi"}));
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["topic"], "activity");
        assert_eq!(value["data"]["text"], "hi");
        assert!(value["timestamp"].is_string());
    }
}
