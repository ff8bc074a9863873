use chrono::{DateTime, Utc};
use crewdeck_core::AgentId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle status of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// Launched but not yet reported running.
    Starting,
    /// Actively executing.
    Running,
    /// Parked by an explicit pause action.
    Paused,
    /// Finished successfully.
    Completed,
    /// Finished with an error.
    Failed,
}

impl SessionStatus {
    /// Completed or failed — the statuses that trigger owner re-derivation.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionStatus::Completed | SessionStatus::Failed)
    }

    /// Running or starting — the statuses counted as active work.
    pub fn is_active(&self) -> bool {
        matches!(self, SessionStatus::Running | SessionStatus::Starting)
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SessionStatus::Starting => "starting",
            SessionStatus::Running => "running",
            SessionStatus::Paused => "paused",
            SessionStatus::Completed => "completed",
            SessionStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// One in-flight unit of work, bound to exactly one agent for its whole
/// lifetime.
///
/// Sessions are created when a task is dispatched and removed only by the
/// explicit age-based eviction sweep, never as a side effect of a status
/// transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Globally unique identifier, never reused.
    pub id: Uuid,
    /// The owning agent.
    pub agent: AgentId,
    /// Identifier of the task this session executes.
    pub task_id: String,
    /// Current lifecycle status.
    pub status: SessionStatus,
    /// UTC timestamp of when the session was launched.
    pub started_at: DateTime<Utc>,
}

impl Session {
    /// Create a session in the `starting` state, stamped now.
    pub fn new(id: Uuid, agent: AgentId, task_id: impl Into<String>) -> Self {
        Self {
            id,
            agent,
            task_id: task_id.into(),
            status: SessionStatus::Starting,
            started_at: Utc::now(),
        }
    }
}

/// Partial update merged onto a session record.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SessionUpdate {
    /// New status, when present.
    pub status: Option<SessionStatus>,
}

impl SessionUpdate {
    /// An update that only changes the status.
    pub fn status(status: SessionStatus) -> Self {
        Self {
            status: Some(status),
        }
    }
}

/// Aggregate session counts across all agents — the coordinator's workload
/// summary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SessionCounts {
    /// Sessions currently running.
    pub running: usize,
    /// Sessions that finished successfully.
    pub completed: usize,
    /// Sessions starting or paused.
    pub queued: usize,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_new_session_starts_in_starting() {
        let session = Session::new(Uuid::new_v4(), AgentId::Codex, "task-1");
        assert_eq!(session.status, SessionStatus::Starting);
        assert_eq!(session.agent, AgentId::Codex);
        assert!(session.status.is_active());
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(SessionStatus::Completed.is_terminal());
        assert!(SessionStatus::Failed.is_terminal());
        assert!(!SessionStatus::Paused.is_terminal());
        assert!(!SessionStatus::Running.is_terminal());
    }

    #[test]
    fn test_status_serialized_lowercase() {
        let json = serde_json::to_string(&SessionStatus::Starting).unwrap();
        assert_eq!(json, "\"starting\"");
    }
}
