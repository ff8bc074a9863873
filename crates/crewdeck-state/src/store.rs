use crate::session::{Session, SessionCounts, SessionStatus, SessionUpdate};
use chrono::{DateTime, Duration, Utc};
use crewdeck_bus::{EventBus, Topic};
use crewdeck_core::{AgentId, CrewdeckError, CrewdeckResult, Registry};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

/// Runtime status of an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    /// Executing at least one session.
    Working,
    /// Available for dispatch.
    Idle,
    /// Explicitly stopped.
    Offline,
    /// Last session ended in an unrecovered error.
    Error,
}

impl AgentStatus {
    /// Lowercase name, matching the serialized form.
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentStatus::Working => "working",
            AgentStatus::Idle => "idle",
            AgentStatus::Offline => "offline",
            AgentStatus::Error => "error",
        }
    }
}

impl std::fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AgentStatus {
    type Err = CrewdeckError;

    fn from_str(s: &str) -> CrewdeckResult<Self> {
        match s {
            "working" => Ok(AgentStatus::Working),
            "idle" => Ok(AgentStatus::Idle),
            "offline" => Ok(AgentStatus::Offline),
            "error" => Ok(AgentStatus::Error),
            other => Err(CrewdeckError::Validation(format!(
                "invalid status '{other}' (expected working, idle, offline or error)"
            ))),
        }
    }
}

/// Mutable runtime record for one agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRuntimeState {
    /// The agent this record belongs to.
    pub agent: AgentId,
    /// Current runtime status.
    pub status: AgentStatus,
    /// Label of the task currently being worked on, if any.
    pub current_task: Option<String>,
    /// UTC timestamp of the last store mutation touching this agent.
    pub last_activity: DateTime<Utc>,
    /// Cumulative number of sessions dispatched to this agent.
    pub session_count: u32,
    /// Share of this agent's terminal sessions that completed, 0.0–1.0.
    pub success_rate: f64,
}

impl AgentRuntimeState {
    fn new(agent: AgentId) -> Self {
        Self {
            agent,
            status: AgentStatus::Idle,
            current_task: None,
            last_activity: Utc::now(),
            session_count: 0,
            success_rate: 1.0,
        }
    }
}

/// Partial update merged onto an agent's runtime record.
///
/// `current_task` uses the outer option to distinguish "leave untouched"
/// (`None`) from "set or clear" (`Some(..)`).
#[derive(Debug, Clone, Default)]
pub struct StateUpdate {
    /// New status, when present.
    pub status: Option<AgentStatus>,
    /// New current-task label: `Some(Some(label))` sets, `Some(None)` clears.
    pub current_task: Option<Option<String>>,
}

impl StateUpdate {
    /// An update that only changes the status.
    pub fn status(status: AgentStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    /// Attach a current-task label to this update.
    pub fn with_task(mut self, label: impl Into<String>) -> Self {
        self.current_task = Some(Some(label.into()));
        self
    }

    /// Clear the current-task label with this update.
    pub fn clear_task(mut self) -> Self {
        self.current_task = Some(None);
        self
    }
}

struct Inner {
    agents: HashMap<AgentId, AgentRuntimeState>,
    sessions: HashMap<Uuid, Session>,
}

/// Process-wide store for agent runtime state and sessions.
///
/// All mutations serialize through one store-wide write lock; events are
/// published to the bus only after the guarded mutation completes, so
/// subscribers reading back through the store never observe a stale status.
pub struct StateStore {
    registry: Registry,
    bus: Arc<EventBus>,
    inner: RwLock<Inner>,
}

impl StateStore {
    /// Create a store seeded with one runtime record per registered agent.
    pub fn new(registry: Registry, bus: Arc<EventBus>) -> Self {
        let agents = registry
            .all()
            .iter()
            .map(|a| (a.id, AgentRuntimeState::new(a.id)))
            .collect();
        Self {
            registry,
            bus,
            inner: RwLock::new(Inner {
                agents,
                sessions: HashMap::new(),
            }),
        }
    }

    /// The registry this store validates against.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Runtime record for one agent, if registered.
    pub async fn get(&self, agent: AgentId) -> Option<AgentRuntimeState> {
        self.inner.read().await.agents.get(&agent).cloned()
    }

    /// Snapshot of every agent's runtime record, in registry order.
    pub async fn snapshot(&self) -> Vec<AgentRuntimeState> {
        let inner = self.inner.read().await;
        self.registry
            .all()
            .iter()
            .filter_map(|a| inner.agents.get(&a.id).cloned())
            .collect()
    }

    /// Merge a partial update onto an agent's record, stamping
    /// last-activity to now.
    ///
    /// Silently ignores agents outside the registry — the one documented
    /// silent default; callers are expected to validate first.
    pub async fn update(&self, agent: AgentId, update: StateUpdate) {
        let snapshot = {
            let mut inner = self.inner.write().await;
            let Some(state) = inner.agents.get_mut(&agent) else {
                debug!(agent = %agent, "Ignoring update for unregistered agent");
                return;
            };
            if let Some(status) = update.status {
                state.status = status;
            }
            if let Some(task) = update.current_task {
                state.current_task = task;
            }
            state.last_activity = Utc::now();
            state.clone()
        };
        self.bus.publish(Topic::Agents, json!(snapshot));
    }

    /// Record a new session and force its owner to `working`.
    pub async fn add_session(&self, session: Session) {
        let events = {
            let mut inner = self.inner.write().await;
            let Some(state) = inner.agents.get_mut(&session.agent) else {
                debug!(agent = %session.agent, "Ignoring session for unregistered agent");
                return;
            };
            state.status = AgentStatus::Working;
            state.current_task = Some(session.task_id.clone());
            state.session_count += 1;
            state.last_activity = Utc::now();
            let agent_snapshot = state.clone();

            inner.sessions.insert(session.id, session.clone());
            info!(
                session_id = %session.id,
                agent = %session.agent,
                task_id = %session.task_id,
                "Session added"
            );

            vec![
                (Topic::Tasks, json!(session.clone())),
                (Topic::Agents, json!(agent_snapshot)),
                (
                    Topic::Activity,
                    json!({
                        "agent": session.agent,
                        "text": format!(
                            "{} started working on '{}'",
                            self.display_name(session.agent),
                            session.task_id
                        ),
                    }),
                ),
            ]
        };
        self.publish_all(events);
    }

    /// Merge a partial update onto a session record.
    ///
    /// A transition to completed or failed re-derives the owner's status:
    /// if any other session for that agent is still `running` the agent
    /// stays working, otherwise it becomes idle with its task cleared.
    pub async fn update_session(
        &self,
        id: Uuid,
        update: SessionUpdate,
    ) -> CrewdeckResult<Session> {
        let (session, events) = {
            let mut inner = self.inner.write().await;
            let Some(record) = inner.sessions.get_mut(&id) else {
                return Err(CrewdeckError::NotFound(format!("unknown session '{id}'")));
            };
            if let Some(status) = update.status {
                record.status = status;
            }
            let session = record.clone();

            let mut events = vec![(Topic::Tasks, json!(session.clone()))];
            if session.status.is_terminal() {
                events.extend(self.settle_owner(&mut inner, &session));
            }
            (session, events)
        };
        self.publish_all(events);
        Ok(session)
    }

    /// Session by id.
    pub async fn get_session(&self, id: Uuid) -> Option<Session> {
        self.inner.read().await.sessions.get(&id).cloned()
    }

    /// All sessions owned by one agent, most recently started first.
    pub async fn sessions_for(&self, agent: AgentId) -> Vec<Session> {
        let inner = self.inner.read().await;
        let mut sessions: Vec<Session> = inner
            .sessions
            .values()
            .filter(|s| s.agent == agent)
            .cloned()
            .collect();
        sessions.sort_by_key(|s| std::cmp::Reverse(s.started_at));
        sessions
    }

    /// All sessions, oldest first.
    pub async fn sessions(&self) -> Vec<Session> {
        let inner = self.inner.read().await;
        let mut sessions: Vec<Session> = inner.sessions.values().cloned().collect();
        sessions.sort_by_key(|s| s.started_at);
        sessions
    }

    /// Sessions whose status is running or starting.
    pub async fn active_sessions(&self) -> Vec<Session> {
        let inner = self.inner.read().await;
        let mut sessions: Vec<Session> = inner
            .sessions
            .values()
            .filter(|s| s.status.is_active())
            .cloned()
            .collect();
        sessions.sort_by_key(|s| s.started_at);
        sessions
    }

    /// Aggregate running / completed / queued counts across all agents.
    pub async fn session_counts(&self) -> SessionCounts {
        let inner = self.inner.read().await;
        let mut counts = SessionCounts::default();
        for session in inner.sessions.values() {
            match session.status {
                SessionStatus::Running => counts.running += 1,
                SessionStatus::Completed => counts.completed += 1,
                SessionStatus::Starting | SessionStatus::Paused => counts.queued += 1,
                SessionStatus::Failed => {}
            }
        }
        counts
    }

    /// Remove sessions older than `age` regardless of status.
    ///
    /// This is a maintenance sweep (run after a stop action), distinct from
    /// any status transition. Returns the number of sessions removed.
    pub async fn evict_older_than(&self, age: Duration) -> usize {
        let cutoff = Utc::now() - age;
        let mut inner = self.inner.write().await;
        let before = inner.sessions.len();
        inner.sessions.retain(|_, s| s.started_at >= cutoff);
        let removed = before - inner.sessions.len();
        if removed > 0 {
            info!(removed, "Evicted aged sessions");
        }
        removed
    }

    /// Park a working agent: running sessions become paused, the agent
    /// returns to idle.
    ///
    /// Fails with a state conflict for the coordinator or for an agent that
    /// is not working.
    pub async fn pause(&self, agent: AgentId) -> CrewdeckResult<AgentRuntimeState> {
        if agent == AgentId::Coordinator {
            return Err(CrewdeckError::StateConflict(
                "the coordinator cannot be paused".to_string(),
            ));
        }
        let (snapshot, events) = {
            let mut inner = self.inner.write().await;
            let Some(state) = inner.agents.get(&agent) else {
                return Err(CrewdeckError::NotFound(format!("unknown agent '{agent}'")));
            };
            if state.status != AgentStatus::Working {
                return Err(CrewdeckError::StateConflict(format!(
                    "cannot pause '{agent}' while {}",
                    state.status
                )));
            }

            let mut events = Vec::new();
            for session in inner.sessions.values_mut() {
                if session.agent == agent && session.status == SessionStatus::Running {
                    session.status = SessionStatus::Paused;
                    events.push((Topic::Tasks, json!(session.clone())));
                }
            }

            let Some(state) = inner.agents.get_mut(&agent) else {
                return Err(CrewdeckError::NotFound(format!("unknown agent '{agent}'")));
            };
            state.status = AgentStatus::Idle;
            state.current_task = None;
            state.last_activity = Utc::now();
            let snapshot = state.clone();
            events.push((Topic::Agents, json!(snapshot.clone())));
            events.push((
                Topic::Activity,
                json!({
                    "agent": agent,
                    "text": format!("{} was paused", self.display_name(agent)),
                }),
            ));
            (snapshot, events)
        };
        self.publish_all(events);
        Ok(snapshot)
    }

    /// Revive a paused or errored agent.
    ///
    /// Paused sessions go back to running and the agent to working;
    /// otherwise an errored agent is cleared to idle. Anything else is a
    /// state conflict.
    pub async fn resume(&self, agent: AgentId) -> CrewdeckResult<AgentRuntimeState> {
        let (snapshot, events) = {
            let mut inner = self.inner.write().await;
            if !inner.agents.contains_key(&agent) {
                return Err(CrewdeckError::NotFound(format!("unknown agent '{agent}'")));
            }

            let mut events = Vec::new();
            let mut revived: Option<Session> = None;
            for session in inner.sessions.values_mut() {
                if session.agent == agent && session.status == SessionStatus::Paused {
                    session.status = SessionStatus::Running;
                    events.push((Topic::Tasks, json!(session.clone())));
                    let newer = revived
                        .as_ref()
                        .map_or(true, |r| session.started_at > r.started_at);
                    if newer {
                        revived = Some(session.clone());
                    }
                }
            }

            let Some(state) = inner.agents.get_mut(&agent) else {
                return Err(CrewdeckError::NotFound(format!("unknown agent '{agent}'")));
            };
            if let Some(session) = revived {
                state.status = AgentStatus::Working;
                state.current_task = Some(session.task_id);
            } else if state.status == AgentStatus::Error {
                state.status = AgentStatus::Idle;
            } else {
                return Err(CrewdeckError::StateConflict(format!(
                    "nothing to resume for '{agent}' while {}",
                    state.status
                )));
            }
            state.last_activity = Utc::now();
            let snapshot = state.clone();
            events.push((Topic::Agents, json!(snapshot.clone())));
            events.push((
                Topic::Activity,
                json!({
                    "agent": agent,
                    "text": format!("{} resumed", self.display_name(agent)),
                }),
            ));
            (snapshot, events)
        };
        self.publish_all(events);
        Ok(snapshot)
    }

    /// Take an agent offline: active sessions are failed, the agent's
    /// status becomes offline.
    ///
    /// Fails with a state conflict for the coordinator.
    pub async fn stop(&self, agent: AgentId) -> CrewdeckResult<AgentRuntimeState> {
        if agent == AgentId::Coordinator {
            return Err(CrewdeckError::StateConflict(
                "the coordinator cannot be stopped".to_string(),
            ));
        }
        let (snapshot, events) = {
            let mut inner = self.inner.write().await;
            if !inner.agents.contains_key(&agent) {
                return Err(CrewdeckError::NotFound(format!("unknown agent '{agent}'")));
            }

            let mut events = Vec::new();
            for session in inner.sessions.values_mut() {
                if session.agent == agent
                    && matches!(
                        session.status,
                        SessionStatus::Starting | SessionStatus::Running | SessionStatus::Paused
                    )
                {
                    session.status = SessionStatus::Failed;
                    events.push((Topic::Tasks, json!(session.clone())));
                }
            }
            let success_rate = Self::derive_success_rate(&inner, agent);

            let Some(state) = inner.agents.get_mut(&agent) else {
                return Err(CrewdeckError::NotFound(format!("unknown agent '{agent}'")));
            };
            state.status = AgentStatus::Offline;
            state.current_task = None;
            if let Some(rate) = success_rate {
                state.success_rate = rate;
            }
            state.last_activity = Utc::now();
            let snapshot = state.clone();
            events.push((Topic::Agents, json!(snapshot.clone())));
            events.push((
                Topic::Activity,
                json!({
                    "agent": agent,
                    "text": format!("{} went offline", self.display_name(agent)),
                }),
            ));
            (snapshot, events)
        };
        self.publish_all(events);
        Ok(snapshot)
    }

    /// Re-derive the owner's record after one of its sessions reached a
    /// terminal status. Returns the events to publish.
    fn settle_owner(
        &self,
        inner: &mut Inner,
        session: &Session,
    ) -> Vec<(Topic, serde_json::Value)> {
        let owner = session.agent;
        let still_running = inner
            .sessions
            .values()
            .any(|s| s.agent == owner && s.status == SessionStatus::Running);
        let success_rate = Self::derive_success_rate(inner, owner);

        let Some(state) = inner.agents.get_mut(&owner) else {
            return Vec::new();
        };
        if !still_running {
            state.status = AgentStatus::Idle;
            state.current_task = None;
        }
        if let Some(rate) = success_rate {
            state.success_rate = rate;
        }
        state.last_activity = Utc::now();
        let snapshot = state.clone();

        let verb = if session.status == SessionStatus::Completed {
            "completed"
        } else {
            "failed"
        };
        vec![
            (Topic::Agents, json!(snapshot)),
            (
                Topic::Activity,
                json!({
                    "agent": owner,
                    "text": format!(
                        "{} {verb} '{}'",
                        self.display_name(owner),
                        session.task_id
                    ),
                }),
            ),
        ]
    }

    /// Completed share over the agent's terminal sessions still in the map,
    /// or `None` when there are none yet.
    fn derive_success_rate(inner: &Inner, agent: AgentId) -> Option<f64> {
        let mut completed = 0usize;
        let mut failed = 0usize;
        for session in inner.sessions.values() {
            if session.agent != agent {
                continue;
            }
            match session.status {
                SessionStatus::Completed => completed += 1,
                SessionStatus::Failed => failed += 1,
                _ => {}
            }
        }
        let terminal = completed + failed;
        (terminal > 0).then(|| completed as f64 / terminal as f64)
    }

    fn display_name(&self, agent: AgentId) -> String {
        self.registry
            .get(agent)
            .map_or_else(|| agent.to_string(), |a| a.name.clone())
    }

    fn publish_all(&self, events: Vec<(Topic, serde_json::Value)>) {
        for (topic, data) in events {
            self.bus.publish(topic, data);
        }
    }
}
