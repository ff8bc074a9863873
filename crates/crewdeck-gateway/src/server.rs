use crate::error::{ApiError, ApiResult};
use crate::launcher::Launcher;
use crate::stream::stream_events;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use crewdeck_bus::EventBus;
use crewdeck_core::{AgentId, CrewdeckError};
use crewdeck_router::{RoutingDecision, TaskRouter};
use crewdeck_state::{
    AgentRuntimeState, AgentStatus, Session, SessionStatus, SessionUpdate, StateStore, StateUpdate,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

/// Tunables for the streaming transport and maintenance sweeps.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Most recent events replayed to a fresh connection.
    pub replay_limit: usize,
    /// Interval between keepalive frames.
    pub keepalive_interval: Duration,
    /// Bound of each connection's outbound queue; a full queue marks the
    /// client as stalled and drops it.
    pub queue_capacity: usize,
    /// Sessions older than this are removed by the cleanup sweep.
    pub eviction_age: chrono::Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            replay_limit: 50,
            keepalive_interval: Duration::from_secs(15),
            queue_capacity: 256,
            eviction_age: chrono::Duration::hours(24),
        }
    }
}

/// Shared application state.
pub struct AppState {
    pub(crate) store: Arc<StateStore>,
    pub(crate) bus: Arc<EventBus>,
    pub(crate) router: TaskRouter,
    pub(crate) launcher: Arc<dyn Launcher>,
    pub(crate) config: GatewayConfig,
}

/// The dashboard gateway server.
pub struct GatewayServer;

impl GatewayServer {
    /// Build the gateway router with default transport tunables.
    pub fn build(
        store: Arc<StateStore>,
        bus: Arc<EventBus>,
        launcher: Arc<dyn Launcher>,
    ) -> Router {
        Self::build_with_config(store, bus, launcher, GatewayConfig::default())
    }

    /// Build the gateway router with explicit transport tunables.
    pub fn build_with_config(
        store: Arc<StateStore>,
        bus: Arc<EventBus>,
        launcher: Arc<dyn Launcher>,
        config: GatewayConfig,
    ) -> Router {
        let router = TaskRouter::new(Arc::clone(&store));
        let state = Arc::new(AppState {
            store,
            bus,
            router,
            launcher,
            config,
        });

        Router::new()
            .route("/health", get(health_handler))
            .route("/api/state", get(state_snapshot_handler))
            .route("/api/agents", get(list_agents_handler))
            .route(
                "/api/agents/{id}",
                get(get_agent_handler).patch(patch_agent_handler),
            )
            .route("/api/agents/{id}/actions", post(agent_action_handler))
            .route("/api/dispatch", post(dispatch_handler))
            .route("/api/dispatch/analyze", post(analyze_handler))
            .route("/api/events", get(stream_events))
            .with_state(state)
    }
}

async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({"status": "ok", "service": "crewdeck"}))
}

async fn list_agents_handler(State(state): State<Arc<AppState>>) -> Json<Vec<AgentRuntimeState>> {
    Json(state.store.snapshot().await)
}

async fn get_agent_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<AgentRuntimeState>> {
    let agent: AgentId = id.parse()?;
    let runtime = state
        .store
        .get(agent)
        .await
        .ok_or_else(|| CrewdeckError::NotFound(format!("unknown agent '{agent}'")))?;
    Ok(Json(runtime))
}

/// Partial agent update: absent fields are left untouched.
#[derive(Debug, Deserialize)]
struct PatchAgentRequest {
    status: Option<String>,
    current_task: Option<String>,
}

async fn patch_agent_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<PatchAgentRequest>,
) -> ApiResult<Json<AgentRuntimeState>> {
    let agent: AgentId = id.parse()?;
    state.store.registry().require(agent)?;

    let mut update = StateUpdate::default();
    if let Some(raw) = body.status {
        update.status = Some(raw.parse::<AgentStatus>()?);
    }
    if let Some(task) = body.current_task {
        update.current_task = Some(Some(task));
    }

    state.store.update(agent, update).await;
    let runtime = state
        .store
        .get(agent)
        .await
        .ok_or_else(|| CrewdeckError::NotFound(format!("unknown agent '{agent}'")))?;
    Ok(Json(runtime))
}

#[derive(Debug, Serialize)]
struct StateSnapshot {
    agents: Vec<AgentRuntimeState>,
    sessions: Vec<Session>,
    counts: crewdeck_state::SessionCounts,
}

async fn state_snapshot_handler(State(state): State<Arc<AppState>>) -> Json<StateSnapshot> {
    Json(StateSnapshot {
        agents: state.store.snapshot().await,
        sessions: state.store.sessions().await,
        counts: state.store.session_counts().await,
    })
}

#[derive(Debug, Deserialize)]
struct AnalyzeRequest {
    description: String,
}

async fn analyze_handler(
    State(state): State<Arc<AppState>>,
    Json(body): Json<AnalyzeRequest>,
) -> ApiResult<Json<RoutingDecision>> {
    let decision = state.router.analyze(&body.description).await?;
    Ok(Json(decision))
}

#[derive(Debug, Deserialize)]
struct DispatchRequest {
    description: String,
    agent: String,
}

#[derive(Debug, Serialize)]
struct DispatchResponse {
    session: Session,
    analysis: RoutingDecision,
    backend: String,
    dispatched_at: DateTime<Utc>,
}

async fn dispatch_handler(
    State(state): State<Arc<AppState>>,
    Json(body): Json<DispatchRequest>,
) -> ApiResult<(StatusCode, Json<DispatchResponse>)> {
    let agent: AgentId = body.agent.parse()?;
    if agent == AgentId::Coordinator {
        return Err(ApiError(CrewdeckError::Validation(
            "tasks cannot be dispatched to the coordinator".to_string(),
        )));
    }
    let descriptor = state.store.registry().require(agent)?.clone();

    // Validates the description as a side effect.
    let analysis = state.router.analyze(&body.description).await?;

    // Launch first: a launcher failure must leave agent state unchanged.
    let task_id = Uuid::new_v4().to_string();
    let session_id = state
        .launcher
        .launch(agent, &task_id, &body.description)
        .await?;

    let session = Session::new(session_id, agent, task_id);
    state.store.add_session(session.clone()).await;

    info!(
        session_id = %session.id,
        agent = %agent,
        backend = %descriptor.backend,
        "Task dispatched"
    );

    Ok((
        StatusCode::CREATED,
        Json(DispatchResponse {
            session,
            analysis,
            backend: descriptor.backend,
            dispatched_at: Utc::now(),
        }),
    ))
}

#[derive(Debug, Deserialize)]
struct ActionRequest {
    action: String,
}

async fn agent_action_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<ActionRequest>,
) -> ApiResult<Json<AgentRuntimeState>> {
    let agent: AgentId = id.parse()?;
    let runtime = match body.action.as_str() {
        "pause" => state.store.pause(agent).await?,
        "resume" => state.store.resume(agent).await?,
        "stop" => stop_agent(&state, agent).await?,
        "restart" => restart_agent(&state, agent).await?,
        other => {
            return Err(ApiError(CrewdeckError::Validation(format!(
                "unknown action '{other}' (expected pause, resume, stop or restart)"
            ))))
        }
    };
    Ok(Json(runtime))
}

/// Stop the agent's worker processes, take it offline, and sweep out aged
/// sessions. The launcher is driven first so a spawner failure leaves the
/// store untouched.
async fn stop_agent(state: &AppState, agent: AgentId) -> ApiResult<AgentRuntimeState> {
    if agent == AgentId::Coordinator {
        return Err(ApiError(CrewdeckError::StateConflict(
            "the coordinator cannot be stopped".to_string(),
        )));
    }
    for session in state.store.sessions_for(agent).await {
        if !session.status.is_terminal() {
            state.launcher.stop(session.id).await?;
        }
    }
    let runtime = state.store.stop(agent).await?;
    let evicted = state.store.evict_older_than(state.config.eviction_age).await;
    if evicted > 0 {
        info!(agent = %agent, evicted, "Cleanup sweep after stop");
    }
    Ok(runtime)
}

/// Relaunch the agent's most recent session and mark it starting again.
async fn restart_agent(state: &AppState, agent: AgentId) -> ApiResult<AgentRuntimeState> {
    state.store.registry().require(agent)?;
    let session = state
        .store
        .sessions_for(agent)
        .await
        .into_iter()
        .next()
        .ok_or_else(|| {
            CrewdeckError::StateConflict(format!("no session to restart for '{agent}'"))
        })?;

    state.launcher.restart(session.id).await?;
    state
        .store
        .update_session(session.id, SessionUpdate::status(SessionStatus::Starting))
        .await?;
    state
        .store
        .update(
            agent,
            StateUpdate::status(AgentStatus::Working).with_task(session.task_id.clone()),
        )
        .await;
    state
        .store
        .get(agent)
        .await
        .ok_or_else(|| ApiError(CrewdeckError::NotFound(format!("unknown agent '{agent}'"))))
}
