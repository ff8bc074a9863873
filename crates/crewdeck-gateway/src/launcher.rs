use async_trait::async_trait;
use crewdeck_core::{AgentId, CrewdeckResult};
use tracing::info;
use uuid::Uuid;

/// The narrow contract to the external worker-process spawner.
///
/// The core does not know how an agent process actually runs; it only
/// launches, restarts, and stops sessions through this seam. Failures
/// surface as [`crewdeck_core::CrewdeckError::Launcher`] and must be
/// reported before any agent state is mutated, so a failed launch never
/// leaves an orphaned `working` status.
#[async_trait]
pub trait Launcher: Send + Sync {
    /// Start a worker process for the task; returns the new session id.
    async fn launch(&self, agent: AgentId, task_id: &str, prompt: &str) -> CrewdeckResult<Uuid>;

    /// Restart the process behind an existing session.
    async fn restart(&self, session: Uuid) -> CrewdeckResult<()>;

    /// Stop the process behind an existing session.
    async fn stop(&self, session: Uuid) -> CrewdeckResult<()>;
}

/// Launcher that spawns nothing and always succeeds.
///
/// Used in tests and local development, where no worker runtime is wired
/// up and the dashboard only exercises the orchestration core itself.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullLauncher;

#[async_trait]
impl Launcher for NullLauncher {
    async fn launch(&self, agent: AgentId, task_id: &str, _prompt: &str) -> CrewdeckResult<Uuid> {
        let session = Uuid::new_v4();
        info!(agent = %agent, task_id = %task_id, session_id = %session, "Null launch");
        Ok(session)
    }

    async fn restart(&self, session: Uuid) -> CrewdeckResult<()> {
        info!(session_id = %session, "Null restart");
        Ok(())
    }

    async fn stop(&self, session: Uuid) -> CrewdeckResult<()> {
        info!(session_id = %session, "Null stop");
        Ok(())
    }
}
