use crate::{CrewdeckError, CrewdeckResult};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Identifier of each worker agent in the roster.
///
/// The set is closed: agents are defined at process start and never added or
/// removed at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentId {
    /// Dispatch lead; receives no tasks itself and cannot be paused or stopped.
    Coordinator,
    /// Software engineering tasks.
    Codex,
    /// Writing and copy tasks.
    Quill,
    /// Research and investigation tasks.
    Scout,
    /// Visual design tasks.
    Pixel,
    /// Publishing and release tasks.
    Herald,
}

impl AgentId {
    /// All roster identifiers in declared order.
    pub const ALL: [AgentId; 6] = [
        AgentId::Coordinator,
        AgentId::Codex,
        AgentId::Quill,
        AgentId::Scout,
        AgentId::Pixel,
        AgentId::Herald,
    ];

    /// Short lowercase name, matching the serialized form.
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentId::Coordinator => "coordinator",
            AgentId::Codex => "codex",
            AgentId::Quill => "quill",
            AgentId::Scout => "scout",
            AgentId::Pixel => "pixel",
            AgentId::Herald => "herald",
        }
    }
}

impl std::fmt::Display for AgentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AgentId {
    type Err = CrewdeckError;

    fn from_str(s: &str) -> CrewdeckResult<Self> {
        AgentId::ALL
            .into_iter()
            .find(|id| id.as_str() == s)
            .ok_or_else(|| CrewdeckError::NotFound(format!("unknown agent '{s}'")))
    }
}

/// Immutable descriptor for one roster entry.
///
/// Built once from the static roster at process start; never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    /// Roster identifier.
    pub id: AgentId,
    /// Human-facing display name.
    pub name: String,
    /// Role label shown in the dashboard.
    pub role: String,
    /// Emoji tag used as the agent's icon.
    pub emoji: String,
    /// Ordered capability tags, most prominent first.
    pub capabilities: Vec<String>,
    /// Identifier of the execution backend the launcher should prefer.
    pub backend: String,
}

impl Agent {
    fn new(
        id: AgentId,
        name: &str,
        role: &str,
        emoji: &str,
        capabilities: &[&str],
        backend: &str,
    ) -> Self {
        Self {
            id,
            name: name.to_string(),
            role: role.to_string(),
            emoji: emoji.to_string(),
            capabilities: capabilities.iter().map(|c| (*c).to_string()).collect(),
            backend: backend.to_string(),
        }
    }
}

/// The static roster, in declared order.
///
/// The coordinator comes first; worker order determines snapshot ordering
/// everywhere downstream.
pub fn roster() -> Vec<Agent> {
    vec![
        Agent::new(
            AgentId::Coordinator,
            "Nova",
            "Dispatch lead",
            "🎯",
            &["triage", "delegation", "progress tracking"],
            "builtin",
        ),
        Agent::new(
            AgentId::Codex,
            "Codex",
            "Software engineer",
            "💻",
            &["coding", "debugging", "refactoring", "code review"],
            "codex-cli",
        ),
        Agent::new(
            AgentId::Quill,
            "Quill",
            "Copywriter",
            "✍️",
            &["writing", "editing", "documentation"],
            "claude-cli",
        ),
        Agent::new(
            AgentId::Scout,
            "Scout",
            "Research analyst",
            "🔍",
            &["research", "analysis", "summarization"],
            "gemini-cli",
        ),
        Agent::new(
            AgentId::Pixel,
            "Pixel",
            "Visual designer",
            "🎨",
            &["design", "layout", "branding"],
            "claude-cli",
        ),
        Agent::new(
            AgentId::Herald,
            "Herald",
            "Release manager",
            "📣",
            &["publishing", "deployment", "announcements"],
            "builtin",
        ),
    ]
}

/// Read-only lookup over the static roster.
///
/// Every other component validates agent identifiers against this registry
/// before acting on them.
#[derive(Debug, Clone)]
pub struct Registry {
    agents: Vec<Agent>,
}

impl Registry {
    /// Build the registry from the static roster.
    pub fn new() -> Self {
        Self::from_agents(roster())
    }

    /// Build a registry over an explicit agent list, preserving its order.
    pub fn from_agents(agents: Vec<Agent>) -> Self {
        Self { agents }
    }

    /// Look up a descriptor, or `None` for an identifier outside the roster.
    pub fn get(&self, id: AgentId) -> Option<&Agent> {
        self.agents.iter().find(|a| a.id == id)
    }

    /// Look up a descriptor, failing with a not-found error otherwise.
    pub fn require(&self, id: AgentId) -> CrewdeckResult<&Agent> {
        self.get(id)
            .ok_or_else(|| CrewdeckError::NotFound(format!("unknown agent '{id}'")))
    }

    /// All descriptors in declared roster order.
    pub fn all(&self) -> &[Agent] {
        &self.agents
    }

    /// Whether the identifier belongs to the roster.
    pub fn contains(&self, id: AgentId) -> bool {
        self.get(id).is_some()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_roster_covers_every_id() {
        let registry = Registry::new();
        assert_eq!(registry.all().len(), AgentId::ALL.len());
        for id in AgentId::ALL {
            assert!(registry.contains(id));
        }
    }

    #[test]
    fn test_roster_order_is_declared_order() {
        let registry = Registry::new();
        let ids: Vec<AgentId> = registry.all().iter().map(|a| a.id).collect();
        assert_eq!(ids, AgentId::ALL.to_vec());
    }

    #[test]
    fn test_parse_known_agent() {
        assert_eq!("codex".parse::<AgentId>().unwrap(), AgentId::Codex);
        assert_eq!(
            "coordinator".parse::<AgentId>().unwrap(),
            AgentId::Coordinator
        );
    }

    #[test]
    fn test_parse_unknown_agent_fails() {
        let err = "hal9000".parse::<AgentId>().unwrap_err();
        assert!(matches!(err, CrewdeckError::NotFound(_)));
        assert!(err.to_string().contains("hal9000"));
    }

    #[test]
    fn test_serde_roundtrip_lowercase() {
        let json = serde_json::to_string(&AgentId::Quill).unwrap();
        assert_eq!(json, "\"quill\"");
        let back: AgentId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, AgentId::Quill);
    }

    #[test]
    fn test_require_unknown_reports_id() {
        // Registry is always complete, so exercise the error path via parse.
        let registry = Registry::new();
        for id in AgentId::ALL {
            assert!(registry.require(id).is_ok());
        }
    }

    #[test]
    fn test_capabilities_nonempty() {
        for agent in Registry::new().all() {
            assert!(!agent.capabilities.is_empty(), "{} has no capabilities", agent.id);
            assert!(!agent.backend.is_empty());
        }
    }
}
