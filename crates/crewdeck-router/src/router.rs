use crate::category::{categories, Complexity, Need, TaskCategory};
use crewdeck_core::{AgentId, CrewdeckError, CrewdeckResult};
use crewdeck_state::{AgentStatus, StateStore};
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

/// Connectives whose presence marks a description as staged work.
const SEQUENCING_CONNECTIVES: &[&str] = &[
    "then", "after that", "next", "also", "finally", "然后", "接着", "之后", "最后",
];

/// Need combinations that imply staged work even without a connective.
const STAGED_COMBOS: &[(Need, Need)] = &[
    (Need::Coding, Need::Writing),
    (Need::Research, Need::Writing),
    (Need::Design, Need::Coding),
];

/// Recommended when a description matches nothing at all.
const DEFAULT_AGENT: AgentId = AgentId::Codex;

const BASE_CONFIDENCE: u8 = 50;
const CONFIDENCE_CAP: u8 = 95;

/// How the recommended agents should execute the task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// One agent handles the whole task.
    Single,
    /// Multiple agents, in subtask order.
    Sequential,
    /// Multiple agents, independently.
    Parallel,
}

/// One step of a multi-step plan, bound to the need's primary agent.
#[derive(Debug, Clone, Serialize)]
pub struct Subtask {
    /// 1-based position in the plan.
    pub step: usize,
    /// The kind of work this step covers.
    pub need: Need,
    /// The agent bound to this step.
    pub agent: AgentId,
}

/// Output of the pure text-classification step.
#[derive(Debug, Clone)]
pub struct Classification {
    /// Winning category, if any keyword scored.
    pub category: Option<&'static TaskCategory>,
    /// Active needs, in detection order.
    pub needs: Vec<Need>,
    /// Whether the description reads as staged work.
    pub multi_step: bool,
    /// Derived complexity tier.
    pub complexity: Complexity,
    /// Primaries of the active needs, first-seen order; never empty.
    pub suggested_agents: Vec<AgentId>,
    /// How the suggested agents should execute.
    pub mode: ExecutionMode,
    /// Ordered plan; empty unless multi-step.
    pub subtasks: Vec<Subtask>,
    /// Confidence score, 0–100.
    pub confidence: u8,
    /// The single recommendation. A matched category's primary takes
    /// precedence over the needs-derived suggestions.
    pub primary: AgentId,
}

/// Classify a task description. Pure: no state, no side effects.
pub fn classify(description: &str) -> CrewdeckResult<Classification> {
    if description.trim().is_empty() {
        return Err(CrewdeckError::Validation(
            "task description must not be empty".to_string(),
        ));
    }
    let text = description.to_lowercase();

    // Highest keyword count wins; ties keep the first-seen category.
    let mut category: Option<&'static TaskCategory> = None;
    let mut best_hits = 0usize;
    for candidate in categories() {
        let hits = candidate
            .keywords
            .iter()
            .filter(|k| text.contains(**k))
            .count();
        if hits > best_hits {
            best_hits = hits;
            category = Some(candidate);
        }
    }

    let needs: Vec<Need> = Need::DETECTION_ORDER
        .into_iter()
        .filter(|need| need.keywords().iter().any(|k| text.contains(*k)))
        .collect();

    let has_connective = SEQUENCING_CONNECTIVES.iter().any(|c| text.contains(*c));
    let staged_combo = STAGED_COMBOS
        .iter()
        .any(|(a, b)| needs.contains(a) && needs.contains(b));
    let multi_step = has_connective || staged_combo;

    let complexity = if multi_step || (needs.contains(&Need::Coding) && needs.contains(&Need::Design))
    {
        Complexity::High
    } else if needs.is_empty() {
        Complexity::Low
    } else {
        Complexity::Medium
    };

    let mut suggested_agents: Vec<AgentId> = Vec::new();
    for need in &needs {
        let agent = need.primary_agent();
        if !suggested_agents.contains(&agent) {
            suggested_agents.push(agent);
        }
    }
    if suggested_agents.is_empty() {
        suggested_agents.push(DEFAULT_AGENT);
    }

    let mode = if suggested_agents.len() == 1 {
        ExecutionMode::Single
    } else if multi_step {
        ExecutionMode::Sequential
    } else {
        ExecutionMode::Parallel
    };

    let subtasks: Vec<Subtask> = if multi_step {
        Need::PLAN_ORDER
            .into_iter()
            .filter(|need| needs.contains(need))
            .enumerate()
            .map(|(i, need)| Subtask {
                step: i + 1,
                need,
                agent: need.primary_agent(),
            })
            .collect()
    } else {
        Vec::new()
    };

    let mut confidence = BASE_CONFIDENCE;
    if category.is_some() {
        confidence += 10;
    }
    if complexity == Complexity::High {
        confidence += 10;
    }
    let confidence = confidence.min(CONFIDENCE_CAP);

    // The documented tie-break: a matched category's primary wins over the
    // needs-derived suggestion set.
    let primary = category.map_or(suggested_agents[0], |c| c.primary);

    Ok(Classification {
        category,
        needs,
        multi_step,
        complexity,
        suggested_agents,
        mode,
        subtasks,
        confidence,
        primary,
    })
}

/// The routing recommendation returned to the dispatch surface.
#[derive(Debug, Clone, Serialize)]
pub struct RoutingDecision {
    /// The single recommended agent.
    pub agent: AgentId,
    /// Whether that agent is free to take the task right now.
    pub available: bool,
    /// Confidence score, 0–100.
    pub confidence: u8,
    /// Human-readable justification for the recommendation.
    pub reasoning: String,
    /// Winning category name, if any.
    pub category: Option<String>,
    /// Alternatives from the winning category, if any.
    pub fallbacks: Vec<AgentId>,
    /// Derived complexity tier.
    pub complexity: Complexity,
    /// How the suggested agents should execute.
    pub mode: ExecutionMode,
    /// Whether the description reads as staged work.
    pub multi_step: bool,
    /// Active needs, in detection order.
    pub needs: Vec<Need>,
    /// Primaries of the active needs, first-seen order.
    pub suggested_agents: Vec<AgentId>,
    /// Ordered plan; empty unless multi-step.
    pub subtasks: Vec<Subtask>,
}

/// Routes free-text task descriptions to the best-fit agent.
///
/// Stateless per call: classification is pure and the only state touched is
/// a read-only snapshot for the availability flag.
pub struct TaskRouter {
    store: Arc<StateStore>,
}

impl TaskRouter {
    /// Create a router over the process-wide state store.
    pub fn new(store: Arc<StateStore>) -> Self {
        Self { store }
    }

    /// Analyze a description into a [`RoutingDecision`].
    pub async fn analyze(&self, description: &str) -> CrewdeckResult<RoutingDecision> {
        let classification = classify(description)?;
        let available = self
            .store
            .get(classification.primary)
            .await
            .map_or(true, |state| state.status != AgentStatus::Working);

        let reasoning = self.reasoning(&classification);
        debug!(
            agent = %classification.primary,
            category = classification.category.map(|c| c.name),
            confidence = classification.confidence,
            multi_step = classification.multi_step,
            "Task classified"
        );

        Ok(RoutingDecision {
            agent: classification.primary,
            available,
            confidence: classification.confidence,
            reasoning,
            category: classification.category.map(|c| c.name.to_string()),
            fallbacks: classification
                .category
                .map(|c| c.fallbacks.to_vec())
                .unwrap_or_default(),
            complexity: classification.complexity,
            mode: classification.mode,
            multi_step: classification.multi_step,
            needs: classification.needs,
            suggested_agents: classification.suggested_agents,
            subtasks: classification.subtasks,
        })
    }

    fn reasoning(&self, classification: &Classification) -> String {
        let category_part = classification.category.map_or_else(
            || "no category matched".to_string(),
            |c| format!("matched category '{}'", c.name),
        );
        let step_part = if classification.multi_step {
            "staged into a multi-step plan"
        } else {
            "handled as a single step"
        };
        let agent_part = self.store.registry().get(classification.primary).map_or_else(
            || classification.primary.to_string(),
            |agent| format!("{} covers {}", agent.name, agent.capabilities.join(", ")),
        );
        format!("{category_part}; {step_part}; {agent_part}")
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crewdeck_bus::EventBus;
    use crewdeck_core::Registry;
    use crewdeck_state::{Session, SessionStatus, SessionUpdate};
    use uuid::Uuid;

    fn router() -> TaskRouter {
        let store = Arc::new(StateStore::new(Registry::new(), Arc::new(EventBus::new())));
        TaskRouter::new(store)
    }

    #[test]
    fn test_blank_description_rejected() {
        assert!(matches!(
            classify("   "),
            Err(CrewdeckError::Validation(_))
        ));
        assert!(matches!(classify(""), Err(CrewdeckError::Validation(_))));
    }

    #[test]
    fn test_chinese_blog_post_routes_to_writing() {
        let c = classify("写一篇关于 AI 的博客").unwrap();
        assert_eq!(c.category.unwrap().name, "writing");
        assert_eq!(c.primary, AgentId::Quill);
        assert_eq!(c.mode, ExecutionMode::Single);
        assert_eq!(c.complexity, Complexity::Medium);
        assert_eq!(c.confidence, 60);
        assert!(!c.multi_step);
    }

    #[test]
    fn test_design_then_coding_is_sequential_high() {
        let c = classify("设计 logo 然后开发网站").unwrap();
        assert_eq!(c.complexity, Complexity::High);
        assert_eq!(c.mode, ExecutionMode::Sequential);
        assert!(c.multi_step);
        assert!(!c.subtasks.is_empty());
        assert_eq!(c.subtasks[0].need, Need::Design);
        assert_eq!(c.subtasks[1].need, Need::Coding);
        assert_eq!(c.subtasks[0].step, 1);
        // Two design hits beat one coding hit.
        assert_eq!(c.category.unwrap().name, "design");
        assert_eq!(c.primary, AgentId::Pixel);
        assert_eq!(c.confidence, 70);
    }

    #[test]
    fn test_staged_combo_without_connective_is_multi_step() {
        // research + writing is a staged combination.
        let c = classify("research the market and write a report").unwrap();
        assert!(c.multi_step);
        assert_eq!(c.mode, ExecutionMode::Sequential);
        assert_eq!(c.subtasks[0].need, Need::Research);
        assert_eq!(c.subtasks[1].need, Need::Writing);
    }

    #[test]
    fn test_independent_needs_run_parallel() {
        // research + publishing is not a staged combination.
        let c = classify("research competitors and announce pricing").unwrap();
        assert!(!c.multi_step);
        assert_eq!(c.mode, ExecutionMode::Parallel);
        assert_eq!(
            c.suggested_agents,
            vec![AgentId::Scout, AgentId::Herald]
        );
        assert!(c.subtasks.is_empty());
    }

    #[test]
    fn test_tie_keeps_first_declared_category() {
        // One coding hit and one research hit; coding is declared first.
        let c = classify("fix the research").unwrap();
        assert_eq!(c.category.unwrap().name, "coding");
        assert_eq!(c.primary, AgentId::Codex);
    }

    #[test]
    fn test_unmatched_text_falls_back_to_default_agent() {
        let c = classify("hello there").unwrap();
        assert!(c.category.is_none());
        assert!(c.needs.is_empty());
        assert_eq!(c.primary, AgentId::Codex);
        assert_eq!(c.complexity, Complexity::Low);
        assert_eq!(c.mode, ExecutionMode::Single);
        assert_eq!(c.confidence, 50);
    }

    #[test]
    fn test_category_primary_wins_over_needs_suggestion() {
        // Two research hits win the category; the writing need is detected
        // first, so the suggestion set starts with quill. The matched
        // category's primary still takes precedence.
        let c = classify("调研并分析数据，然后写总结").unwrap();
        assert_eq!(c.category.unwrap().name, "research");
        assert_eq!(c.suggested_agents[0], AgentId::Quill);
        assert_eq!(c.primary, AgentId::Scout);
    }

    #[tokio::test]
    async fn test_analyze_reports_busy_agent_unavailable() {
        let bus = Arc::new(EventBus::new());
        let store = Arc::new(StateStore::new(Registry::new(), bus));
        let router = TaskRouter::new(Arc::clone(&store));

        let decision = router.analyze("fix the login bug").await.unwrap();
        assert_eq!(decision.agent, AgentId::Codex);
        assert!(decision.available);

        let session = Session::new(Uuid::new_v4(), AgentId::Codex, "t-1");
        store.add_session(session.clone()).await;
        store
            .update_session(session.id, SessionUpdate::status(SessionStatus::Running))
            .await
            .unwrap();

        let decision = router.analyze("fix the login bug").await.unwrap();
        assert!(!decision.available);
    }

    #[tokio::test]
    async fn test_analyze_reasoning_mentions_category_and_capabilities() {
        let router = router();
        let decision = router.analyze("写一篇关于 AI 的博客").await.unwrap();
        assert!(decision.reasoning.contains("writing"));
        assert!(decision.reasoning.contains("Quill"));
        assert_eq!(decision.category.as_deref(), Some("writing"));
        assert_eq!(decision.fallbacks, vec![AgentId::Scout]);
    }

    #[tokio::test]
    async fn test_analyze_rejects_blank_description() {
        let router = router();
        let err = router.analyze("  \t ").await.unwrap_err();
        assert!(matches!(err, CrewdeckError::Validation(_)));
    }
}
