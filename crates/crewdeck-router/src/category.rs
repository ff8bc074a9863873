use crewdeck_core::AgentId;
use serde::{Deserialize, Serialize};

/// Complexity tier assigned to a classified task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    /// No recognized work kind.
    Low,
    /// One kind of work.
    Medium,
    /// Multi-step, or mixed design and coding work.
    High,
}

/// A kind of work a description can call for.
///
/// Needs are detected independently of category matching; each need maps to
/// the agent that is primary for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Need {
    /// Software engineering work.
    Coding,
    /// Prose and copy work.
    Writing,
    /// Investigation and analysis work.
    Research,
    /// Visual design work.
    Design,
    /// Release and announcement work.
    Publishing,
}

impl Need {
    /// Detection order; also the first-seen order for suggested agents.
    pub const DETECTION_ORDER: [Need; 5] = [
        Need::Coding,
        Need::Writing,
        Need::Research,
        Need::Design,
        Need::Publishing,
    ];

    /// Fixed domain priority for ordering subtasks in a multi-step plan:
    /// research informs design, design informs coding, and so on.
    pub const PLAN_ORDER: [Need; 5] = [
        Need::Research,
        Need::Design,
        Need::Coding,
        Need::Writing,
        Need::Publishing,
    ];

    /// Lowercase name, matching the serialized form.
    pub const fn as_str(self) -> &'static str {
        match self {
            Need::Coding => "coding",
            Need::Writing => "writing",
            Need::Research => "research",
            Need::Design => "design",
            Need::Publishing => "publishing",
        }
    }

    /// Keywords whose presence (as substrings of the lowercased text)
    /// signals this need.
    pub const fn keywords(self) -> &'static [&'static str] {
        match self {
            Need::Coding => &[
                "code", "bug", "fix", "implement", "refactor", "debug", "api", "代码", "修复",
                "开发", "实现", "调试",
            ],
            Need::Writing => &[
                "write", "blog", "article", "draft", "document", "copy", "写", "博客", "文章",
                "文档", "撰写",
            ],
            Need::Research => &[
                "research", "investigate", "analyze", "compare", "调研", "研究", "分析", "调查",
            ],
            Need::Design => &[
                "design", "logo", "layout", "mockup", "banner", "style", "设计", "界面", "图标",
            ],
            Need::Publishing => &[
                "publish", "release", "deploy", "announce", "发布", "上线", "部署",
            ],
        }
    }

    /// The agent that is primary for this kind of work.
    pub const fn primary_agent(self) -> AgentId {
        match self {
            Need::Coding => AgentId::Codex,
            Need::Writing => AgentId::Quill,
            Need::Research => AgentId::Scout,
            Need::Design => AgentId::Pixel,
            Need::Publishing => AgentId::Herald,
        }
    }
}

impl std::fmt::Display for Need {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A static classification rule: keyword hits vote for the category.
///
/// Categories are evaluated in declared order; ties keep the first-seen
/// category, so the order below is part of the routing behavior and must
/// not be reshuffled.
#[derive(Debug, Clone)]
pub struct TaskCategory {
    /// Category name.
    pub name: &'static str,
    /// Keywords counted as substring hits against the lowercased text.
    pub keywords: &'static [&'static str],
    /// The agent recommended when this category wins.
    pub primary: AgentId,
    /// Alternatives offered when the primary is unavailable.
    pub fallbacks: &'static [AgentId],
    /// Typical complexity of work in this category.
    pub tier: Complexity,
}

/// The ordered category rule list.
///
/// A flat priority list rather than nested conditionals: adding a category
/// means adding a row, not touching control flow.
pub const fn categories() -> &'static [TaskCategory] {
    CATEGORIES
}

const CATEGORIES: &[TaskCategory] = &[
    TaskCategory {
        name: "coding",
        keywords: Need::Coding.keywords(),
        primary: AgentId::Codex,
        fallbacks: &[AgentId::Scout],
        tier: Complexity::Medium,
    },
    TaskCategory {
        name: "writing",
        keywords: Need::Writing.keywords(),
        primary: AgentId::Quill,
        fallbacks: &[AgentId::Scout],
        tier: Complexity::Medium,
    },
    TaskCategory {
        name: "research",
        keywords: Need::Research.keywords(),
        primary: AgentId::Scout,
        fallbacks: &[AgentId::Quill],
        tier: Complexity::Medium,
    },
    TaskCategory {
        name: "design",
        keywords: Need::Design.keywords(),
        primary: AgentId::Pixel,
        fallbacks: &[AgentId::Quill],
        tier: Complexity::Medium,
    },
    TaskCategory {
        name: "publishing",
        keywords: Need::Publishing.keywords(),
        primary: AgentId::Herald,
        fallbacks: &[AgentId::Quill],
        tier: Complexity::Low,
    },
];

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_category_order_is_stable() {
        let names: Vec<&str> = categories().iter().map(|c| c.name).collect();
        assert_eq!(
            names,
            ["coding", "writing", "research", "design", "publishing"]
        );
    }

    #[test]
    fn test_each_need_has_unique_primary() {
        let mut primaries: Vec<AgentId> = Need::DETECTION_ORDER
            .iter()
            .map(|n| n.primary_agent())
            .collect();
        primaries.dedup();
        assert_eq!(primaries.len(), Need::DETECTION_ORDER.len());
    }

    #[test]
    fn test_coordinator_is_never_a_primary() {
        for need in Need::DETECTION_ORDER {
            assert_ne!(need.primary_agent(), AgentId::Coordinator);
        }
        for category in categories() {
            assert_ne!(category.primary, AgentId::Coordinator);
            assert!(!category.fallbacks.contains(&AgentId::Coordinator));
        }
    }

    #[test]
    fn test_plan_order_covers_every_need() {
        for need in Need::DETECTION_ORDER {
            assert!(Need::PLAN_ORDER.contains(&need));
        }
    }
}
