//! Development team roles.

use serde::{Deserialize, Serialize};

/// A seat on the development team.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AgentRole {
    Intern,
    Junior,
    Senior,
    Architect,
    MicroManager,
}

impl AgentRole {
    /// Every role, in seniority order.
    pub const ALL: [AgentRole; 5] = [
        Self::Intern,
        Self::Junior,
        Self::Senior,
        Self::Architect,
        Self::MicroManager,
    ];

    /// Registry name used in `Task::assigned_to`.
    pub fn key(&self) -> &'static str {
        match self {
            Self::Intern => "intern",
            Self::Junior => "junior",
            Self::Senior => "senior",
            Self::Architect => "architect",
            Self::MicroManager => "microManager",
        }
    }

    /// Job title.
    pub fn title(&self) -> &'static str {
        match self {
            Self::Intern => "Intern Developer",
            Self::Junior => "Junior Developer",
            Self::Senior => "Senior Developer",
            Self::Architect => "Software Architect",
            Self::MicroManager => "Project Coordinator",
        }
    }

    /// What the role is responsible for.
    pub fn responsibilities(&self) -> &'static [&'static str] {
        match self {
            Self::Intern => &[
                "Writing simple code snippets",
                "Documenting existing code",
                "Running basic tests",
                "Helping with routine tasks",
            ],
            Self::Junior => &[
                "Implementing well-defined features",
                "Fixing straightforward bugs",
                "Writing unit tests",
            ],
            Self::Senior => &[
                "Designing and implementing complex features",
                "Code review and quality assurance",
                "Mentoring junior developers",
                "Solving difficult technical problems",
            ],
            Self::Architect => &[
                "Designing system architecture",
                "Choosing technologies and patterns",
                "Keeping components consistent",
            ],
            Self::MicroManager => &[
                "Coordinating tasks between team members",
                "Tracking project progress",
                "Identifying bottlenecks and resolving conflicts",
            ],
        }
    }

    /// Look up a role by its registry name.
    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|role| role.key() == key)
    }
}

impl std::fmt::Display for AgentRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.title())
    }
}
