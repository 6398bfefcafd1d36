//! Simulated team member that stands in for a real agent backend.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;

use crate::agents::roles::AgentRole;
use crate::agents::Agent;
use crate::error::AgentError;

/// Maximum history entries kept per agent.
const MAX_HISTORY: usize = 200;

/// One executed task in an agent's history.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionRecord {
    pub task: String,
    pub result: String,
    pub executed_at: DateTime<Utc>,
}

#[derive(Default)]
struct AgentHistory {
    tasks: Vec<String>,
    executions: Vec<ExecutionRecord>,
}

/// Agent that waits a fixed latency and reports the task as done.
pub struct SimulatedAgent {
    role: AgentRole,
    latency: Duration,
    history: RwLock<AgentHistory>,
}

impl SimulatedAgent {
    /// Create a simulated agent for a role.
    pub fn new(role: AgentRole, latency: Duration) -> Self {
        Self {
            role,
            latency,
            history: RwLock::new(AgentHistory::default()),
        }
    }

    /// The role this agent plays.
    pub fn role(&self) -> AgentRole {
        self.role
    }

    /// Task descriptions received so far.
    pub async fn tasks(&self) -> Vec<String> {
        self.history.read().await.tasks.clone()
    }

    /// The last `n` executions, oldest first.
    pub async fn recent_history(&self, n: usize) -> Vec<ExecutionRecord> {
        let history = self.history.read().await;
        let start = history.executions.len().saturating_sub(n);
        history.executions[start..].to_vec()
    }

    /// Forget all received tasks and executions.
    pub async fn clear_history(&self) {
        let mut history = self.history.write().await;
        history.tasks.clear();
        history.executions.clear();
    }
}

#[async_trait]
impl Agent for SimulatedAgent {
    fn name(&self) -> &str {
        self.role.key()
    }

    async fn execute(&self, description: &str) -> Result<String, AgentError> {
        if description.trim().is_empty() {
            return Err(AgentError::Rejected {
                name: self.name().to_string(),
                reason: "empty task description".to_string(),
            });
        }

        self.history.write().await.tasks.push(description.to_string());
        tracing::info!(agent = %self.name(), "{} starting: {}", self.role, description);

        tokio::time::sleep(self.latency).await;

        let result = format!("{} finished: {}", self.role.title(), description);
        let mut history = self.history.write().await;
        history.executions.push(ExecutionRecord {
            task: description.to_string(),
            result: result.clone(),
            executed_at: Utc::now(),
        });
        if history.executions.len() > MAX_HISTORY {
            let drain_count = history.executions.len() - MAX_HISTORY;
            history.executions.drain(..drain_count);
        }

        Ok(result)
    }
}
