//! Agents: named workers that execute task descriptions.

pub mod registry;
pub mod roles;
pub mod simulated;

use async_trait::async_trait;

use crate::error::AgentError;

pub use registry::AgentRegistry;
pub use roles::AgentRole;
pub use simulated::SimulatedAgent;

/// A worker capability.
///
/// Agents only produce a result or an error. They never touch task state;
/// the scheduler owns every status write.
#[async_trait]
pub trait Agent: Send + Sync {
    /// Registry name of the agent.
    fn name(&self) -> &str;

    /// Execute a task description and return its result.
    async fn execute(&self, description: &str) -> Result<String, AgentError>;
}
