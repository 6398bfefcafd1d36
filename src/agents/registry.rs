//! Agent registry for resolving task assignees.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;

use crate::agents::roles::AgentRole;
use crate::agents::simulated::SimulatedAgent;
use crate::agents::Agent;

/// Registry of available agents, keyed by name.
pub struct AgentRegistry {
    agents: RwLock<HashMap<String, Arc<dyn Agent>>>,
}

impl AgentRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            agents: RwLock::new(HashMap::new()),
        }
    }

    /// Create a registry holding one simulated agent per team role.
    pub async fn with_team(latency: Duration) -> Self {
        let registry = Self::new();
        for role in AgentRole::ALL {
            registry
                .register(Arc::new(SimulatedAgent::new(role, latency)))
                .await;
        }
        registry
    }

    /// Register an agent under its name, replacing any previous one.
    pub async fn register(&self, agent: Arc<dyn Agent>) {
        let name = agent.name().to_string();
        if self
            .agents
            .write()
            .await
            .insert(name.clone(), agent)
            .is_some()
        {
            tracing::warn!(agent = %name, "Replaced existing agent registration");
        } else {
            tracing::debug!("Registered agent: {}", name);
        }
    }

    /// Unregister an agent.
    pub async fn unregister(&self, name: &str) -> Option<Arc<dyn Agent>> {
        self.agents.write().await.remove(name)
    }

    /// Resolve an agent by name.
    pub async fn get(&self, name: &str) -> Option<Arc<dyn Agent>> {
        self.agents.read().await.get(name).cloned()
    }

    /// Check if an agent exists.
    pub async fn has(&self, name: &str) -> bool {
        self.agents.read().await.contains_key(name)
    }

    /// List all agent names, sorted.
    pub async fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.agents.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    /// Get the number of registered agents.
    pub async fn count(&self) -> usize {
        self.agents.read().await.len()
    }
}

impl Default for AgentRegistry {
    fn default() -> Self {
        Self::new()
    }
}
