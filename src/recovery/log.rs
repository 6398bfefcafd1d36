//! Central record of task failures.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::memory::{ContextMemory, MemoryKind};

/// A recorded failure.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorRecord {
    /// Unique record ID.
    pub id: Uuid,
    /// Display form of the error.
    pub message: String,
    /// The error's `source()` chain, outermost cause first.
    pub trace: Option<String>,
    /// What was being done when the error occurred.
    pub context: String,
    /// Agent the failure is attributed to.
    pub agent: Option<String>,
    /// Attempts made before giving up, when the failure went through retry.
    pub retry_count: Option<u32>,
    /// When the failure was recorded.
    pub timestamp: DateTime<Utc>,
    /// Whether someone has dealt with it.
    pub resolved: bool,
}

/// Selects records for reading or clearing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorFilter<'a> {
    All,
    Agent(&'a str),
}

impl ErrorFilter<'_> {
    fn matches(&self, record: &ErrorRecord) -> bool {
        match self {
            Self::All => true,
            Self::Agent(name) => record.agent.as_deref() == Some(*name),
        }
    }
}

/// In-memory error log.
pub struct ErrorLog {
    records: RwLock<Vec<ErrorRecord>>,
    memory: Arc<ContextMemory>,
}

impl ErrorLog {
    /// Create an error log that mirrors agent failures into `memory`.
    pub fn new(memory: Arc<ContextMemory>) -> Self {
        Self {
            records: RwLock::new(Vec::new()),
            memory,
        }
    }

    /// Record an error.
    ///
    /// When `agent` is given, an `error`-tagged observation is also appended
    /// to that agent's contextual memory.
    pub async fn record<E>(&self, error: &E, context: &str, agent: Option<&str>) -> ErrorRecord
    where
        E: std::error::Error + ?Sized,
    {
        self.record_with_retries(error, context, agent, None).await
    }

    /// Record an error that survived `retry_count` attempts.
    pub async fn record_with_retries<E>(
        &self,
        error: &E,
        context: &str,
        agent: Option<&str>,
        retry_count: Option<u32>,
    ) -> ErrorRecord
    where
        E: std::error::Error + ?Sized,
    {
        let record = ErrorRecord {
            id: Uuid::new_v4(),
            message: error.to_string(),
            trace: source_chain(error),
            context: context.to_string(),
            agent: agent.map(str::to_string),
            retry_count,
            timestamp: Utc::now(),
            resolved: false,
        };

        tracing::error!(
            agent = agent.unwrap_or("-"),
            context = %context,
            "Error during {}: {}",
            context,
            record.message
        );

        self.records.write().await.push(record.clone());

        if let Some(agent) = agent {
            self.memory
                .record(
                    agent,
                    MemoryKind::Observation,
                    format!("Error during {}: {}", context, record.message),
                    ["error".to_string(), context.to_string()],
                )
                .await;
        }

        record
    }

    /// Records matching the filter, oldest first.
    pub async fn records(&self, filter: ErrorFilter<'_>) -> Vec<ErrorRecord> {
        self.records
            .read()
            .await
            .iter()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect()
    }

    /// Remove records matching the filter. Returns how many were removed.
    pub async fn clear(&self, filter: ErrorFilter<'_>) -> usize {
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|r| !filter.matches(r));
        before - records.len()
    }

    /// Mark a record as resolved. Returns false if no such record exists.
    pub async fn mark_resolved(&self, id: Uuid) -> bool {
        match self.records.write().await.iter_mut().find(|r| r.id == id) {
            Some(record) => {
                record.resolved = true;
                true
            }
            None => false,
        }
    }

    /// Number of records not yet resolved.
    pub async fn unresolved_count(&self) -> usize {
        self.records
            .read()
            .await
            .iter()
            .filter(|r| !r.resolved)
            .count()
    }
}

fn source_chain<E>(error: &E) -> Option<String>
where
    E: std::error::Error + ?Sized,
{
    let mut causes = Vec::new();
    let mut source = error.source();
    while let Some(cause) = source {
        causes.push(cause.to_string());
        source = cause.source();
    }

    if causes.is_empty() {
        None
    } else {
        Some(causes.join(": "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AgentError;

    #[derive(Debug, thiserror::Error)]
    #[error("deploy failed")]
    struct DeployError {
        #[source]
        cause: std::io::Error,
    }

    fn log() -> (ErrorLog, Arc<ContextMemory>) {
        let memory = Arc::new(ContextMemory::new());
        (ErrorLog::new(Arc::clone(&memory)), memory)
    }

    fn failure(name: &str) -> AgentError {
        AgentError::ExecutionFailed {
            name: name.to_string(),
            reason: "boom".to_string(),
        }
    }

    #[tokio::test]
    async fn record_without_agent() {
        let (log, memory) = log();
        let record = log.record(&failure("intern"), "task execution", None).await;

        assert_eq!(record.message, "Agent intern failed: boom");
        assert_eq!(record.context, "task execution");
        assert!(!record.resolved);
        assert!(record.agent.is_none());
        assert!(memory.is_empty().await);
        assert_eq!(log.records(ErrorFilter::All).await.len(), 1);
    }

    #[tokio::test]
    async fn record_with_agent_writes_memory() {
        let (log, memory) = log();
        log.record(&failure("senior"), "code review", Some("senior"))
            .await;

        let entries = memory.entries_by_agent("senior").await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].kind, MemoryKind::Observation);
        assert!(entries[0].has_tag("error"));
        assert!(entries[0].has_tag("code review"));
        assert!(entries[0].content.contains("boom"));
    }

    #[tokio::test]
    async fn captures_source_chain() {
        let (log, _) = log();
        let error = DeployError {
            cause: std::io::Error::other("disk full"),
        };
        let record = log.record(&error, "deploy", None).await;

        assert_eq!(record.message, "deploy failed");
        assert_eq!(record.trace.as_deref(), Some("disk full"));
    }

    #[tokio::test]
    async fn filter_and_clear_by_agent() {
        let (log, _) = log();
        log.record(&failure("intern"), "a", Some("intern")).await;
        log.record(&failure("junior"), "b", Some("junior")).await;
        log.record(&failure("intern"), "c", Some("intern")).await;

        assert_eq!(log.records(ErrorFilter::Agent("intern")).await.len(), 2);
        assert_eq!(log.clear(ErrorFilter::Agent("intern")).await, 2);
        assert_eq!(log.records(ErrorFilter::All).await.len(), 1);
        assert_eq!(log.clear(ErrorFilter::All).await, 1);
        assert!(log.records(ErrorFilter::All).await.is_empty());
    }

    #[tokio::test]
    async fn mark_resolved() {
        let (log, _) = log();
        let record = log
            .record_with_retries(&failure("junior"), "task execution", Some("junior"), Some(3))
            .await;
        assert_eq!(record.retry_count, Some(3));
        assert_eq!(log.unresolved_count().await, 1);

        assert!(log.mark_resolved(record.id).await);
        assert!(!log.mark_resolved(Uuid::new_v4()).await);
        assert_eq!(log.unresolved_count().await, 0);
    }
}
