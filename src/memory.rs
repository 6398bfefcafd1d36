//! Shared contextual memory log.
//!
//! An append-only record of what each agent saw, thought and did. The
//! scheduler itself never writes here; the error log does when a failure
//! can be attributed to an agent.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

/// Kind of memory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryKind {
    Task,
    Observation,
    Thought,
    Action,
    Result,
}

/// A single entry in the memory log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryEntry {
    /// Unique entry ID.
    pub id: Uuid,
    /// Agent the entry belongs to.
    pub agent_name: String,
    /// What kind of entry this is.
    pub kind: MemoryKind,
    /// Entry text.
    pub content: String,
    /// Free-form labels for filtering.
    pub tags: BTreeSet<String>,
    /// When the entry was appended.
    pub timestamp: DateTime<Utc>,
}

impl MemoryEntry {
    /// Create a new entry stamped with the current time.
    pub fn new(
        agent_name: impl Into<String>,
        kind: MemoryKind,
        content: impl Into<String>,
        tags: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            agent_name: agent_name.into(),
            kind,
            content: content.into(),
            tags: tags.into_iter().map(Into::<String>::into).collect(),
            timestamp: Utc::now(),
        }
    }

    /// Check whether the entry carries a tag.
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }
}

/// Append-only memory shared by all agents.
#[derive(Default)]
pub struct ContextMemory {
    entries: RwLock<Vec<MemoryEntry>>,
}

impl ContextMemory {
    /// Create an empty memory log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry.
    pub async fn append(&self, entry: MemoryEntry) {
        tracing::trace!(
            agent = %entry.agent_name,
            kind = ?entry.kind,
            "Appended memory entry"
        );
        self.entries.write().await.push(entry);
    }

    /// Build and append an entry in one call.
    pub async fn record(
        &self,
        agent_name: impl Into<String>,
        kind: MemoryKind,
        content: impl Into<String>,
        tags: impl IntoIterator<Item = impl Into<String>>,
    ) {
        self.append(MemoryEntry::new(agent_name, kind, content, tags))
            .await;
    }

    /// Entries belonging to an agent, oldest first.
    pub async fn entries_by_agent(&self, agent_name: &str) -> Vec<MemoryEntry> {
        self.filtered(|e| e.agent_name == agent_name).await
    }

    /// Entries of a kind, oldest first.
    pub async fn entries_by_kind(&self, kind: MemoryKind) -> Vec<MemoryEntry> {
        self.filtered(|e| e.kind == kind).await
    }

    /// Entries carrying a tag, oldest first.
    pub async fn entries_with_tag(&self, tag: &str) -> Vec<MemoryEntry> {
        self.filtered(|e| e.has_tag(tag)).await
    }

    /// Every entry, oldest first.
    pub async fn all_entries(&self) -> Vec<MemoryEntry> {
        self.entries.read().await.clone()
    }

    /// Number of entries.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Check if empty.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Drop every entry.
    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }

    async fn filtered(&self, predicate: impl Fn(&MemoryEntry) -> bool) -> Vec<MemoryEntry> {
        self.entries
            .read()
            .await
            .iter()
            .filter(|e| predicate(*e))
            .cloned()
            .collect()
    }
}
