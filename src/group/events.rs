// ============================================================================
// System Event Log
// ============================================================================
//
// Append-only audit trail of group transitions. Not a delivery queue; the
// broadcast side channel lets other components observe appends.
//
// ============================================================================

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::{broadcast, RwLock};

use crate::storage::StorageError;

const BROADCAST_CAPACITY: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SystemEventKind {
    GroupCreated,
    UserJoined,
    UserLeft,
    UserRemoved,
    AdminAssigned,
    AdminRevoked,
    GroupRenamed,
    DescriptionUpdated,
    DpUpdated,
}

impl SystemEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SystemEventKind::GroupCreated => "group_created",
            SystemEventKind::UserJoined => "user_joined",
            SystemEventKind::UserLeft => "user_left",
            SystemEventKind::UserRemoved => "user_removed",
            SystemEventKind::AdminAssigned => "admin_assigned",
            SystemEventKind::AdminRevoked => "admin_revoked",
            SystemEventKind::GroupRenamed => "group_renamed",
            SystemEventKind::DescriptionUpdated => "description_updated",
            SystemEventKind::DpUpdated => "dp_updated",
        }
    }
}

impl fmt::Display for SystemEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemEvent {
    pub kind: SystemEventKind,
    pub group_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    pub timestamp: i64,
}

impl SystemEvent {
    pub fn new(kind: SystemEventKind, group_id: &str, subject: Option<String>) -> Self {
        Self {
            kind,
            group_id: group_id.to_string(),
            subject,
            timestamp: Utc::now().timestamp(),
        }
    }

    /// Human readable line, used as the body of relayed system messages
    pub fn describe(&self) -> String {
        format!(
            "[SYSTEM] {}: user {} in group {}",
            self.kind,
            self.subject.as_deref().unwrap_or(""),
            self.group_id
        )
    }
}

#[async_trait]
pub trait SystemEventLog: Send + Sync {
    async fn append(&self, event: SystemEvent) -> Result<(), StorageError>;

    async fn events_for_group(&self, group_id: &str) -> Result<Vec<SystemEvent>, StorageError>;

    async fn len(&self) -> Result<usize, StorageError>;

    /// Receive every event appended after this call
    fn subscribe(&self) -> broadcast::Receiver<SystemEvent>;
}

pub struct InMemoryEventLog {
    events: RwLock<Vec<SystemEvent>>,
    sender: broadcast::Sender<SystemEvent>,
}

impl InMemoryEventLog {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self {
            events: RwLock::new(Vec::new()),
            sender,
        }
    }
}

impl Default for InMemoryEventLog {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SystemEventLog for InMemoryEventLog {
    async fn append(&self, event: SystemEvent) -> Result<(), StorageError> {
        self.events.write().await.push(event.clone());
        // No subscribers is fine
        let _ = self.sender.send(event);
        Ok(())
    }

    async fn events_for_group(&self, group_id: &str) -> Result<Vec<SystemEvent>, StorageError> {
        Ok(self
            .events
            .read()
            .await
            .iter()
            .filter(|e| e.group_id == group_id)
            .cloned()
            .collect())
    }

    async fn len(&self) -> Result<usize, StorageError> {
        Ok(self.events.read().await.len())
    }

    fn subscribe(&self) -> broadcast::Receiver<SystemEvent> {
        self.sender.subscribe()
    }
}
