// ============================================================================
// Persistence Interface
// ============================================================================
//
// The daemon consumes one small get/put interface. Backends are adapters;
// `MemoryStore` is the bundled one.
//
// ============================================================================

mod memory;

use async_trait::async_trait;
use thiserror::Error;

use crate::group::Group;
use crate::identity::Identity;
use crate::message::StoredMessage;

pub use memory::MemoryStore;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    #[error("storage backend error: {0}")]
    Backend(String),
}

#[async_trait]
pub trait Store: Send + Sync {
    async fn get_identity(&self, address: &str) -> Result<Option<Identity>, StorageError>;

    /// Insert or replace the identity keyed by its address
    async fn put_identity(&self, identity: Identity) -> Result<(), StorageError>;

    async fn get_group(&self, id: &str) -> Result<Option<Group>, StorageError>;

    /// Insert or replace the group keyed by its id
    async fn put_group(&self, group: Group) -> Result<(), StorageError>;

    async fn append_message(&self, message: StoredMessage) -> Result<(), StorageError>;

    /// Messages whose expanded recipient list contains `address`, oldest first
    async fn query_messages_for_recipient(
        &self,
        address: &str,
    ) -> Result<Vec<StoredMessage>, StorageError>;
}
