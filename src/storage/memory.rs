use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::{StorageError, Store};
use crate::group::Group;
use crate::identity::Identity;
use crate::message::StoredMessage;

/// Process-local store. Each instance is independent; nothing is global.
#[derive(Default)]
pub struct MemoryStore {
    identities: RwLock<HashMap<String, Identity>>,
    groups: RwLock<HashMap<String, Group>>,
    messages: RwLock<Vec<StoredMessage>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get_identity(&self, address: &str) -> Result<Option<Identity>, StorageError> {
        Ok(self.identities.read().await.get(address).cloned())
    }

    async fn put_identity(&self, identity: Identity) -> Result<(), StorageError> {
        self.identities
            .write()
            .await
            .insert(identity.address.to_string(), identity);
        Ok(())
    }

    async fn get_group(&self, id: &str) -> Result<Option<Group>, StorageError> {
        Ok(self.groups.read().await.get(id).cloned())
    }

    async fn put_group(&self, group: Group) -> Result<(), StorageError> {
        self.groups.write().await.insert(group.id.clone(), group);
        Ok(())
    }

    async fn append_message(&self, message: StoredMessage) -> Result<(), StorageError> {
        self.messages.write().await.push(message);
        Ok(())
    }

    async fn query_messages_for_recipient(
        &self,
        address: &str,
    ) -> Result<Vec<StoredMessage>, StorageError> {
        Ok(self
            .messages
            .read()
            .await
            .iter()
            .filter(|m| m.is_for(address))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::Address;
    use crate::message::Message;
    use ed25519_dalek::SigningKey;
    use rand::rngs::OsRng;

    #[tokio::test]
    async fn test_identity_upsert() {
        let store = MemoryStore::new();
        let address = Address::parse("alice#emsg.dev").unwrap();
        assert!(store.get_identity("alice#emsg.dev").await.unwrap().is_none());

        let mut identity = Identity::new(address, SigningKey::generate(&mut OsRng).verifying_key());
        store.put_identity(identity.clone()).await.unwrap();

        identity.first_name = "Alice".to_string();
        store.put_identity(identity.clone()).await.unwrap();

        let loaded = store.get_identity("alice#emsg.dev").await.unwrap().unwrap();
        assert_eq!(loaded.first_name, "Alice");
    }

    #[tokio::test]
    async fn test_query_by_recipient() {
        let store = MemoryStore::new();
        let msg = Message {
            from: "alice#emsg.dev".to_string(),
            to: vec!["bob#emsg.dev".to_string()],
            body: "hi".to_string(),
            ..Default::default()
        };
        store
            .append_message(StoredMessage::new(
                msg.clone(),
                vec!["bob#emsg.dev".to_string(), "carol#emsg.dev".to_string()],
            ))
            .await
            .unwrap();
        store
            .append_message(StoredMessage::new(msg, vec!["carol#emsg.dev".to_string()]))
            .await
            .unwrap();

        assert_eq!(store.query_messages_for_recipient("bob#emsg.dev").await.unwrap().len(), 1);
        assert_eq!(store.query_messages_for_recipient("carol#emsg.dev").await.unwrap().len(), 2);
        // substring matches must not leak messages
        assert!(store.query_messages_for_recipient("ob#emsg.dev").await.unwrap().is_empty());
    }
}
