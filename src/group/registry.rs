use async_trait::async_trait;
use serde::Deserialize;
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, PoisonError};

use super::events::{SystemEvent, SystemEventKind, SystemEventLog};
use super::{Group, GroupError, GroupMutation};
use crate::address::Address;
use crate::storage::{StorageError, Store};

/// Parameters for creating a group
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewGroup {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub display_picture: String,
    #[serde(default)]
    pub members: Vec<String>,
}

/// Read-only view used by recipient expansion
#[async_trait]
pub trait GroupLookup: Send + Sync {
    /// Members of `id`, or `None` if no such group exists
    async fn group_members(&self, id: &str) -> Result<Option<BTreeSet<String>>, StorageError>;
}

type LockMap = Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>;

/// Claim on one group's lock; the map entry goes away with the last claim
struct LockLease<'a> {
    locks: &'a LockMap,
    id: String,
    lock: Arc<tokio::sync::Mutex<()>>,
}

impl Drop for LockLease<'_> {
    fn drop(&mut self) {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        // map + this lease
        if Arc::strong_count(&self.lock) == 2
            && locks.get(&self.id).is_some_and(|l| Arc::ptr_eq(l, &self.lock))
        {
            locks.remove(&self.id);
        }
    }
}

/// Owns every group transition
///
/// Each mutation runs load -> authorize -> apply -> put -> append under a
/// per-group async lock, so concurrent calls on one group are linearized and
/// the event log order matches the order in which state changed. Lock
/// entries exist only while some call holds or awaits them.
pub struct GroupRegistry {
    store: Arc<dyn Store>,
    events: Arc<dyn SystemEventLog>,
    locks: LockMap,
}

impl GroupRegistry {
    pub fn new(store: Arc<dyn Store>, events: Arc<dyn SystemEventLog>) -> Self {
        Self {
            store,
            events,
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn events(&self) -> &Arc<dyn SystemEventLog> {
        &self.events
    }

    fn lease(&self, id: &str) -> LockLease<'_> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        let lock = locks.entry(id.to_string()).or_default().clone();
        LockLease {
            locks: &self.locks,
            id: id.to_string(),
            lock,
        }
    }

    #[cfg(test)]
    fn lock_count(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Create a group; the creator becomes both admin and member
    pub async fn create(&self, new: NewGroup, creator: &Address) -> Result<Group, GroupError> {
        let mut missing = Vec::new();
        if new.id.is_empty() {
            missing.push("id");
        }
        if new.name.is_empty() {
            missing.push("name");
        }
        if !missing.is_empty() {
            return Err(GroupError::MissingFields(missing.join(", ")));
        }

        let mut members = BTreeSet::new();
        for member in &new.members {
            members.insert(Address::parse(member)?.to_string());
        }
        members.insert(creator.to_string());

        let lease = self.lease(&new.id);
        let _guard = lease.lock.lock().await;

        if self.store.get_group(&new.id).await?.is_some() {
            return Err(GroupError::GroupExists(new.id));
        }

        let group = Group {
            id: new.id,
            name: new.name,
            description: new.description,
            display_picture: new.display_picture,
            members,
            admins: BTreeSet::from([creator.to_string()]),
        };

        self.store.put_group(group.clone()).await?;
        self.events
            .append(SystemEvent::new(
                SystemEventKind::GroupCreated,
                &group.id,
                Some(creator.to_string()),
            ))
            .await?;

        tracing::info!(
            group_id = %group.id,
            members = group.members.len(),
            "Group created"
        );

        Ok(group)
    }

    pub async fn find(&self, id: &str) -> Result<Option<Group>, GroupError> {
        Ok(self.store.get_group(id).await?)
    }

    pub async fn get(&self, id: &str) -> Result<Group, GroupError> {
        self.find(id)
            .await?
            .ok_or_else(|| GroupError::NotFound(id.to_string()))
    }

    /// Apply one transition and record its event
    pub async fn mutate(&self, id: &str, mutation: GroupMutation) -> Result<Group, GroupError> {
        self.transition(id, None, mutation).await
    }

    /// Apply one transition on behalf of `caller`
    ///
    /// The permission check sees the same group state the transition is
    /// applied to.
    pub async fn mutate_as(
        &self,
        id: &str,
        caller: &Address,
        mutation: GroupMutation,
    ) -> Result<Group, GroupError> {
        self.transition(id, Some(caller), mutation).await
    }

    async fn transition(
        &self,
        id: &str,
        caller: Option<&Address>,
        mutation: GroupMutation,
    ) -> Result<Group, GroupError> {
        let lease = self.lease(id);
        let _guard = lease.lock.lock().await;

        let mut group = self.get(id).await?;
        if let Some(caller) = caller {
            group.authorize(caller, &mutation)?;
        }
        let kind = group.apply(&mutation)?;

        self.store.put_group(group.clone()).await?;
        self.events
            .append(SystemEvent::new(
                kind,
                id,
                mutation.subject().map(|a| a.to_string()),
            ))
            .await?;

        tracing::debug!(group_id = %id, kind = %kind, "Group updated");
        Ok(group)
    }
}

#[async_trait]
impl GroupLookup for GroupRegistry {
    async fn group_members(&self, id: &str) -> Result<Option<BTreeSet<String>>, StorageError> {
        Ok(self.store.get_group(id).await?.map(|g| g.members))
    }
}
