// ============================================================================
// Groups - Membership State Machine
// ============================================================================
//
// Members and admins are independent address sets. Each accepted mutation
// yields exactly one system event kind; rejected mutations change nothing.
//
// ============================================================================

pub mod events;
pub mod registry;

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;

use crate::address::{Address, AddressError};
use crate::storage::StorageError;

pub use events::{InMemoryEventLog, SystemEvent, SystemEventKind, SystemEventLog};
pub use registry::{GroupLookup, GroupRegistry, NewGroup};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GroupError {
    #[error(transparent)]
    InvalidAddress(#[from] AddressError),

    #[error("missing required fields: {0}")]
    MissingFields(String),

    #[error("group {0} already exists")]
    GroupExists(String),

    #[error("group {0} not found")]
    NotFound(String),

    #[error("{0} is already a member")]
    AlreadyMember(String),

    #[error("{0} is not a member")]
    NotMember(String),

    #[error("{caller} may not change group {group_id}: {reason}")]
    NotPermitted {
        group_id: String,
        caller: String,
        reason: &'static str,
    },

    #[error(transparent)]
    Storage(#[from] StorageError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub display_picture: String,
    #[serde(default)]
    pub members: BTreeSet<String>,
    #[serde(default)]
    pub admins: BTreeSet<String>,
}

/// A single state transition request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupMutation {
    AddMember(Address),
    /// Self-leave
    RemoveMember(Address),
    /// Removal performed by an admin
    RemoveMemberByAdmin(Address),
    AddAdmin(Address),
    RemoveAdmin(Address),
    UpdateName(String),
    UpdateDescription(String),
    UpdateDisplayPicture(String),
}

impl GroupMutation {
    /// Address the resulting event is about; `None` for metadata changes
    pub fn subject(&self) -> Option<&Address> {
        match self {
            GroupMutation::AddMember(a)
            | GroupMutation::RemoveMember(a)
            | GroupMutation::RemoveMemberByAdmin(a)
            | GroupMutation::AddAdmin(a)
            | GroupMutation::RemoveAdmin(a) => Some(a),
            GroupMutation::UpdateName(_)
            | GroupMutation::UpdateDescription(_)
            | GroupMutation::UpdateDisplayPicture(_) => None,
        }
    }
}

impl Group {
    pub fn is_member(&self, address: &str) -> bool {
        self.members.contains(address)
    }

    pub fn is_admin(&self, address: &str) -> bool {
        self.admins.contains(address)
    }

    /// Check that `caller` may request `mutation` on this group
    ///
    /// Leaving is open to the member themself; everything else is admin-only.
    pub fn authorize(&self, caller: &Address, mutation: &GroupMutation) -> Result<(), GroupError> {
        let refuse = |reason| GroupError::NotPermitted {
            group_id: self.id.clone(),
            caller: caller.to_string(),
            reason,
        };
        match mutation {
            GroupMutation::RemoveMember(subject) if subject != caller => {
                Err(refuse("only the member can leave"))
            }
            GroupMutation::RemoveMember(_) => Ok(()),
            _ if !self.is_admin(caller.as_str()) => Err(refuse("group admin required")),
            _ => Ok(()),
        }
    }

    /// Apply a mutation in place
    ///
    /// Admin changes are idempotent: re-adding an admin or removing a
    /// non-admin succeeds without changing the sets.
    pub fn apply(&mut self, mutation: &GroupMutation) -> Result<SystemEventKind, GroupError> {
        match mutation {
            GroupMutation::AddMember(address) => {
                if !self.members.insert(address.to_string()) {
                    return Err(GroupError::AlreadyMember(address.to_string()));
                }
                Ok(SystemEventKind::UserJoined)
            }
            GroupMutation::RemoveMember(address) => {
                self.take_member(address)?;
                Ok(SystemEventKind::UserLeft)
            }
            GroupMutation::RemoveMemberByAdmin(address) => {
                self.take_member(address)?;
                Ok(SystemEventKind::UserRemoved)
            }
            GroupMutation::AddAdmin(address) => {
                self.admins.insert(address.to_string());
                Ok(SystemEventKind::AdminAssigned)
            }
            GroupMutation::RemoveAdmin(address) => {
                self.admins.remove(address.as_str());
                Ok(SystemEventKind::AdminRevoked)
            }
            GroupMutation::UpdateName(name) => {
                self.name = name.clone();
                Ok(SystemEventKind::GroupRenamed)
            }
            GroupMutation::UpdateDescription(description) => {
                self.description = description.clone();
                Ok(SystemEventKind::DescriptionUpdated)
            }
            GroupMutation::UpdateDisplayPicture(picture) => {
                self.display_picture = picture.clone();
                Ok(SystemEventKind::DpUpdated)
            }
        }
    }

    fn take_member(&mut self, address: &Address) -> Result<(), GroupError> {
        if self.members.remove(address.as_str()) {
            Ok(())
        } else {
            Err(GroupError::NotMember(address.to_string()))
        }
    }
}
