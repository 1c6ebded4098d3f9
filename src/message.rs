use chrono::Utc;
use ed25519_dalek::{Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::address::AddressError;
use crate::crypto;
use crate::directory::DirectoryError;
use crate::routing::RoutingError;
use crate::storage::StorageError;

#[derive(Debug, Error)]
pub enum MessageError {
    #[error("missing required fields: {0}")]
    MissingFields(String),

    #[error(transparent)]
    InvalidAddress(#[from] AddressError),

    #[error("sender {claimed} does not match authenticated address {authenticated}")]
    SenderMismatch {
        claimed: String,
        authenticated: String,
    },

    #[error("sender {0} has no registered identity")]
    UnknownSender(String),

    #[error("invalid body signature encoding: {0}")]
    BadSignatureEncoding(String),

    #[error("body signature does not match sender key")]
    SignatureMismatch,

    #[error("recipient {0} is not served here and the sender is not local")]
    RelayDenied(String),

    #[error(transparent)]
    IdentityLookup(#[from] DirectoryError),

    #[error(transparent)]
    Routing(#[from] RoutingError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// A message as submitted by a client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Message {
    #[serde(default)]
    pub from: String,
    #[serde(default)]
    pub to: Vec<String>,
    #[serde(default)]
    pub cc: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub signature: String,
}

impl Message {
    /// Check the presence of `from`, at least one `to` and a non-empty body
    pub fn validate(&self) -> Result<(), MessageError> {
        let mut missing = Vec::new();
        if self.from.is_empty() {
            missing.push("from");
        }
        if self.to.iter().all(|to| to.is_empty()) {
            missing.push("to");
        }
        if self.body.is_empty() {
            missing.push("body");
        }

        if missing.is_empty() {
            Ok(())
        } else {
            Err(MessageError::MissingFields(missing.join(", ")))
        }
    }

    /// Group broadcast target, if any. An empty string means none.
    pub fn group_id(&self) -> Option<&str> {
        self.group_id.as_deref().filter(|id| !id.is_empty())
    }

    pub fn is_signed(&self) -> bool {
        !self.signature.is_empty()
    }

    /// Verify the detached Ed25519 signature over the body
    pub fn verify_body_signature(&self, public_key: &VerifyingKey) -> Result<(), MessageError> {
        let signature = crypto::decode_signature(&self.signature)
            .map_err(|e| MessageError::BadSignatureEncoding(e.to_string()))?;

        public_key
            .verify(self.body.as_bytes(), &signature)
            .map_err(|_| MessageError::SignatureMismatch)
    }
}

/// A message accepted by this daemon, with its expanded local recipients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredMessage {
    pub id: Uuid,
    pub received_at: i64,
    pub recipients: Vec<String>,
    #[serde(flatten)]
    pub message: Message,
}

impl StoredMessage {
    pub fn new(message: Message, recipients: Vec<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            received_at: Utc::now().timestamp(),
            recipients,
            message,
        }
    }

    pub fn is_for(&self, address: &str) -> bool {
        self.recipients.iter().any(|r| r == address)
    }
}
