// ============================================================================
// Identities
// ============================================================================
//
// An identity binds an address to an Ed25519 public key plus profile fields.
// Registration is an upsert keyed by address; identities are never deleted.
//
// ============================================================================

use ed25519_dalek::VerifyingKey;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::address::{Address, AddressError};
use crate::crypto::{self, KeyEncodingError};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentityError {
    #[error(transparent)]
    InvalidAddress(#[from] AddressError),

    #[error(transparent)]
    InvalidPublicKey(#[from] KeyEncodingError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub address: Address,
    #[serde(rename = "pubkey", with = "crypto::public_key_base64")]
    pub public_key: VerifyingKey,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub middle_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub display_picture: String,
}

/// Body of `POST /api/user`
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct RegistrationRequest {
    pub address: String,
    pub pubkey: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub middle_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub display_picture: String,
}

impl Identity {
    pub fn new(address: Address, public_key: VerifyingKey) -> Self {
        Self {
            address,
            public_key,
            first_name: String::new(),
            middle_name: String::new(),
            last_name: String::new(),
            display_picture: String::new(),
        }
    }

    /// Build an identity from a registration request, validating address and key
    pub fn register(request: RegistrationRequest) -> Result<Self, IdentityError> {
        let address = Address::parse(&request.address)?;
        let public_key = crypto::decode_public_key(&request.pubkey)?;

        Ok(Self {
            address,
            public_key,
            first_name: request.first_name,
            middle_name: request.middle_name,
            last_name: request.last_name,
            display_picture: request.display_picture,
        })
    }
}
