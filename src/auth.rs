// ============================================================================
// Request Authentication - Signed Envelopes
// ============================================================================
//
// Protected calls carry `Authorization: EMSG <base64(json envelope)>`.
// The envelope proves the caller holds the private key of the claimed
// address for this specific METHOD and PATH, within a bounded time window.
// Each (address, nonce) is accepted once.
//
// ============================================================================

pub mod envelope;
pub mod replay;
pub mod verifier;

use thiserror::Error;

use crate::address::AddressError;
use crate::directory::DirectoryError;

pub use envelope::{canonical_request_string, create_auth_request, SignedEnvelope, AUTH_SCHEME};
pub use replay::NonceCache;
pub use verifier::{RequestAuthenticator, TimestampWindow};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("missing authorization header")]
    MissingHeader,

    #[error("authorization scheme must be EMSG")]
    BadScheme,

    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),

    #[error(transparent)]
    InvalidAddress(#[from] AddressError),

    #[error("timestamp {timestamp} outside accepted window (now {now})")]
    StaleOrFutureTimestamp { timestamp: i64, now: i64 },

    #[error("unknown identity: {0}")]
    UnknownIdentity(String),

    #[error("bad signature encoding: {0}")]
    BadSignatureEncoding(String),

    #[error("signature verification failed")]
    SignatureMismatch,

    #[error("nonce already used")]
    ReplayedNonce,

    #[error("replay cache full")]
    ReplayCacheFull,

    #[error("too many live envelopes for {0}")]
    NonceQuotaExceeded(String),

    #[error(transparent)]
    IdentityLookup(#[from] DirectoryError),
}
