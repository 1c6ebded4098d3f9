use chrono::Utc;
use ed25519_dalek::Verifier;
use std::sync::Arc;

use super::envelope::{canonical_request_string, SignedEnvelope};
use super::replay::NonceCache;
use super::AuthError;
use crate::address::Address;
use crate::config::AuthConfig;
use crate::crypto;
use crate::directory::IdentitySource;

/// Accepted timestamp range relative to the verifier's clock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimestampWindow {
    /// How far in the past a timestamp may lie (seconds)
    pub max_age_secs: i64,
    /// How far in the future a timestamp may lie (seconds)
    pub max_skew_secs: i64,
}

impl TimestampWindow {
    pub fn contains(&self, timestamp: i64, now: i64) -> bool {
        timestamp >= now - self.max_age_secs && timestamp <= now + self.max_skew_secs
    }
}

impl Default for TimestampWindow {
    fn default() -> Self {
        Self {
            max_age_secs: 300,
            max_skew_secs: 60,
        }
    }
}

/// Verifies signed request envelopes against known identities
///
/// No session is issued: every protected call proves key possession again.
/// Callers from other domains are checked against the key their home server
/// publishes.
pub struct RequestAuthenticator {
    identities: Arc<dyn IdentitySource>,
    window: TimestampWindow,
    nonces: NonceCache,
}

impl RequestAuthenticator {
    pub fn new(identities: Arc<dyn IdentitySource>, config: &AuthConfig) -> Self {
        Self {
            identities,
            window: TimestampWindow {
                max_age_secs: config.timestamp_max_age_secs,
                max_skew_secs: config.timestamp_max_skew_secs,
            },
            nonces: NonceCache::new(
                config.nonce_cache_capacity,
                config.nonce_quota_per_address,
            ),
        }
    }

    /// Verify an `Authorization` header value for the inbound `method path`
    pub async fn verify_header(
        &self,
        method: &str,
        path: &str,
        header: Option<&str>,
    ) -> Result<Address, AuthError> {
        let header = header.ok_or(AuthError::MissingHeader)?;
        let envelope = SignedEnvelope::from_header_value(header)?;
        self.verify(method, path, &envelope).await
    }

    pub async fn verify(
        &self,
        method: &str,
        path: &str,
        envelope: &SignedEnvelope,
    ) -> Result<Address, AuthError> {
        self.verify_at(method, path, envelope, Utc::now().timestamp())
            .await
    }

    /// Verify against an explicit clock reading
    ///
    /// The canonical string is rebuilt from the inbound method and path,
    /// never from anything the envelope claims about them.
    pub async fn verify_at(
        &self,
        method: &str,
        path: &str,
        envelope: &SignedEnvelope,
        now: i64,
    ) -> Result<Address, AuthError> {
        if !self.window.contains(envelope.timestamp, now) {
            return Err(AuthError::StaleOrFutureTimestamp {
                timestamp: envelope.timestamp,
                now,
            });
        }

        let address = Address::parse(&envelope.address)?;

        let identity = self
            .identities
            .find_identity(&address)
            .await?
            .ok_or_else(|| AuthError::UnknownIdentity(address.to_string()))?;

        let signature = crypto::decode_signature(&envelope.signature)
            .map_err(|e| AuthError::BadSignatureEncoding(e.to_string()))?;

        let canonical =
            canonical_request_string(method, path, envelope.timestamp, &envelope.nonce);

        identity
            .public_key
            .verify(canonical.as_bytes(), &signature)
            .map_err(|_| AuthError::SignatureMismatch)?;

        self.nonces.check_and_insert(
            address.as_str(),
            &envelope.nonce,
            envelope.timestamp + self.window.max_age_secs,
            now,
        )?;

        Ok(address)
    }
}
