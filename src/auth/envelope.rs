// ============================================================================
// Signed Request Envelope
// ============================================================================
//
// Header format:
//   Authorization: EMSG <base64(json {address, timestamp, nonce, signature})>
//
// The signature covers METHOD:PATH:TIMESTAMP:NONCE, where METHOD is upper
// case and PATH carries no query string. Both sides build it with
// `canonical_request_string`.
//
// ============================================================================

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::Utc;
use ed25519_dalek::{Signer, SigningKey};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::AuthError;
use crate::crypto;
use crate::utils::strip_query;

/// Authorization scheme name
pub const AUTH_SCHEME: &str = "EMSG";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedEnvelope {
    pub address: String,
    pub timestamp: i64,
    pub nonce: String,
    pub signature: String,
}

/// Canonical string the envelope signature covers
pub fn canonical_request_string(method: &str, path: &str, timestamp: i64, nonce: &str) -> String {
    format!(
        "{}:{}:{}:{}",
        method.to_ascii_uppercase(),
        strip_query(path),
        timestamp,
        nonce
    )
}

impl SignedEnvelope {
    /// Sign a request with explicit timestamp and nonce
    pub fn sign(
        address: &str,
        signing_key: &SigningKey,
        method: &str,
        path: &str,
        timestamp: i64,
        nonce: &str,
    ) -> Self {
        let canonical = canonical_request_string(method, path, timestamp, nonce);
        let signature = signing_key.sign(canonical.as_bytes());

        Self {
            address: address.to_string(),
            timestamp,
            nonce: nonce.to_string(),
            signature: crypto::encode_signature(&signature),
        }
    }

    /// base64(json) token carried after the scheme name
    pub fn to_token(&self) -> Result<String, AuthError> {
        let json = serde_json::to_vec(self)
            .map_err(|e| AuthError::MalformedEnvelope(format!("serialization failed: {}", e)))?;
        Ok(BASE64.encode(json))
    }

    pub fn from_token(token: &str) -> Result<Self, AuthError> {
        let json = BASE64
            .decode(token.trim())
            .map_err(|e| AuthError::MalformedEnvelope(format!("invalid base64: {}", e)))?;
        serde_json::from_slice(&json)
            .map_err(|e| AuthError::MalformedEnvelope(format!("invalid JSON: {}", e)))
    }

    /// Full header value, `EMSG <token>`
    pub fn to_header_value(&self) -> Result<String, AuthError> {
        Ok(format!("{} {}", AUTH_SCHEME, self.to_token()?))
    }

    /// Parse an `Authorization` header value
    pub fn from_header_value(value: &str) -> Result<Self, AuthError> {
        let (scheme, token) = value.trim().split_once(' ').ok_or(AuthError::BadScheme)?;
        if scheme != AUTH_SCHEME {
            return Err(AuthError::BadScheme);
        }
        Self::from_token(token)
    }
}

/// Client side: sign a call to `method path` as `address`, now, with a fresh nonce
///
/// Returns the base64 token; send it as `Authorization: EMSG <token>`.
pub fn create_auth_request(
    address: &str,
    signing_key: &SigningKey,
    method: &str,
    path: &str,
) -> Result<String, AuthError> {
    let timestamp = Utc::now().timestamp();
    let nonce = Uuid::new_v4().to_string();
    SignedEnvelope::sign(address, signing_key, method, path, timestamp, &nonce).to_token()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::OsRng;

    #[test]
    fn test_canonical_request_string() {
        assert_eq!(
            canonical_request_string("post", "/api/message", 1234567890, "n-1"),
            "POST:/api/message:1234567890:n-1"
        );
        assert_eq!(
            canonical_request_string("GET", "/api/messages?limit=5", 1, "n"),
            "GET:/api/messages:1:n"
        );
    }

    #[test]
    fn test_header_roundtrip() {
        let key = SigningKey::generate(&mut OsRng);
        let envelope = SignedEnvelope::sign("alice#emsg.dev", &key, "GET", "/api/messages", 42, "abc");
        let header = envelope.to_header_value().unwrap();
        assert!(header.starts_with("EMSG "));
        assert_eq!(SignedEnvelope::from_header_value(&header).unwrap(), envelope);
    }

    #[test]
    fn test_header_rejections() {
        assert_eq!(
            SignedEnvelope::from_header_value("Bearer abc").unwrap_err(),
            AuthError::BadScheme
        );
        assert_eq!(
            SignedEnvelope::from_header_value("EMSG").unwrap_err(),
            AuthError::BadScheme
        );
        assert!(matches!(
            SignedEnvelope::from_header_value("EMSG !!!"),
            Err(AuthError::MalformedEnvelope(_))
        ));
        let not_json = BASE64.encode("not json");
        assert!(matches!(
            SignedEnvelope::from_header_value(&format!("EMSG {}", not_json)),
            Err(AuthError::MalformedEnvelope(_))
        ));
    }

    #[test]
    fn test_create_auth_request_uses_fresh_nonces() {
        let key = SigningKey::generate(&mut OsRng);
        let a = SignedEnvelope::from_token(
            &create_auth_request("alice#emsg.dev", &key, "POST", "/api/message").unwrap(),
        )
        .unwrap();
        let b = SignedEnvelope::from_token(
            &create_auth_request("alice#emsg.dev", &key, "POST", "/api/message").unwrap(),
        )
        .unwrap();
        assert_ne!(a.nonce, b.nonce);
        assert!((a.timestamp - Utc::now().timestamp()).abs() <= 1);
    }
}
