// ============================================================================
// Ed25519 Key & Signature Encoding
// ============================================================================
//
// Keys and signatures travel as standard base64. Public keys are 32 bytes,
// signatures 64 bytes.
//
// ============================================================================

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use ed25519_dalek::{Signature, VerifyingKey, PUBLIC_KEY_LENGTH, SIGNATURE_LENGTH};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyEncodingError {
    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),

    #[error("invalid signature encoding: {0}")]
    InvalidSignature(String),
}

pub fn encode_public_key(key: &VerifyingKey) -> String {
    BASE64.encode(key.as_bytes())
}

/// Decode a base64 Ed25519 public key
pub fn decode_public_key(public_key_b64: &str) -> Result<VerifyingKey, KeyEncodingError> {
    let bytes = BASE64
        .decode(public_key_b64.trim())
        .map_err(|e| KeyEncodingError::InvalidPublicKey(format!("invalid base64: {}", e)))?;

    let array: [u8; PUBLIC_KEY_LENGTH] = bytes.try_into().map_err(|bytes: Vec<u8>| {
        KeyEncodingError::InvalidPublicKey(format!(
            "public key must be {} bytes, got {}",
            PUBLIC_KEY_LENGTH,
            bytes.len()
        ))
    })?;

    VerifyingKey::from_bytes(&array)
        .map_err(|e| KeyEncodingError::InvalidPublicKey(format!("not an Ed25519 point: {}", e)))
}

pub fn encode_signature(signature: &Signature) -> String {
    BASE64.encode(signature.to_bytes())
}

/// Decode a base64 Ed25519 signature
pub fn decode_signature(signature_b64: &str) -> Result<Signature, KeyEncodingError> {
    let bytes = BASE64
        .decode(signature_b64.trim())
        .map_err(|e| KeyEncodingError::InvalidSignature(format!("invalid base64: {}", e)))?;

    let array: [u8; SIGNATURE_LENGTH] = bytes.try_into().map_err(|bytes: Vec<u8>| {
        KeyEncodingError::InvalidSignature(format!(
            "signature must be {} bytes, got {}",
            SIGNATURE_LENGTH,
            bytes.len()
        ))
    })?;

    Ok(Signature::from_bytes(&array))
}

/// serde adapter storing a `VerifyingKey` as base64
pub mod public_key_base64 {
    use ed25519_dalek::VerifyingKey;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(key: &VerifyingKey, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::encode_public_key(key))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<VerifyingKey, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::decode_public_key(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::{Signer, SigningKey};
    use rand::rngs::OsRng;

    #[test]
    fn test_public_key_roundtrip() {
        let signing_key = SigningKey::generate(&mut OsRng);
        let encoded = encode_public_key(&signing_key.verifying_key());
        let decoded = decode_public_key(&encoded).unwrap();
        assert_eq!(decoded, signing_key.verifying_key());
    }

    #[test]
    fn test_public_key_wrong_length() {
        let short = BASE64.encode([7u8; 16]);
        assert!(matches!(
            decode_public_key(&short),
            Err(KeyEncodingError::InvalidPublicKey(_))
        ));
        assert!(decode_public_key("not base64!!").is_err());
    }

    #[test]
    fn test_signature_decoding() {
        let signing_key = SigningKey::generate(&mut OsRng);
        let signature = signing_key.sign(b"payload");
        assert_eq!(decode_signature(&encode_signature(&signature)).unwrap(), signature);

        let truncated = BASE64.encode(&signature.to_bytes()[..40]);
        assert!(matches!(
            decode_signature(&truncated),
            Err(KeyEncodingError::InvalidSignature(_))
        ));
    }
}
