use sha2::{Digest, Sha256};

/// Creates a truncated, salted hash of an identifier for safe logging.
///
/// # Arguments
/// * `id` - The identifier to hash (e.g., an address like `alice#emsg.dev`).
/// * `salt` - A salt value from the application's configuration.
///
/// # Returns
/// Eight hex characters: the first four bytes of SHA-256(salt || id).
pub fn log_safe_id(id: &str, salt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(id.as_bytes());
    let hash = hasher.finalize();

    hash[..4].iter().map(|b| format!("{:02x}", b)).collect()
}

/// Split a `/path?query` target into its path, dropping the query
pub fn strip_query(target: &str) -> &str {
    target.split_once('?').map_or(target, |(path, _)| path)
}
