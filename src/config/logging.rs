// ============================================================================
// Logging Configuration
// ============================================================================

use crate::utils::log_safe_id;

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    /// Log raw addresses instead of salted hashes
    pub enable_user_identifiers: bool,
    pub hash_salt: String,
}

impl LoggingConfig {
    pub(crate) fn from_env() -> anyhow::Result<Self> {
        let enable_user_identifiers = std::env::var("LOG_USER_IDENTIFIERS")
            .unwrap_or_else(|_| "false".to_string())
            .parse()
            .unwrap_or(false);

        let salt = std::env::var("LOG_HASH_SALT")
            .unwrap_or_else(|_| "default-salt-please-change".to_string());
        // Salt only matters while identifiers are hashed
        if !enable_user_identifiers && (salt.is_empty() || salt == "default-salt-please-change") {
            anyhow::bail!("LOG_HASH_SALT must be set to a unique, secret value");
        }

        Ok(Self {
            enable_user_identifiers,
            hash_salt: salt,
        })
    }

    /// Address as it should appear in log fields
    pub fn address(&self, address: &str) -> String {
        if self.enable_user_identifiers {
            address.to_string()
        } else {
            log_safe_id(address, &self.hash_salt)
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enable_user_identifiers: false,
            hash_salt: "unset".to_string(),
        }
    }
}
