// ============================================================================
// Request Authentication Configuration
// ============================================================================

const DEFAULT_TIMESTAMP_MAX_AGE_SECS: i64 = 300;
const DEFAULT_TIMESTAMP_MAX_SKEW_SECS: i64 = 60;
const DEFAULT_NONCE_CACHE_CAPACITY: usize = 100_000;
const DEFAULT_NONCE_QUOTA_PER_ADDRESS: usize = 1_000;

#[derive(Clone, Debug)]
pub struct AuthConfig {
    /// Oldest accepted envelope timestamp, seconds before now
    pub timestamp_max_age_secs: i64,
    /// Newest accepted envelope timestamp, seconds after now
    pub timestamp_max_skew_secs: i64,
    /// Live (address, nonce) pairs kept for replay detection
    pub nonce_cache_capacity: usize,
    /// Live pairs any single address may hold
    pub nonce_quota_per_address: usize,
}

impl AuthConfig {
    pub(crate) fn from_env() -> Self {
        Self {
            timestamp_max_age_secs: std::env::var("EMSG_TIMESTAMP_MAX_AGE_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_TIMESTAMP_MAX_AGE_SECS),
            timestamp_max_skew_secs: std::env::var("EMSG_TIMESTAMP_MAX_SKEW_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_TIMESTAMP_MAX_SKEW_SECS),
            nonce_cache_capacity: std::env::var("EMSG_NONCE_CACHE_CAPACITY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_NONCE_CACHE_CAPACITY),
            nonce_quota_per_address: std::env::var("EMSG_NONCE_QUOTA_PER_ADDRESS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_NONCE_QUOTA_PER_ADDRESS),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            timestamp_max_age_secs: DEFAULT_TIMESTAMP_MAX_AGE_SECS,
            timestamp_max_skew_secs: DEFAULT_TIMESTAMP_MAX_SKEW_SECS,
            nonce_cache_capacity: DEFAULT_NONCE_CACHE_CAPACITY,
            nonce_quota_per_address: DEFAULT_NONCE_QUOTA_PER_ADDRESS,
        }
    }
}
