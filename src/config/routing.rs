// ============================================================================
// Routing Configuration
// ============================================================================

use std::time::Duration;

const DEFAULT_DNS_TIMEOUT_SECS: u64 = 5;
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

#[derive(Clone, Debug)]
pub struct RoutingConfig {
    /// Deadline for one TXT lookup, or for a whole batch in RouteMessage
    pub dns_timeout_secs: u64,
    /// Timeout for outbound calls made by the client
    pub http_timeout_secs: u64,
}

impl RoutingConfig {
    pub(crate) fn from_env() -> Self {
        Self {
            dns_timeout_secs: std::env::var("EMSG_DNS_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_DNS_TIMEOUT_SECS),
            http_timeout_secs: std::env::var("EMSG_HTTP_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_HTTP_TIMEOUT_SECS),
        }
    }

    pub fn dns_timeout(&self) -> Duration {
        Duration::from_secs(self.dns_timeout_secs)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            dns_timeout_secs: DEFAULT_DNS_TIMEOUT_SECS,
            http_timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
        }
    }
}
