use anyhow::{Context, Result};
use std::collections::HashSet;

// ============================================================================
// Configuration Constants
// ============================================================================

const DEFAULT_PORT: u16 = 8080;

// ============================================================================
// Sub-configurations
// ============================================================================

mod auth;
mod logging;
mod routing;

pub use auth::AuthConfig;
pub use logging::LoggingConfig;
pub use routing::RoutingConfig;

#[derive(Clone, Debug)]
pub struct Config {
    pub port: u16,
    pub rust_log: String,
    /// Primary domain served by this daemon (e.g., "emsg.dev")
    pub domain: String,
    /// Every domain whose recipients are stored locally; always contains `domain`
    pub local_domains: HashSet<String>,
    /// Relay group system events to members as messages from `system#<domain>`
    pub broadcast_system_events: bool,
    pub routing: RoutingConfig,
    pub auth: AuthConfig,
    pub logging: LoggingConfig,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let domain = std::env::var("EMSG_DOMAIN").context("EMSG_DOMAIN must be set")?;
        if domain.trim().is_empty() {
            anyhow::bail!("EMSG_DOMAIN must not be empty");
        }
        let domain = domain.trim().to_string();

        let local_domains = parse_local_domains(
            &domain,
            &std::env::var("EMSG_LOCAL_DOMAINS").unwrap_or_default(),
        );

        Ok(Self {
            port: std::env::var("EMSG_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(DEFAULT_PORT),
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            domain,
            local_domains,
            broadcast_system_events: std::env::var("EMSG_BROADCAST_SYSTEM_EVENTS")
                .unwrap_or_else(|_| "false".to_string())
                .parse()
                .unwrap_or(false),
            routing: RoutingConfig::from_env(),
            auth: AuthConfig::from_env(),
            logging: LoggingConfig::from_env()?,
        })
    }

    /// Defaults for a single-domain daemon, without reading the environment
    pub fn with_domain(domain: &str) -> Self {
        Self {
            port: DEFAULT_PORT,
            rust_log: "info".to_string(),
            domain: domain.to_string(),
            local_domains: HashSet::from([domain.to_string()]),
            broadcast_system_events: false,
            routing: RoutingConfig::default(),
            auth: AuthConfig::default(),
            logging: LoggingConfig::default(),
        }
    }

    /// Sender address for relayed system messages
    pub fn system_address(&self) -> String {
        format!("system#{}", self.domain)
    }
}

fn parse_local_domains(domain: &str, raw: &str) -> HashSet<String> {
    let mut domains: HashSet<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(str::to_string)
        .collect();
    domains.insert(domain.to_string());
    domains
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clear_env() {
        for key in [
            "EMSG_DOMAIN",
            "EMSG_LOCAL_DOMAINS",
            "EMSG_PORT",
            "EMSG_DNS_TIMEOUT_SECS",
            "EMSG_HTTP_TIMEOUT_SECS",
            "EMSG_TIMESTAMP_MAX_AGE_SECS",
            "EMSG_TIMESTAMP_MAX_SKEW_SECS",
            "EMSG_NONCE_CACHE_CAPACITY",
            "EMSG_BROADCAST_SYSTEM_EVENTS",
            "LOG_USER_IDENTIFIERS",
            "LOG_HASH_SALT",
        ] {
            std::env::remove_var(key);
        }
    }

    #[test]
    fn test_parse_local_domains_always_includes_primary() {
        let domains = parse_local_domains("a.com", " b.com, ,c.com ");
        assert_eq!(domains.len(), 3);
        assert!(domains.contains("a.com"));
        assert!(domains.contains("b.com"));
        assert!(domains.contains("c.com"));

        assert_eq!(parse_local_domains("a.com", ""), HashSet::from(["a.com".to_string()]));
    }

    #[test]
    #[serial]
    fn test_from_env_defaults() {
        clear_env();
        std::env::set_var("EMSG_DOMAIN", "emsg.dev");
        std::env::set_var("LOG_HASH_SALT", "test-salt-value");

        let config = Config::from_env().unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.domain, "emsg.dev");
        assert_eq!(config.routing.dns_timeout_secs, 5);
        assert_eq!(config.routing.http_timeout_secs, 30);
        assert_eq!(config.auth.timestamp_max_age_secs, 300);
        assert_eq!(config.auth.timestamp_max_skew_secs, 60);
        assert_eq!(config.auth.nonce_cache_capacity, 100_000);
        assert!(!config.broadcast_system_events);
        assert_eq!(config.system_address(), "system#emsg.dev");
        clear_env();
    }

    #[test]
    #[serial]
    fn test_from_env_overrides() {
        clear_env();
        std::env::set_var("EMSG_DOMAIN", "emsg.dev");
        std::env::set_var("EMSG_LOCAL_DOMAINS", "alias.dev");
        std::env::set_var("EMSG_PORT", "9000");
        std::env::set_var("EMSG_DNS_TIMEOUT_SECS", "2");
        std::env::set_var("EMSG_NONCE_CACHE_CAPACITY", "10");
        std::env::set_var("EMSG_BROADCAST_SYSTEM_EVENTS", "true");
        std::env::set_var("LOG_USER_IDENTIFIERS", "true");

        let config = Config::from_env().unwrap();
        assert_eq!(config.port, 9000);
        assert!(config.local_domains.contains("alias.dev"));
        assert!(config.local_domains.contains("emsg.dev"));
        assert_eq!(config.routing.dns_timeout_secs, 2);
        assert_eq!(config.auth.nonce_cache_capacity, 10);
        assert!(config.broadcast_system_events);
        assert!(config.logging.enable_user_identifiers);
        clear_env();
    }

    #[test]
    #[serial]
    fn test_from_env_requires_domain_and_salt() {
        clear_env();
        assert!(Config::from_env().is_err());

        std::env::set_var("EMSG_DOMAIN", "emsg.dev");
        assert!(Config::from_env().is_err());
        clear_env();
    }
}
