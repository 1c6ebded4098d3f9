// ============================================================================
// DNS TXT Lookup
// ============================================================================
//
// The resolver depends on a single capability: fetch the TXT strings at a
// name. `HickoryTxtLookup` is the production adapter; `StaticTxtLookup`
// serves fixed records (local overrides and tests).
//
// ============================================================================

use async_trait::async_trait;
use hickory_resolver::config::{ResolverConfig, ResolverOpts};
use hickory_resolver::error::ResolveErrorKind;
use hickory_resolver::TokioAsyncResolver;
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DnsError {
    #[error("no TXT records")]
    NoRecords,

    #[error("DNS transport error: {0}")]
    Transport(String),
}

#[async_trait]
pub trait TxtLookup: Send + Sync {
    /// TXT strings published at `name`, in answer order
    async fn lookup_txt(&self, name: &str) -> Result<Vec<String>, DnsError>;
}

/// TXT lookups through the system (or a given) resolver configuration
pub struct HickoryTxtLookup {
    resolver: TokioAsyncResolver,
}

impl HickoryTxtLookup {
    /// Use `/etc/resolv.conf` (or the platform equivalent)
    pub fn from_system_conf() -> Result<Self, DnsError> {
        let resolver = TokioAsyncResolver::tokio_from_system_conf()
            .map_err(|e| DnsError::Transport(e.to_string()))?;
        Ok(Self { resolver })
    }

    pub fn new(config: ResolverConfig, opts: ResolverOpts) -> Self {
        Self {
            resolver: TokioAsyncResolver::tokio(config, opts),
        }
    }
}

#[async_trait]
impl TxtLookup for HickoryTxtLookup {
    async fn lookup_txt(&self, name: &str) -> Result<Vec<String>, DnsError> {
        // Fully qualified so search domains are never appended
        let fqdn = if name.ends_with('.') {
            name.to_string()
        } else {
            format!("{}.", name)
        };

        let lookup = self.resolver.txt_lookup(fqdn).await.map_err(|e| match e.kind() {
            ResolveErrorKind::NoRecordsFound { .. } => DnsError::NoRecords,
            _ => DnsError::Transport(e.to_string()),
        })?;

        // A TXT record may be split into several character-strings
        Ok(lookup
            .iter()
            .map(|txt| {
                txt.txt_data()
                    .iter()
                    .map(|chunk| String::from_utf8_lossy(chunk).into_owned())
                    .collect::<String>()
            })
            .collect())
    }
}

/// Fixed TXT records keyed by name
#[derive(Debug, Clone, Default)]
pub struct StaticTxtLookup {
    records: HashMap<String, Vec<String>>,
    failing: HashSet<String>,
    delay: Option<Duration>,
}

impl StaticTxtLookup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_record(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.records.entry(name.into()).or_default().push(value.into());
        self
    }

    /// Lookups of `name` fail with a transport error
    pub fn with_failure(mut self, name: impl Into<String>) -> Self {
        self.failing.insert(name.into());
        self
    }

    /// Every lookup sleeps this long before answering
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl TxtLookup for StaticTxtLookup {
    async fn lookup_txt(&self, name: &str) -> Result<Vec<String>, DnsError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let name = name.trim_end_matches('.');
        if self.failing.contains(name) {
            return Err(DnsError::Transport(format!("lookup of {} refused", name)));
        }

        match self.records.get(name) {
            Some(values) if !values.is_empty() => Ok(values.clone()),
            _ => Err(DnsError::NoRecords),
        }
    }
}
