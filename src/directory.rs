// ============================================================================
// Identity Directory - Local Store plus Federated Lookup
// ============================================================================
//
// Addresses on a local domain are answered from the store. Any other address
// is looked up at its home server, found through `_emsg.<domain>`, with
// `GET /api/user?address=`. The answer must carry the address that was asked
// for; anything else is treated as a failed lookup.
//
// ============================================================================

use async_trait::async_trait;
use reqwest::StatusCode;
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;

use crate::address::Address;
use crate::config::LoggingConfig;
use crate::identity::Identity;
use crate::routing::{is_local_domain, RoutingError, RoutingResolver};
use crate::storage::{StorageError, Store};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DirectoryError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Routing(#[from] RoutingError),

    #[error("identity lookup at {server} failed: {reason}")]
    Remote { server: String, reason: String },
}

/// Where verifiers find the public key behind an address
#[async_trait]
pub trait IdentitySource: Send + Sync {
    async fn find_identity(&self, address: &Address) -> Result<Option<Identity>, DirectoryError>;
}

pub struct IdentityDirectory {
    store: Arc<dyn Store>,
    resolver: RoutingResolver,
    http: reqwest::Client,
    local_domains: HashSet<String>,
    logging: LoggingConfig,
}

impl IdentityDirectory {
    pub fn new(
        store: Arc<dyn Store>,
        resolver: RoutingResolver,
        http: reqwest::Client,
        local_domains: HashSet<String>,
        logging: LoggingConfig,
    ) -> Self {
        Self {
            store,
            resolver,
            http,
            local_domains,
            logging,
        }
    }

    async fn fetch_remote(&self, address: &Address) -> Result<Option<Identity>, DirectoryError> {
        let route = self.resolver.get_route_info(address.as_str()).await?;
        let server = route.server().trim_end_matches('/').to_string();
        let remote = |reason: String| DirectoryError::Remote {
            server: server.clone(),
            reason,
        };

        let response = self
            .http
            .get(format!("{}/api/user", server))
            .query(&[("address", address.as_str())])
            .send()
            .await
            .map_err(|e| remote(e.to_string()))?;

        match response.status() {
            StatusCode::NOT_FOUND => return Ok(None),
            status if !status.is_success() => return Err(remote(format!("HTTP {}", status))),
            _ => {}
        }

        let identity = response
            .json::<Identity>()
            .await
            .map_err(|e| remote(e.to_string()))?;
        if &identity.address != address {
            return Err(remote(format!(
                "answered for {} instead of {}",
                identity.address, address
            )));
        }

        tracing::debug!(
            address_hash = %self.logging.address(address.as_str()),
            server = %server,
            "Fetched remote identity"
        );
        Ok(Some(identity))
    }
}

#[async_trait]
impl IdentitySource for IdentityDirectory {
    async fn find_identity(&self, address: &Address) -> Result<Option<Identity>, DirectoryError> {
        if is_local_domain(address.domain(), &self.local_domains) {
            return Ok(self.store.get_identity(address.as_str()).await?);
        }
        self.fetch_remote(address).await
    }
}
