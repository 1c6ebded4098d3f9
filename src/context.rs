use anyhow::{Context, Result};

use crate::auth::RequestAuthenticator;
use crate::config::Config;
use crate::directory::IdentityDirectory;
use crate::fanout::MessageFanout;
use crate::group::{GroupRegistry, SystemEventLog};
use crate::routing::{RoutingResolver, TxtLookup};
use crate::storage::Store;
use std::sync::Arc;

/// Application context containing shared dependencies
///
/// Built once at startup and handed to every handler; nothing here is global.
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<Config>,
    pub store: Arc<dyn Store>,
    pub events: Arc<dyn SystemEventLog>,
    pub resolver: RoutingResolver,
    pub authenticator: Arc<RequestAuthenticator>,
    pub groups: Arc<GroupRegistry>,
    pub fanout: Arc<MessageFanout>,
}

impl AppContext {
    /// Wire the components around one store, one event log and one DNS source
    pub fn new(
        config: Arc<Config>,
        store: Arc<dyn Store>,
        events: Arc<dyn SystemEventLog>,
        dns: Arc<dyn TxtLookup>,
    ) -> Result<Self> {
        let resolver = RoutingResolver::new(dns, config.routing.dns_timeout());
        let http = reqwest::Client::builder()
            .timeout(config.routing.http_timeout())
            .build()
            .context("Failed to create HTTP client")?;
        let identities = Arc::new(IdentityDirectory::new(
            store.clone(),
            resolver.clone(),
            http,
            config.local_domains.clone(),
            config.logging.clone(),
        ));
        let authenticator = Arc::new(RequestAuthenticator::new(identities.clone(), &config.auth));
        let groups = Arc::new(GroupRegistry::new(store.clone(), events.clone()));
        let fanout = Arc::new(MessageFanout::new(
            store.clone(),
            identities,
            groups.clone(),
            resolver.clone(),
            config.local_domains.clone(),
            config.logging.clone(),
        ));

        Ok(Self {
            config,
            store,
            events,
            resolver,
            authenticator,
            groups,
            fanout,
        })
    }

    /// Start the group event relay when enabled in config
    pub fn start_background_tasks(&self) -> Option<tokio::task::JoinHandle<()>> {
        if !self.config.broadcast_system_events {
            return None;
        }
        tracing::info!("System event relay enabled");
        Some(
            self.fanout
                .clone()
                .spawn_system_event_relay(self.events.as_ref(), self.config.system_address()),
        )
    }
}
