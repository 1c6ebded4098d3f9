use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use super::dns::{DnsError, TxtLookup};
use super::record::{parse_route_info, RouteInfo};
use super::RoutingError;
use crate::address::Address;

/// Label prepended to a domain to form its discovery name
pub const DISCOVERY_LABEL: &str = "_emsg";

/// Server endpoint -> recipients resolving there, in input order
pub type RoutePlan = BTreeMap<String, Vec<String>>;

pub fn discovery_name(domain: &str) -> String {
    format!("{}.{}", DISCOVERY_LABEL, domain)
}

/// True when `domain` is served by this daemon
pub fn is_local_domain(domain: &str, local_domains: &HashSet<String>) -> bool {
    local_domains.contains(domain)
}

/// Per-address result of a batch validation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AddressValidation {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Resolves addresses to serving endpoints through DNS TXT records
///
/// Every lookup runs under a deadline; dropping the returned future cancels
/// the lookup in flight.
#[derive(Clone)]
pub struct RoutingResolver {
    dns: Arc<dyn TxtLookup>,
    timeout: Duration,
}

impl RoutingResolver {
    pub fn new(dns: Arc<dyn TxtLookup>, timeout: Duration) -> Self {
        Self { dns, timeout }
    }

    /// First TXT value published at `_emsg.<domain>` for the address
    pub async fn lookup_route(&self, address: &str) -> Result<String, RoutingError> {
        self.lookup_route_until(address, Instant::now() + self.timeout)
            .await
    }

    /// Same as [`lookup_route`](Self::lookup_route) with a caller-supplied deadline.
    /// The effective deadline is the earlier of `deadline` and now + timeout.
    async fn lookup_route_until(
        &self,
        address: &str,
        deadline: Instant,
    ) -> Result<String, RoutingError> {
        let address = Address::parse(address)?;
        self.lookup_domain(address.domain(), deadline).await
    }

    pub async fn get_route_info(&self, address: &str) -> Result<RouteInfo, RoutingError> {
        let record = self.lookup_route(address).await?;
        parse_route_info(&record)
    }

    /// Group recipients by serving endpoint
    ///
    /// All addresses are validated before any lookup; the first invalid
    /// address or unresolved route fails the whole call. Recipients sharing a
    /// domain are resolved once. One deadline covers the batch.
    pub async fn route_message(&self, recipients: &[String]) -> Result<RoutePlan, RoutingError> {
        let mut parsed = Vec::with_capacity(recipients.len());
        for recipient in recipients {
            let address =
                Address::parse(recipient).map_err(|e| RoutingError::RoutingFailed {
                    address: recipient.clone(),
                    source: Box::new(e.into()),
                })?;
            parsed.push(address);
        }

        let deadline = Instant::now() + self.timeout;
        let mut servers_by_domain: HashMap<String, String> = HashMap::new();
        let mut plan = RoutePlan::new();

        for address in parsed {
            let server = match servers_by_domain.get(address.domain()) {
                Some(server) => server.clone(),
                None => {
                    let server = self
                        .resolve_server(address.domain(), deadline)
                        .await
                        .map_err(|e| RoutingError::RoutingFailed {
                            address: address.to_string(),
                            source: Box::new(e),
                        })?;
                    servers_by_domain.insert(address.domain().to_string(), server.clone());
                    server
                }
            };

            let entry = plan.entry(server).or_default();
            if !entry.iter().any(|r| r == address.as_str()) {
                entry.push(address.to_string());
            }
        }

        tracing::debug!(
            recipients = recipients.len(),
            servers = plan.len(),
            "Message routing resolved"
        );

        Ok(plan)
    }

    /// Validity of each address, keyed by the input string
    pub fn validate_addresses(addresses: &[String]) -> BTreeMap<String, AddressValidation> {
        addresses
            .iter()
            .map(|address| {
                let result = match Address::parse(address) {
                    Ok(_) => AddressValidation {
                        valid: true,
                        error: None,
                    },
                    Err(e) => AddressValidation {
                        valid: false,
                        error: Some(e.to_string()),
                    },
                };
                (address.clone(), result)
            })
            .collect()
    }

    async fn resolve_server(&self, domain: &str, deadline: Instant) -> Result<String, RoutingError> {
        let record = self.lookup_domain(domain, deadline).await?;
        Ok(parse_route_info(&record)?.server().to_string())
    }

    async fn lookup_domain(&self, domain: &str, deadline: Instant) -> Result<String, RoutingError> {
        let name = discovery_name(domain);
        let deadline = deadline.min(Instant::now() + self.timeout);

        tracing::debug!(name = %name, "Looking up route record");

        let records = match tokio::time::timeout_at(deadline, self.dns.lookup_txt(&name)).await {
            Err(_) => {
                tracing::warn!(name = %name, timeout_ms = self.timeout.as_millis(), "Route lookup timed out");
                return Err(RoutingError::LookupTimedOut(name));
            }
            Ok(Err(DnsError::NoRecords)) => return Err(RoutingError::NoRecord(name)),
            Ok(Err(DnsError::Transport(reason))) => {
                tracing::warn!(name = %name, error = %reason, "Route lookup failed");
                return Err(RoutingError::LookupFailed { name, reason });
            }
            Ok(Ok(records)) => records,
        };

        if records.len() > 1 {
            tracing::debug!(
                name = %name,
                count = records.len(),
                "Multiple route records published, using the first"
            );
        }

        records
            .into_iter()
            .next()
            .ok_or(RoutingError::NoRecord(name))
    }
}
