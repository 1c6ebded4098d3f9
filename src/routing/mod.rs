// ============================================================================
// Routing Module - DNS-based Endpoint Discovery
// ============================================================================
//
// Resolves `local#domain` addresses to serving endpoints:
// - Discovery name: _emsg.<domain>
// - TXT content: JSON {server, pubkey, version, ttl} or a bare http(s) URL
// - Nothing is cached here; callers may cache for at most the record TTL
//
// ============================================================================

pub mod dns;
pub mod record;
pub mod resolver;

use thiserror::Error;

use crate::address::AddressError;

pub use dns::{DnsError, HickoryTxtLookup, StaticTxtLookup, TxtLookup};
pub use record::{parse_route_info, RouteInfo, RouteRecord};
pub use resolver::{discovery_name, is_local_domain, AddressValidation, RoutePlan, RoutingResolver};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoutingError {
    #[error(transparent)]
    InvalidAddress(#[from] AddressError),

    #[error("no TXT records found for {0}")]
    NoRecord(String),

    #[error("DNS TXT lookup failed for {name}: {reason}")]
    LookupFailed { name: String, reason: String },

    #[error("DNS TXT lookup timed out for {0}")]
    LookupTimedOut(String),

    #[error("unparsable route record: {0}")]
    UnparsableRecord(String),

    #[error("routing failed for {address}: {source}")]
    RoutingFailed {
        address: String,
        #[source]
        source: Box<RoutingError>,
    },
}

impl RoutingError {
    /// The underlying cause, looking through `RoutingFailed`
    pub fn root(&self) -> &RoutingError {
        match self {
            RoutingError::RoutingFailed { source, .. } => source.root(),
            other => other,
        }
    }
}
