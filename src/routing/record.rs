use serde::{Deserialize, Serialize};

use super::RoutingError;

/// Protocol version reported for bare-URL records
pub const DEFAULT_PROTOCOL_VERSION: &str = "1.0";

/// TTL (seconds) reported for bare-URL records
pub const DEFAULT_ROUTE_TTL_SECS: u64 = 3600;

/// Flat view of a route, as published in structured TXT records
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteRecord {
    pub server: String,
    #[serde(default)]
    pub pubkey: String,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default = "default_ttl")]
    pub ttl: u64,
}

fn default_version() -> String {
    DEFAULT_PROTOCOL_VERSION.to_string()
}

fn default_ttl() -> u64 {
    DEFAULT_ROUTE_TTL_SECS
}

/// A parsed `_emsg` TXT record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteInfo {
    /// JSON `{server, pubkey, version, ttl}`
    Structured(RouteRecord),
    /// A plain `http(s)://` URL
    BareUrl { server: String },
}

impl RouteInfo {
    pub fn server(&self) -> &str {
        match self {
            RouteInfo::Structured(record) => &record.server,
            RouteInfo::BareUrl { server } => server,
        }
    }

    pub fn pubkey(&self) -> Option<&str> {
        match self {
            RouteInfo::Structured(record) if !record.pubkey.is_empty() => Some(&record.pubkey),
            _ => None,
        }
    }

    pub fn version(&self) -> &str {
        match self {
            RouteInfo::Structured(record) => &record.version,
            RouteInfo::BareUrl { .. } => DEFAULT_PROTOCOL_VERSION,
        }
    }

    pub fn ttl(&self) -> u64 {
        match self {
            RouteInfo::Structured(record) => record.ttl,
            RouteInfo::BareUrl { .. } => DEFAULT_ROUTE_TTL_SECS,
        }
    }

    pub fn is_structured(&self) -> bool {
        matches!(self, RouteInfo::Structured(_))
    }

    pub fn to_record(&self) -> RouteRecord {
        match self {
            RouteInfo::Structured(record) => record.clone(),
            RouteInfo::BareUrl { server } => RouteRecord {
                server: server.clone(),
                pubkey: String::new(),
                version: default_version(),
                ttl: default_ttl(),
            },
        }
    }
}

/// Parse TXT content: structured JSON first, then a bare URL
pub fn parse_route_info(text: &str) -> Result<RouteInfo, RoutingError> {
    let text = text.trim();

    if let Ok(record) = serde_json::from_str::<RouteRecord>(text) {
        if !record.server.trim().is_empty() {
            return Ok(RouteInfo::Structured(record));
        }
    }

    if is_bare_url(text) {
        return Ok(RouteInfo::BareUrl {
            server: text.to_string(),
        });
    }

    Err(RoutingError::UnparsableRecord(text.to_string()))
}

fn is_bare_url(text: &str) -> bool {
    let rest = text
        .strip_prefix("https://")
        .or_else(|| text.strip_prefix("http://"));

    matches!(rest, Some(host) if !host.is_empty() && !host.contains(char::is_whitespace))
}
