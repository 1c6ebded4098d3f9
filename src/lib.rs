// ============================================================================
// EMSG Daemon
// ============================================================================
//
// Federated messaging over `local#domain` addresses:
// - address: parsing and validation
// - routing: DNS TXT discovery at `_emsg.<domain>`
// - auth: Ed25519 signed request envelopes with replay protection
// - group: membership state machine and system event log
// - fanout: recipient expansion, local storage, remote route plans
// - routes: axum REST surface
// - client: outbound client for one identity
//
// ============================================================================

pub mod address;
pub mod auth;
pub mod client;
pub mod config;
pub mod context;
pub mod crypto;
pub mod directory;
pub mod error;
pub mod fanout;
pub mod group;
pub mod identity;
pub mod message;
pub mod routes;
pub mod routing;
pub mod storage;
pub mod utils;
