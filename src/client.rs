// ============================================================================
// EMSG Client - Talk to EMSG servers as one identity
// ============================================================================
//
// Every call is signed with the identity's Ed25519 key. The home server is
// found through the same DNS discovery the daemon uses. Messages go to the
// home server first; the route plan it returns says which other servers get
// a copy.
//
// ============================================================================

use anyhow::{Context, Result};
use ed25519_dalek::{Signer, SigningKey};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::address::Address;
use crate::auth::{create_auth_request, AUTH_SCHEME};
use crate::crypto;
use crate::fanout::SendReceipt;
use crate::identity::{Identity, RegistrationRequest};
use crate::message::{Message, StoredMessage};
use crate::routing::RoutingResolver;

/// One server's answer to a submitted message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Delivery {
    pub server: String,
    /// Recipients this server accepted
    pub recipients: Vec<String>,
    pub receipt: SendReceipt,
}

/// A remote server that could not take its share of a message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailedDelivery {
    pub server: String,
    pub recipients: Vec<String>,
    pub error: String,
}

/// Where one send ended up
///
/// The home server has always accepted the message by the time a report
/// exists. Remote servers are tried independently, and the ones that
/// refused are listed in `failed`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendReport {
    pub home: Delivery,
    pub remote: Vec<Delivery>,
    pub failed: Vec<FailedDelivery>,
}

impl SendReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

#[derive(Deserialize)]
struct Inbox {
    messages: Vec<StoredMessage>,
}

pub struct EmsgClient {
    address: Address,
    signing_key: SigningKey,
    resolver: RoutingResolver,
    http: reqwest::Client,
}

impl EmsgClient {
    pub fn new(
        address: Address,
        signing_key: SigningKey,
        resolver: RoutingResolver,
        timeout: Duration,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self {
            address,
            signing_key,
            resolver,
            http,
        })
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    /// Endpoint serving this client's own domain
    pub async fn home_server(&self) -> Result<String> {
        let info = self
            .resolver
            .get_route_info(self.address.as_str())
            .await
            .with_context(|| format!("Failed to resolve home server for {}", self.address))?;
        Ok(info.server().to_string())
    }

    fn authorization(&self, method: &str, path: &str) -> Result<String> {
        let token = create_auth_request(self.address.as_str(), &self.signing_key, method, path)?;
        Ok(format!("{} {}", AUTH_SCHEME, token))
    }

    /// Register (or re-register) this identity at its home server
    pub async fn register(&self, profile: RegistrationRequest) -> Result<Identity> {
        let server = self.home_server().await?;
        self.register_with(&server, profile).await
    }

    /// Register at an explicit server; address and key come from this client
    pub async fn register_with(&self, server: &str, profile: RegistrationRequest) -> Result<Identity> {
        let request = RegistrationRequest {
            address: self.address.to_string(),
            pubkey: crypto::encode_public_key(&self.signing_key.verifying_key()),
            ..profile
        };

        let path = "/api/user";
        let response = self
            .http
            .post(endpoint(server, path))
            .header(reqwest::header::AUTHORIZATION, self.authorization("POST", path)?)
            .json(&request)
            .send()
            .await?;

        let response = check_status(response, "Registration").await?;
        let identity = response.json::<Identity>().await?;

        tracing::info!(server = %server, "Identity registered");
        Ok(identity)
    }

    /// Sign the body if needed, submit it at home, then deliver remote shares
    ///
    /// The home server expands groups and cc lists, stores local copies and
    /// answers with the remote route plan. Each remote server then receives
    /// a copy addressed to just the recipients it serves. An error means the
    /// home server refused and nothing was delivered anywhere.
    pub async fn send(&self, mut message: Message) -> Result<SendReport> {
        if message.from.is_empty() {
            message.from = self.address.to_string();
        }
        if message.signature.is_empty() {
            message.signature =
                crypto::encode_signature(&self.signing_key.sign(message.body.as_bytes()));
        }

        let home_server = self.home_server().await?;
        let receipt = self.post_message(&home_server, &message).await?;
        let home = Delivery {
            server: home_server,
            recipients: receipt.local_recipients.clone(),
            receipt: receipt.clone(),
        };

        let mut remote = Vec::with_capacity(receipt.remote_routes.len());
        let mut failed = Vec::new();
        for (server, recipients) in receipt.remote_routes {
            let share = Message {
                to: recipients.clone(),
                cc: Vec::new(),
                ..message.clone()
            };
            match self.post_message(&server, &share).await {
                Ok(receipt) => {
                    tracing::debug!(
                        server = %server,
                        recipients = recipients.len(),
                        "Message delivered"
                    );
                    remote.push(Delivery {
                        server,
                        recipients,
                        receipt,
                    });
                }
                Err(e) => {
                    tracing::warn!(server = %server, error = %e, "Remote delivery failed");
                    failed.push(FailedDelivery {
                        server,
                        recipients,
                        error: e.to_string(),
                    });
                }
            }
        }

        Ok(SendReport {
            home,
            remote,
            failed,
        })
    }

    async fn post_message(&self, server: &str, message: &Message) -> Result<SendReceipt> {
        let path = "/api/message";
        let response = self
            .http
            .post(endpoint(server, path))
            .header(reqwest::header::AUTHORIZATION, self.authorization("POST", path)?)
            .json(message)
            .send()
            .await?;

        let response = check_status(response, "Send").await?;
        Ok(response.json::<SendReceipt>().await?)
    }

    /// Messages stored for this identity at its home server
    pub async fn fetch_messages(&self) -> Result<Vec<StoredMessage>> {
        let server = self.home_server().await?;
        let path = "/api/messages";
        let response = self
            .http
            .get(endpoint(&server, path))
            .header(reqwest::header::AUTHORIZATION, self.authorization("GET", path)?)
            .send()
            .await?;

        let response = check_status(response, "Fetch").await?;
        Ok(response.json::<Inbox>().await?.messages)
    }
}

fn endpoint(server: &str, path: &str) -> String {
    format!("{}{}", server.trim_end_matches('/'), path)
}

async fn check_status(response: reqwest::Response, what: &str) -> Result<reqwest::Response> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let error_text = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    anyhow::bail!("{} request failed: HTTP {} - {}", what, status, error_text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_joins_without_double_slash() {
        assert_eq!(endpoint("https://a.com/", "/api/user"), "https://a.com/api/user");
        assert_eq!(endpoint("http://127.0.0.1:8080", "/api/messages"), "http://127.0.0.1:8080/api/messages");
    }
}
