// ============================================================================
// Message Fan-out
// ============================================================================
//
// Turns one submitted message into a deduplicated recipient set:
// - every `to` address
// - each `cc`: the members of a known group (a group id wins over a literal
//   address), otherwise the address itself
// - the members of `group_id`, when it resolves
//
// Recipients on a local domain are stored here. Remote recipients are grouped
// by serving endpoint and handed back as a route plan; delivering to other
// servers is the sending peer's job.
//
// A sender from another domain is delivering one such route: only its `to`
// list counts, nothing is expanded, and every recipient must be local.
//
// ============================================================================

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::address::Address;
use crate::config::LoggingConfig;
use crate::directory::IdentitySource;
use crate::group::{GroupLookup, SystemEvent, SystemEventLog};
use crate::message::{Message, MessageError, StoredMessage};
use crate::routing::{is_local_domain, RoutePlan, RoutingResolver};
use crate::storage::{StorageError, Store};

/// Deduplicated recipient set for `message`
pub async fn expand_recipients(
    message: &Message,
    groups: &dyn GroupLookup,
) -> Result<BTreeSet<String>, StorageError> {
    let mut recipients: BTreeSet<String> = message
        .to
        .iter()
        .filter(|to| !to.is_empty())
        .cloned()
        .collect();

    for cc in message.cc.iter().filter(|cc| !cc.is_empty()) {
        match groups.group_members(cc).await? {
            Some(members) => recipients.extend(members),
            None => {
                recipients.insert(cc.clone());
            }
        }
    }

    if let Some(group_id) = message.group_id() {
        if let Some(members) = groups.group_members(group_id).await? {
            recipients.extend(members);
        }
    }

    Ok(recipients)
}

/// Outcome of an accepted send
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendReceipt {
    /// Id of the locally stored copy, if any recipient is local
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<Uuid>,
    pub local_recipients: Vec<String>,
    /// Remote recipients grouped by serving endpoint
    pub remote_routes: RoutePlan,
}

pub struct MessageFanout {
    store: Arc<dyn Store>,
    identities: Arc<dyn IdentitySource>,
    groups: Arc<dyn GroupLookup>,
    resolver: RoutingResolver,
    local_domains: HashSet<String>,
    logging: LoggingConfig,
}

impl MessageFanout {
    pub fn new(
        store: Arc<dyn Store>,
        identities: Arc<dyn IdentitySource>,
        groups: Arc<dyn GroupLookup>,
        resolver: RoutingResolver,
        local_domains: HashSet<String>,
        logging: LoggingConfig,
    ) -> Self {
        Self {
            store,
            identities,
            groups,
            resolver,
            local_domains,
            logging,
        }
    }

    /// Accept a message submitted by the authenticated `sender`
    ///
    /// Nothing is stored unless every recipient parses and every remote
    /// recipient routes.
    pub async fn send(&self, sender: &Address, message: Message) -> Result<SendReceipt, MessageError> {
        message.validate()?;

        let from = Address::parse(&message.from)?;
        if &from != sender {
            return Err(MessageError::SenderMismatch {
                claimed: message.from.clone(),
                authenticated: sender.to_string(),
            });
        }

        if message.is_signed() {
            let identity = self
                .identities
                .find_identity(&from)
                .await?
                .ok_or_else(|| MessageError::UnknownSender(from.to_string()))?;
            message.verify_body_signature(&identity.public_key)?;
        }

        let sender_is_local = is_local_domain(from.domain(), &self.local_domains);
        let recipients = if sender_is_local {
            expand_recipients(&message, self.groups.as_ref()).await?
        } else {
            message
                .to
                .iter()
                .filter(|to| !to.is_empty())
                .cloned()
                .collect()
        };

        let mut local = Vec::new();
        let mut remote = Vec::new();
        for recipient in recipients {
            let address = Address::parse(&recipient)?;
            if is_local_domain(address.domain(), &self.local_domains) {
                local.push(recipient);
            } else if sender_is_local {
                remote.push(recipient);
            } else {
                return Err(MessageError::RelayDenied(recipient));
            }
        }

        let remote_routes = if remote.is_empty() {
            RoutePlan::new()
        } else {
            self.resolver.route_message(&remote).await?
        };

        let message_id = self.store_local(message, &local).await?;

        tracing::info!(
            sender = %self.logging.address(from.as_str()),
            local = local.len(),
            remote = remote.len(),
            servers = remote_routes.len(),
            "Message accepted"
        );

        Ok(SendReceipt {
            message_id,
            local_recipients: local,
            remote_routes,
        })
    }

    /// Messages stored for `address`, oldest first
    pub async fn inbox(&self, address: &Address) -> Result<Vec<StoredMessage>, MessageError> {
        Ok(self
            .store
            .query_messages_for_recipient(address.as_str())
            .await?)
    }

    async fn store_local(
        &self,
        message: Message,
        recipients: &[String],
    ) -> Result<Option<Uuid>, StorageError> {
        if recipients.is_empty() {
            return Ok(None);
        }
        let stored = StoredMessage::new(message, recipients.to_vec());
        let id = stored.id;
        self.store.append_message(stored).await?;
        Ok(Some(id))
    }

    /// Deliver one group event to the group's current local members
    pub async fn relay_system_event(
        &self,
        event: &SystemEvent,
        system_address: &str,
    ) -> Result<Option<Uuid>, StorageError> {
        let Some(members) = self.groups.group_members(&event.group_id).await? else {
            return Ok(None);
        };

        let local: Vec<String> = members
            .iter()
            .filter(|member| {
                Address::parse(member)
                    .map(|a| is_local_domain(a.domain(), &self.local_domains))
                    .unwrap_or(false)
            })
            .cloned()
            .collect();

        let message = Message {
            from: system_address.to_string(),
            to: members.into_iter().collect(),
            cc: Vec::new(),
            group_id: Some(event.group_id.clone()),
            body: event.describe(),
            signature: String::new(),
        };

        self.store_local(message, &local).await
    }

    /// Relay every appended event until the log's channel closes
    pub fn spawn_system_event_relay(
        self: Arc<Self>,
        events: &dyn SystemEventLog,
        system_address: String,
    ) -> JoinHandle<()> {
        let mut rx = events.subscribe();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => {
                        if let Err(e) = self.relay_system_event(&event, &system_address).await {
                            tracing::warn!(
                                group_id = %event.group_id,
                                kind = %event.kind,
                                error = %e,
                                "Failed to relay system event"
                            );
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped = skipped, "System event relay lagged");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            tracing::info!("System event relay stopped");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto;
    use crate::directory::IdentityDirectory;
    use crate::group::{GroupMutation, GroupRegistry, InMemoryEventLog, NewGroup, SystemEventKind};
    use crate::identity::Identity;
    use crate::routing::{RoutingError, StaticTxtLookup};
    use crate::storage::MemoryStore;
    use async_trait::async_trait;
    use ed25519_dalek::{Signer, SigningKey};
    use rand::rngs::OsRng;
    use std::collections::HashMap;
    use std::time::Duration;

    struct FixedGroups(HashMap<String, BTreeSet<String>>);

    #[async_trait]
    impl GroupLookup for FixedGroups {
        async fn group_members(&self, id: &str) -> Result<Option<BTreeSet<String>>, StorageError> {
            Ok(self.0.get(id).cloned())
        }
    }

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn message(from: &str, to: &[&str]) -> Message {
        Message {
            from: from.to_string(),
            to: to.iter().map(|s| s.to_string()).collect(),
            body: "hello".to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_cc_group_expands_to_members() {
        let groups = FixedGroups(HashMap::from([(
            "groupX".to_string(),
            set(&["b#x.com", "c#x.com"]),
        )]));
        let mut msg = message("a#x.com", &["b#x.com"]);
        msg.cc = vec!["groupX".to_string()];

        let recipients = expand_recipients(&msg, &groups).await.unwrap();
        assert_eq!(recipients, set(&["b#x.com", "c#x.com"]));
    }

    #[tokio::test]
    async fn test_group_id_wins_over_literal_cc_and_group_field() {
        let groups = FixedGroups(HashMap::from([(
            "d#x.com".to_string(),
            set(&["e#x.com"]),
        ), (
            "team".to_string(),
            set(&["f#x.com", "b#x.com"]),
        )]));
        let mut msg = message("a#x.com", &["b#x.com"]);
        msg.cc = vec!["d#x.com".to_string(), "g#y.com".to_string()];
        msg.group_id = Some("team".to_string());

        let recipients = expand_recipients(&msg, &groups).await.unwrap();
        assert_eq!(recipients, set(&["b#x.com", "e#x.com", "f#x.com", "g#y.com"]));

        // unknown group field contributes nothing
        msg.group_id = Some("ghost".to_string());
        msg.cc.clear();
        assert_eq!(expand_recipients(&msg, &groups).await.unwrap(), set(&["b#x.com"]));
    }

    struct Fixture {
        fanout: Arc<MessageFanout>,
        store: Arc<MemoryStore>,
        registry: Arc<GroupRegistry>,
        events: Arc<InMemoryEventLog>,
        key: SigningKey,
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let events = Arc::new(InMemoryEventLog::new());
        let registry = Arc::new(GroupRegistry::new(store.clone(), events.clone()));
        let dns = StaticTxtLookup::new()
            .with_record("_emsg.remote.org", r#"{"server":"https://emsg.remote.org"}"#)
            .with_record("_emsg.other.net", "https://mail.other.net");
        let resolver = RoutingResolver::new(Arc::new(dns), Duration::from_secs(1));
        let local_domains = HashSet::from(["emsg.dev".to_string()]);
        let directory = Arc::new(IdentityDirectory::new(
            store.clone(),
            resolver.clone(),
            reqwest::Client::new(),
            local_domains.clone(),
            LoggingConfig::default(),
        ));
        let fanout = Arc::new(MessageFanout::new(
            store.clone(),
            directory,
            registry.clone(),
            resolver,
            local_domains,
            LoggingConfig::default(),
        ));

        let key = SigningKey::generate(&mut OsRng);
        store
            .put_identity(Identity::new(
                Address::parse("alice#emsg.dev").unwrap(),
                key.verifying_key(),
            ))
            .await
            .unwrap();

        Fixture {
            fanout,
            store,
            registry,
            events,
            key,
        }
    }

    fn alice() -> Address {
        Address::parse("alice#emsg.dev").unwrap()
    }

    #[tokio::test]
    async fn test_send_splits_local_and_remote() {
        let f = fixture().await;
        let msg = message(
            "alice#emsg.dev",
            &["bob#emsg.dev", "carol#remote.org", "dave#other.net"],
        );

        let receipt = f.fanout.send(&alice(), msg).await.unwrap();
        assert!(receipt.message_id.is_some());
        assert_eq!(receipt.local_recipients, vec!["bob#emsg.dev".to_string()]);
        assert_eq!(receipt.remote_routes.len(), 2);
        assert_eq!(
            receipt.remote_routes["https://emsg.remote.org"],
            vec!["carol#remote.org".to_string()]
        );

        let inbox = f
            .fanout
            .inbox(&Address::parse("bob#emsg.dev").unwrap())
            .await
            .unwrap();
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox[0].message.body, "hello");
    }

    #[tokio::test]
    async fn test_send_rejects_mismatched_sender() {
        let f = fixture().await;
        let msg = message("mallory#emsg.dev", &["bob#emsg.dev"]);
        assert!(matches!(
            f.fanout.send(&alice(), msg).await,
            Err(MessageError::SenderMismatch { .. })
        ));
    }

    #[tokio::test]
    async fn test_send_requires_fields() {
        let f = fixture().await;
        let msg = Message {
            from: "alice#emsg.dev".to_string(),
            ..Default::default()
        };
        match f.fanout.send(&alice(), msg).await {
            Err(MessageError::MissingFields(fields)) => assert_eq!(fields, "to, body"),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unroutable_remote_stores_nothing() {
        let f = fixture().await;
        let msg = message("alice#emsg.dev", &["bob#emsg.dev", "zed#nowhere.io"]);

        match f.fanout.send(&alice(), msg).await {
            Err(MessageError::Routing(e)) => {
                assert_eq!(e.root(), &RoutingError::NoRecord("_emsg.nowhere.io".to_string()))
            }
            other => panic!("unexpected result: {:?}", other),
        }
        assert!(f
            .store
            .query_messages_for_recipient("bob#emsg.dev")
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_body_signature_is_checked() {
        let f = fixture().await;
        let mut msg = message("alice#emsg.dev", &["bob#emsg.dev"]);
        msg.signature = crypto::encode_signature(&f.key.sign(b"hello"));
        assert!(f.fanout.send(&alice(), msg.clone()).await.is_ok());

        msg.body = "tampered".to_string();
        assert!(matches!(
            f.fanout.send(&alice(), msg).await,
            Err(MessageError::SignatureMismatch)
        ));
    }

    #[tokio::test]
    async fn test_remote_sender_delivers_to_listed_local_recipients_only() {
        let f = fixture().await;
        f.registry
            .create(
                NewGroup {
                    id: "team".to_string(),
                    name: "Team".to_string(),
                    members: vec!["dave#emsg.dev".to_string()],
                    ..Default::default()
                },
                &alice(),
            )
            .await
            .unwrap();

        let carol = Address::parse("carol#remote.org").unwrap();
        let mut msg = message("carol#remote.org", &["bob#emsg.dev"]);
        msg.cc = vec!["team".to_string()];
        msg.group_id = Some("team".to_string());

        let receipt = f.fanout.send(&carol, msg).await.unwrap();
        assert_eq!(receipt.local_recipients, vec!["bob#emsg.dev".to_string()]);
        assert!(receipt.remote_routes.is_empty());
        assert!(f
            .store
            .query_messages_for_recipient("dave#emsg.dev")
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_remote_sender_cannot_relay() {
        let f = fixture().await;
        let carol = Address::parse("carol#remote.org").unwrap();
        let msg = message("carol#remote.org", &["bob#emsg.dev", "dave#other.net"]);

        match f.fanout.send(&carol, msg).await {
            Err(MessageError::RelayDenied(recipient)) => assert_eq!(recipient, "dave#other.net"),
            other => panic!("unexpected result: {:?}", other),
        }
        assert!(f
            .store
            .query_messages_for_recipient("bob#emsg.dev")
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_system_event_relay_reaches_members() {
        let f = fixture().await;
        let handle = f
            .fanout
            .clone()
            .spawn_system_event_relay(&*f.events, "system#emsg.dev".to_string());

        f.registry
            .create(
                NewGroup {
                    id: "g1".to_string(),
                    name: "Friends".to_string(),
                    ..Default::default()
                },
                &alice(),
            )
            .await
            .unwrap();
        f.registry
            .mutate(
                "g1",
                GroupMutation::AddMember(Address::parse("bob#emsg.dev").unwrap()),
            )
            .await
            .unwrap();

        let mut inbox = Vec::new();
        for _ in 0..50 {
            inbox = f
                .store
                .query_messages_for_recipient("bob#emsg.dev")
                .await
                .unwrap();
            if !inbox.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        handle.abort();

        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox[0].message.from, "system#emsg.dev");
        assert_eq!(
            inbox[0].message.body,
            format!(
                "[SYSTEM] {}: user bob#emsg.dev in group g1",
                SystemEventKind::UserJoined
            )
        );
    }
}
