// ============================================================================
// Nonce Replay Cache
// ============================================================================
//
// Remembers (address, nonce) pairs until the envelope they came from would
// fall out of the timestamp window anyway. Bounded: once full, live entries
// are never evicted; new envelopes are refused instead. Each address may hold
// at most a fixed share of the slots, so one busy key cannot exhaust the
// cache for everyone else.
//
// ============================================================================

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::sync::{Mutex, PoisonError};

use super::AuthError;

type NonceKey = (String, String);

#[derive(Default)]
struct Inner {
    expiries: HashMap<NonceKey, i64>,
    queue: BinaryHeap<Reverse<(i64, NonceKey)>>,
    live_per_address: HashMap<String, usize>,
}

impl Inner {
    fn purge_expired(&mut self, now: i64) {
        while let Some(Reverse((expires_at, _))) = self.queue.peek() {
            if *expires_at >= now {
                break;
            }
            if let Some(Reverse((expires_at, key))) = self.queue.pop() {
                if self.expiries.get(&key) == Some(&expires_at) {
                    self.expiries.remove(&key);
                    self.release(&key.0);
                }
            }
        }
    }

    fn release(&mut self, address: &str) {
        if let Some(count) = self.live_per_address.get_mut(address) {
            *count -= 1;
            if *count == 0 {
                self.live_per_address.remove(address);
            }
        }
    }
}

pub struct NonceCache {
    inner: Mutex<Inner>,
    capacity: usize,
    quota_per_address: usize,
}

impl NonceCache {
    pub fn new(capacity: usize, quota_per_address: usize) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            capacity,
            quota_per_address,
        }
    }

    /// Record a first use of `(address, nonce)`, live through `expires_at` inclusive
    ///
    /// Fails `ReplayedNonce` if the pair is still live, `NonceQuotaExceeded`
    /// if the address already holds its share of slots, `ReplayCacheFull` if
    /// no slot is free after dropping expired entries.
    pub fn check_and_insert(
        &self,
        address: &str,
        nonce: &str,
        expires_at: i64,
        now: i64,
    ) -> Result<(), AuthError> {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.purge_expired(now);

        let key = (address.to_string(), nonce.to_string());
        if inner.expiries.contains_key(&key) {
            return Err(AuthError::ReplayedNonce);
        }

        let live = inner.live_per_address.get(address).copied().unwrap_or(0);
        if live >= self.quota_per_address {
            tracing::warn!(
                quota = self.quota_per_address,
                "Address exceeded its nonce quota"
            );
            return Err(AuthError::NonceQuotaExceeded(address.to_string()));
        }

        if inner.expiries.len() >= self.capacity {
            tracing::warn!(capacity = self.capacity, "Nonce replay cache is full");
            return Err(AuthError::ReplayCacheFull);
        }

        *inner.live_per_address.entry(address.to_string()).or_insert(0) += 1;
        inner.expiries.insert(key.clone(), expires_at);
        inner.queue.push(Reverse((expires_at, key)));
        Ok(())
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .expiries
            .len()
    }
}
