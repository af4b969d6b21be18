//! Client reputation tracking: time-bounded blacklist, permanent whitelist.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Both reputation maps behind one lock; they are always consulted together.
#[derive(Debug, Default)]
struct Maps {
    /// client_id -> expiry instant. Entries are evicted lazily on lookup.
    blacklist: HashMap<String, Instant>,
    /// Permanent bypass of blacklist checks and rate limiting.
    whitelist: HashSet<String>,
}

/// Reputation store keyed by client identifier.
pub struct ReputationStore {
    maps: Mutex<Maps>,
    blacklist_duration: Duration,
}

impl ReputationStore {
    pub fn new(blacklist_duration: Duration) -> Self {
        Self {
            maps: Mutex::new(Maps::default()),
            blacklist_duration,
        }
    }

    /// Whether the client is currently blacklisted. Whitelisted clients are
    /// never considered blacklisted; expired entries are removed here.
    pub fn is_blacklisted(&self, client_id: &str) -> bool {
        self.is_blacklisted_at(client_id, Instant::now())
    }

    pub(crate) fn is_blacklisted_at(&self, client_id: &str, now: Instant) -> bool {
        let mut maps = self.maps.lock().expect("reputation mutex poisoned");
        if maps.whitelist.contains(client_id) {
            return false;
        }
        match maps.blacklist.get(client_id) {
            Some(expiry) if now < *expiry => true,
            Some(_) => {
                // Lazy eviction of the expired entry.
                maps.blacklist.remove(client_id);
                false
            }
            None => false,
        }
    }

    /// Blacklist the client for the configured duration.
    pub fn blacklist(&self, client_id: &str) {
        self.blacklist_at(client_id, Instant::now());
    }

    pub(crate) fn blacklist_at(&self, client_id: &str, now: Instant) {
        let expiry = now + self.blacklist_duration;
        let mut maps = self.maps.lock().expect("reputation mutex poisoned");
        maps.blacklist.insert(client_id.to_string(), expiry);
        tracing::warn!(
            client = %client_id,
            duration_secs = self.blacklist_duration.as_secs(),
            "client added to blacklist"
        );
    }

    pub fn is_whitelisted(&self, client_id: &str) -> bool {
        self.maps
            .lock()
            .expect("reputation mutex poisoned")
            .whitelist
            .contains(client_id)
    }

    pub fn add_to_whitelist(&self, client_id: &str) {
        let mut maps = self.maps.lock().expect("reputation mutex poisoned");
        maps.whitelist.insert(client_id.to_string());
        tracing::info!(client = %client_id, "client added to whitelist");
    }

    pub fn remove_from_whitelist(&self, client_id: &str) {
        let mut maps = self.maps.lock().expect("reputation mutex poisoned");
        maps.whitelist.remove(client_id);
        tracing::info!(client = %client_id, "client removed from whitelist");
    }

    pub fn clear_blacklist(&self) {
        let mut maps = self.maps.lock().expect("reputation mutex poisoned");
        maps.blacklist.clear();
        tracing::info!("blacklist cleared");
    }

    /// (blacklisted, whitelisted) client counts.
    pub fn counts(&self) -> (usize, usize) {
        let maps = self.maps.lock().expect("reputation mutex poisoned");
        (maps.blacklist.len(), maps.whitelist.len())
    }
}
