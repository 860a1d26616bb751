//! Two-tier whitelist: session entries and persisted entries.
//!
//! The session tier lives only as long as the store. The persistent tier is
//! written through to a [`KeyValueStore`] on every change and always contains
//! the identifiers protected by the [`ProtectionPolicy`].

use std::collections::BTreeSet;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::Mutex;
use tracing::debug;

use crate::config::PERSISTENT_WHITELIST_KEY;
use crate::error::Result;
use crate::ports::KeyValueStore;
use crate::protection::ProtectionPolicy;

/// Whitelist store consulted before terminating an application.
pub struct WhitelistStore<S: KeyValueStore> {
    store: S,
    policy: Arc<ProtectionPolicy>,
    session: RwLock<BTreeSet<String>>,
    persistent: RwLock<BTreeSet<String>>,
    /// Serializes persistent mutations so saves land in order.
    write_gate: Mutex<()>,
}

impl<S: KeyValueStore> WhitelistStore<S> {
    /// Load the persistent whitelist and make sure it contains every protected
    /// identifier. The result is saved before returning.
    pub async fn open(store: S, policy: Arc<ProtectionPolicy>) -> Result<Self> {
        let mut persistent: BTreeSet<String> = store
            .load_list(PERSISTENT_WHITELIST_KEY)
            .await?
            .iter()
            .filter_map(|id| normalize(id))
            .map(str::to_string)
            .collect();

        persistent.extend(policy.protected_identifiers().map(str::to_string));

        let values: Vec<String> = persistent.iter().cloned().collect();
        store.save_list(PERSISTENT_WHITELIST_KEY, &values).await?;

        debug!(entries = values.len(), "Loaded persistent whitelist");

        Ok(Self {
            store,
            policy,
            session: RwLock::new(BTreeSet::new()),
            persistent: RwLock::new(persistent),
            write_gate: Mutex::new(()),
        })
    }

    pub fn policy(&self) -> &Arc<ProtectionPolicy> {
        &self.policy
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Session membership OR persistent membership.
    pub fn is_whitelisted(&self, id: &str) -> bool {
        self.is_session_whitelisted(id) || self.is_persistently_whitelisted(id)
    }

    pub fn is_session_whitelisted(&self, id: &str) -> bool {
        normalize(id).is_some_and(|id| self.session.read().contains(id))
    }

    pub fn is_persistently_whitelisted(&self, id: &str) -> bool {
        normalize(id).is_some_and(|id| self.persistent.read().contains(id))
    }

    /// Sorted snapshot of the session tier.
    pub fn session_entries(&self) -> Vec<String> {
        self.session.read().iter().cloned().collect()
    }

    /// Sorted snapshot of the persistent tier.
    pub fn persistent_entries(&self) -> Vec<String> {
        self.persistent.read().iter().cloned().collect()
    }

    // =========================================================================
    // Session tier
    // =========================================================================

    pub fn add_to_session(&self, id: &str) {
        if let Some(id) = normalize(id) {
            self.session.write().insert(id.to_string());
        }
    }

    pub fn remove_from_session(&self, id: &str) {
        if let Some(id) = normalize(id) {
            self.session.write().remove(id);
        }
    }

    /// Toggle session membership, returning the new membership.
    pub fn toggle_session(&self, id: &str) -> bool {
        let Some(id) = normalize(id) else {
            return false;
        };
        let mut session = self.session.write();
        if session.remove(id) {
            false
        } else {
            session.insert(id.to_string());
            true
        }
    }

    pub fn clear_session(&self) {
        self.session.write().clear();
    }

    // =========================================================================
    // Persistent tier
    // =========================================================================

    /// Add an identifier to the persistent tier and save.
    pub async fn add_to_persistent(&self, id: &str) -> Result<()> {
        let Some(id) = normalize(id) else {
            return Ok(());
        };
        let _gate = self.write_gate.lock().await;
        let mut next = self.persistent.read().clone();
        next.insert(id.to_string());
        self.commit(next).await?;
        debug!(bundle_id = id, "Added to persistent whitelist");
        Ok(())
    }

    /// Remove an identifier from the persistent tier and save.
    ///
    /// Returns `Ok(false)` without touching anything if the identifier is
    /// protected.
    pub async fn remove_from_persistent(&self, id: &str) -> Result<bool> {
        let Some(id) = normalize(id) else {
            return Ok(true);
        };
        if self.policy.is_protected(id) {
            debug!(bundle_id = id, "Refusing to remove protected identifier");
            return Ok(false);
        }

        let _gate = self.write_gate.lock().await;
        let mut next = self.persistent.read().clone();
        next.remove(id);
        self.commit(next).await?;
        debug!(bundle_id = id, "Removed from persistent whitelist");
        Ok(true)
    }

    /// Toggle persistent membership, returning the new membership.
    ///
    /// Protected identifiers stay whitelisted.
    pub async fn toggle_persistent(&self, id: &str) -> Result<bool> {
        if self.is_persistently_whitelisted(id) {
            let removed = self.remove_from_persistent(id).await?;
            Ok(!removed)
        } else {
            self.add_to_persistent(id).await?;
            Ok(self.is_persistently_whitelisted(id))
        }
    }

    /// Remove every persistent entry that is not protected, then save.
    pub async fn clear_persistent(&self) -> Result<()> {
        let _gate = self.write_gate.lock().await;
        let policy = &self.policy;
        let mut next = self.persistent.read().clone();
        next.retain(|id| policy.is_protected(id));
        self.commit(next).await
    }

    /// Save `next` and make it the persistent tier once the save succeeded.
    ///
    /// Callers hold `write_gate`. On error the in-memory tier is untouched.
    async fn commit(&self, next: BTreeSet<String>) -> Result<()> {
        let values: Vec<String> = next.iter().cloned().collect();
        self.store.save_list(PERSISTENT_WHITELIST_KEY, &values).await?;
        *self.persistent.write() = next;
        Ok(())
    }
}

/// Identifiers are compared and stored trimmed; blank ones are ignored.
fn normalize(id: &str) -> Option<&str> {
    let id = id.trim();
    (!id.is_empty()).then_some(id)
}
