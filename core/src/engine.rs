//! AppQuitter Engine - wires policy, whitelist and attempts together.
//!
//! This module provides the main engine used by front ends. It owns the
//! protection policy, the whitelist store, and the batch coordinator, so a UI
//! or the CLI only hands it candidate lists and reads back reports.

use std::sync::Arc;

use tracing::warn;

use crate::attempt::{AttemptRunner, AttemptStatus};
use crate::batch::{BatchCoordinator, BatchHandle};
use crate::config::{ConfigStore, QuitterConfig};
use crate::domain::{AttemptReport, AttemptState, ProcessIdentity};
use crate::error::Result;
use crate::ports::{KeyValueStore, ProcessTerminatorPort};
use crate::protection::{ProtectionPolicy, ProtectionReason};
use crate::whitelist::WhitelistStore;

#[cfg(unix)]
use crate::adapters::SignalTerminator;

/// The main AppQuitter engine.
///
/// # Usage Pattern
/// The enumeration layer refreshes its list of running applications and calls
/// `quit_all()` or `quit_app()` with it. Between calls, status is read via
/// `attempt_state()` and `last_failure()`.
pub struct QuitterEngine<T: ProcessTerminatorPort, S: KeyValueStore = ConfigStore> {
    policy: Arc<ProtectionPolicy>,
    whitelist: WhitelistStore<S>,
    coordinator: BatchCoordinator<T>,
}

#[cfg(unix)]
impl QuitterEngine<SignalTerminator, ConfigStore> {
    /// Create an engine that signals real processes and persists to the
    /// JSON config file.
    pub async fn open(config: QuitterConfig) -> Result<Self> {
        let store = match &config.config_path {
            Some(path) => ConfigStore::with_path(path.clone()),
            None => ConfigStore::new()?,
        };
        Self::with_parts(SignalTerminator::new(), store, config).await
    }
}

impl<T: ProcessTerminatorPort, S: KeyValueStore> QuitterEngine<T, S> {
    /// Create an engine from explicit parts.
    ///
    /// Must be called from within a tokio runtime.
    pub async fn with_parts(terminator: T, store: S, config: QuitterConfig) -> Result<Self> {
        config.validate()?;
        let policy = Arc::new(ProtectionPolicy::new(config.self_bundle_id));
        if !policy.self_check() {
            warn!("Continuing with an incomplete protection policy");
        }

        let whitelist = WhitelistStore::open(store, Arc::clone(&policy)).await?;
        let runner =
            AttemptRunner::spawn(Arc::new(terminator), Arc::clone(&policy), config.timings);

        Ok(Self {
            policy,
            whitelist,
            coordinator: BatchCoordinator::new(runner),
        })
    }

    // MARK: - Quitting

    /// Gracefully quit one application. The whitelist is not consulted.
    pub async fn quit_app(&self, identity: ProcessIdentity) -> Result<AttemptReport> {
        self.coordinator.runner().quit(identity).await
    }

    /// Force quit one application.
    pub async fn force_quit_app(&self, identity: ProcessIdentity) -> Result<AttemptReport> {
        self.coordinator.runner().force_quit(identity).await
    }

    /// Quit every candidate that is not whitelisted.
    pub fn quit_all(&self, candidates: Vec<ProcessIdentity>) -> BatchHandle {
        self.coordinator
            .quit_all(candidates, |id| self.whitelist.is_whitelisted(id))
    }

    // MARK: - Status

    pub fn attempt_state(&self, bundle_id: &str) -> Option<AttemptState> {
        self.coordinator.runner().state_of(bundle_id)
    }

    pub fn is_quitting(&self, bundle_id: &str) -> bool {
        self.coordinator.runner().is_in_progress(bundle_id)
    }

    pub fn last_failure(&self, bundle_id: &str) -> Option<String> {
        self.coordinator.runner().last_failure(bundle_id)
    }

    pub fn status(&self) -> AttemptStatus {
        self.coordinator.runner().status()
    }

    // MARK: - Protection

    pub fn policy(&self) -> &ProtectionPolicy {
        &self.policy
    }

    pub fn is_protected(&self, bundle_id: &str) -> bool {
        self.policy.is_protected(bundle_id)
    }

    pub fn protection_reason(&self, bundle_id: &str) -> Option<ProtectionReason> {
        self.policy.protection_reason(bundle_id)
    }

    // MARK: - Whitelist

    pub fn whitelist(&self) -> &WhitelistStore<S> {
        &self.whitelist
    }

    pub fn is_whitelisted(&self, bundle_id: &str) -> bool {
        self.whitelist.is_whitelisted(bundle_id)
    }

    /// Toggle whitelist membership in the chosen tier, returning the new
    /// membership.
    pub async fn toggle_whitelist(&self, bundle_id: &str, persistent: bool) -> Result<bool> {
        if persistent {
            self.whitelist.toggle_persistent(bundle_id).await
        } else {
            Ok(self.whitelist.toggle_session(bundle_id))
        }
    }
}
