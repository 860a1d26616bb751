//! Test doubles: a scripted process terminator and a store whose saves can
//! be made to fail.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::RwLock;
use tokio::time::Instant;

use crate::adapters::MemoryStore;
use crate::domain::ProcessIdentity;
use crate::error::{self, Error, KillError};
use crate::ports::{KeyValueStore, ProcessTerminatorPort};

/// How a scripted process reacts to termination requests.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Script {
    /// Exits this long after the graceful request; dies at once when forced.
    ExitsAfter(Duration),
    /// Accepts the graceful request but keeps running; dies when forced.
    IgnoresGraceful,
    /// The OS refuses the graceful request; dies when forced.
    RejectsGraceful,
    /// Ignores the graceful request and the OS refuses the forced one.
    RejectsForce,
    /// Accepts both requests and never exits.
    Unkillable,
    /// Already gone before any request.
    AlreadyGone,
    /// The terminator itself panics on the graceful request.
    Panics,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Call {
    Graceful(String),
    Force(String),
}

#[derive(Default)]
pub(crate) struct ScriptedTerminator {
    scripts: RwLock<HashMap<u32, Script>>,
    deaths: RwLock<HashMap<u32, Instant>>,
    calls: RwLock<Vec<Call>>,
}

impl ScriptedTerminator {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn script(&self, pid: u32, script: Script) {
        self.scripts.write().insert(pid, script);
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.calls.read().clone()
    }

    pub(crate) fn graceful_count(&self, bundle_id: &str) -> usize {
        self.calls
            .read()
            .iter()
            .filter(|c| matches!(c, Call::Graceful(id) if id == bundle_id))
            .count()
    }

    fn script_for(&self, pid: u32) -> Script {
        self.scripts
            .read()
            .get(&pid)
            .copied()
            .unwrap_or(Script::ExitsAfter(Duration::from_millis(100)))
    }

    fn die_at(&self, pid: u32, at: Instant) {
        self.deaths.write().insert(pid, at);
    }
}

impl ProcessTerminatorPort for ScriptedTerminator {
    async fn request_graceful(&self, target: &ProcessIdentity) -> Result<(), KillError> {
        self.calls
            .write()
            .push(Call::Graceful(target.bundle_id().to_string()));

        match self.script_for(target.pid()) {
            Script::ExitsAfter(delay) => {
                self.die_at(target.pid(), Instant::now() + delay);
                Ok(())
            }
            Script::IgnoresGraceful | Script::RejectsForce | Script::Unkillable => Ok(()),
            Script::RejectsGraceful => Err(KillError::PermissionDenied(target.pid())),
            Script::AlreadyGone => Err(KillError::ProcessNotFound(target.pid())),
            Script::Panics => panic!("terminator failed for PID {}", target.pid()),
        }
    }

    async fn request_force(&self, target: &ProcessIdentity) -> Result<(), KillError> {
        self.calls
            .write()
            .push(Call::Force(target.bundle_id().to_string()));

        match self.script_for(target.pid()) {
            Script::Unkillable => Ok(()),
            Script::RejectsForce => Err(KillError::PermissionDenied(target.pid())),
            Script::AlreadyGone => Err(KillError::ProcessNotFound(target.pid())),
            _ => {
                self.die_at(target.pid(), Instant::now());
                Ok(())
            }
        }
    }

    async fn is_alive(&self, target: &ProcessIdentity) -> bool {
        if matches!(self.script_for(target.pid()), Script::AlreadyGone) {
            return false;
        }
        match self.deaths.read().get(&target.pid()) {
            Some(at) => Instant::now() < *at,
            None => true,
        }
    }
}

/// [`MemoryStore`] whose saves fail while `failing` is set.
#[derive(Default)]
pub(crate) struct FlakyStore {
    pub(crate) inner: MemoryStore,
    failing: AtomicBool,
}

impl FlakyStore {
    pub(crate) fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

impl KeyValueStore for FlakyStore {
    async fn load_list(&self, key: &str) -> error::Result<Vec<String>> {
        self.inner.load_list(key).await
    }

    async fn save_list(&self, key: &str, values: &[String]) -> error::Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(Error::Io(std::io::Error::new(std::io::ErrorKind::Other, "disk full")));
        }
        self.inner.save_list(key, values).await
    }
}
