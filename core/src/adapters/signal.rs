//! Unix process terminator using signals.
//!
//! - `SIGTERM` for the graceful request
//! - `SIGKILL` for the forced request
//! - signal 0 to check liveness

use nix::errno::Errno;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use tracing::{debug, warn};

use crate::domain::ProcessIdentity;
use crate::error::KillError;
use crate::ports::ProcessTerminatorPort;

/// Process terminator backed by `kill(2)`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SignalTerminator;

impl SignalTerminator {
    /// Create a new SignalTerminator instance
    pub fn new() -> Self {
        Self
    }

    /// Send a signal to a process.
    ///
    /// `None` sends no signal and only checks that the PID can be signalled.
    fn send_signal(&self, pid: u32, signal: Option<Signal>) -> Result<(), KillError> {
        // PID 0 and negative PIDs address process groups; never go there.
        let raw = match i32::try_from(pid) {
            Ok(raw) if raw > 0 => raw,
            _ => {
                return Err(KillError::SignalFailed(
                    pid,
                    "PID out of range for a single process".to_string(),
                ))
            }
        };

        match kill(Pid::from_raw(raw), signal) {
            Ok(()) => Ok(()),
            Err(Errno::ESRCH) => Err(KillError::ProcessNotFound(pid)),
            Err(Errno::EPERM) => Err(KillError::PermissionDenied(pid)),
            Err(errno) => Err(KillError::SignalFailed(pid, errno.desc().to_string())),
        }
    }
}

impl ProcessTerminatorPort for SignalTerminator {
    async fn request_graceful(&self, target: &ProcessIdentity) -> Result<(), KillError> {
        debug!(pid = target.pid(), bundle_id = target.bundle_id(), "Sending SIGTERM");
        let result = self.send_signal(target.pid(), Some(Signal::SIGTERM));
        if let Err(KillError::PermissionDenied(pid)) = &result {
            warn!(pid = *pid, "Permission denied sending SIGTERM");
        }
        result
    }

    async fn request_force(&self, target: &ProcessIdentity) -> Result<(), KillError> {
        debug!(pid = target.pid(), bundle_id = target.bundle_id(), "Sending SIGKILL");
        let result = self.send_signal(target.pid(), Some(Signal::SIGKILL));
        if let Err(KillError::PermissionDenied(pid)) = &result {
            warn!(pid = *pid, "Permission denied sending SIGKILL");
        }
        result
    }

    async fn is_alive(&self, target: &ProcessIdentity) -> bool {
        match self.send_signal(target.pid(), None) {
            Ok(()) => true,
            // Exists, but belongs to someone else.
            Err(KillError::PermissionDenied(_)) => true,
            Err(_) => false,
        }
    }
}
