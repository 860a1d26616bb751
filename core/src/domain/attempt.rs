//! Termination attempt states and reports.

use serde::{Deserialize, Serialize};

use super::ProcessIdentity;

/// State of a termination attempt for one bundle identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AttemptState {
    Pending,
    GracefulRequested,
    /// Process exited after the graceful request.
    Succeeded,
    /// Graceful request accepted but the process outlived the timeout.
    TimedOut,
    ForceRequested,
    ForceSucceeded,
    /// Process still alive after the forced request and its grace period.
    ForceFailed,
    /// The OS refused the termination request.
    PermissionDenied,
    /// Another attempt for the same identifier is still running.
    AlreadyInProgress,
    /// Identifier is in the protected set; no request was issued.
    Protected,
    /// The attempt stopped before reaching an outcome, for a reason outside
    /// the OS (the attempt task failed or the coordinator is gone).
    Aborted,
}

/// Inputs that drive an [`AttemptState`] forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptEvent {
    RequestGraceful,
    Exited,
    Rejected,
    DeadlineElapsed,
    Escalate,
    StillAlive,
}

impl AttemptState {
    /// Apply an event, returning the next state or `None` if the transition
    /// is not part of the machine.
    pub fn next(self, event: AttemptEvent) -> Option<AttemptState> {
        use AttemptEvent as E;
        use AttemptState as S;

        match (self, event) {
            (S::Pending, E::RequestGraceful) => Some(S::GracefulRequested),
            (S::GracefulRequested, E::Exited) => Some(S::Succeeded),
            (S::GracefulRequested, E::Rejected) => Some(S::PermissionDenied),
            (S::GracefulRequested, E::DeadlineElapsed) => Some(S::TimedOut),
            (S::Pending | S::TimedOut | S::PermissionDenied, E::Escalate) => {
                Some(S::ForceRequested)
            }
            (S::ForceRequested, E::Exited) => Some(S::ForceSucceeded),
            (S::ForceRequested, E::StillAlive) => Some(S::ForceFailed),
            (S::ForceRequested, E::Rejected) => Some(S::PermissionDenied),
            _ => None,
        }
    }

    /// Whether no further automatic transition will happen.
    pub fn is_terminal(self) -> bool {
        !matches!(
            self,
            AttemptState::Pending | AttemptState::GracefulRequested | AttemptState::ForceRequested
        )
    }

    /// Whether the target process is known to be gone.
    pub fn is_success(self) -> bool {
        matches!(self, AttemptState::Succeeded | AttemptState::ForceSucceeded)
    }

    /// Whether the caller may escalate to a forced termination from here.
    pub fn can_escalate(self) -> bool {
        self.next(AttemptEvent::Escalate).is_some()
    }

    pub fn label(self) -> &'static str {
        match self {
            AttemptState::Pending => "pending",
            AttemptState::GracefulRequested => "graceful-requested",
            AttemptState::Succeeded => "succeeded",
            AttemptState::TimedOut => "timed-out",
            AttemptState::ForceRequested => "force-requested",
            AttemptState::ForceSucceeded => "force-succeeded",
            AttemptState::ForceFailed => "force-failed",
            AttemptState::PermissionDenied => "permission-denied",
            AttemptState::AlreadyInProgress => "already-in-progress",
            AttemptState::Protected => "protected",
            AttemptState::Aborted => "aborted",
        }
    }
}

impl std::fmt::Display for AttemptState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Outcome of one termination attempt, ready for status display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptReport {
    pub identity: ProcessIdentity,
    pub state: AttemptState,
    /// Failure reason, present whenever `state` is not a success.
    pub reason: Option<String>,
}

impl AttemptReport {
    pub fn success(identity: ProcessIdentity, state: AttemptState) -> Self {
        Self {
            identity,
            state,
            reason: None,
        }
    }

    pub fn failure(
        identity: ProcessIdentity,
        state: AttemptState,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            identity,
            state,
            reason: Some(reason.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.state.is_success()
    }

    /// User-facing notification text naming the application and the reason.
    pub fn message(&self) -> String {
        let name = self.identity.name();
        match (self.state, &self.reason) {
            (AttemptState::Succeeded, _) => format!("Quit {}", name),
            (AttemptState::ForceSucceeded, _) => format!("Force quit {}", name),
            (_, Some(reason)) => format!("Could not quit {}: {}", name, reason),
            (state, None) => format!("Could not quit {}: {}", name, state),
        }
    }
}
