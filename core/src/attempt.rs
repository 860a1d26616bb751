//! Termination attempts.
//!
//! An attempt asks one application to quit and follows it to a terminal
//! [`AttemptState`]:
//!
//! 1. Refuse protected identifiers before touching the OS.
//! 2. Refuse identifiers that already have a running attempt.
//! 3. Send the graceful request; an OS rejection ends the attempt.
//! 4. Poll liveness every [`POLL_INTERVAL`] until the process exits or
//!    [`GRACEFUL_TIMEOUT`] elapses.
//!
//! Forced termination is never automatic; callers invoke
//! [`AttemptRunner::force_quit`] after a timeout or rejection.
//!
//! Shared attempt state (which identifiers are in progress, the last failure
//! reason per identifier) is owned by a single registry task. Attempts talk to
//! it over a channel; readers see the snapshot it publishes after every
//! command.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{interval_at, sleep, Instant, MissedTickBehavior};
use tracing::{debug, warn};

use crate::domain::{AttemptEvent, AttemptReport, AttemptState, ProcessIdentity};
use crate::error::{Error, KillError, Result};
use crate::ports::ProcessTerminatorPort;
use crate::protection::ProtectionPolicy;

/// How long a process gets to exit after the graceful request.
pub const GRACEFUL_TIMEOUT: Duration = Duration::from_secs(5);

/// Interval between liveness checks while waiting for a graceful exit.
pub const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Wait between the forced request and the final liveness check.
pub const FORCE_GRACE_PERIOD: Duration = Duration::from_secs(1);

/// Timing constants applied to every attempt of a runner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TerminationTimings {
    pub graceful_timeout: Duration,
    pub poll_interval: Duration,
    pub force_grace: Duration,
}

impl Default for TerminationTimings {
    fn default() -> Self {
        Self {
            graceful_timeout: GRACEFUL_TIMEOUT,
            poll_interval: POLL_INTERVAL,
            force_grace: FORCE_GRACE_PERIOD,
        }
    }
}

/// Snapshot of shared attempt state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttemptStatus {
    /// Identifiers with a non-terminal attempt, and their current state.
    pub in_progress: HashMap<String, AttemptState>,
    /// Last failure reason per identifier, cleared on success.
    pub last_failures: HashMap<String, String>,
}

enum Command {
    Begin {
        bundle_id: String,
        state: AttemptState,
        reply: oneshot::Sender<bool>,
    },
    Transition {
        bundle_id: String,
        state: AttemptState,
    },
    Finish {
        bundle_id: String,
        state: AttemptState,
        reason: Option<String>,
        reply: oneshot::Sender<()>,
    },
}

/// Owner of the shared attempt state. Runs as one task.
struct Registry {
    status: AttemptStatus,
    published: Arc<RwLock<AttemptStatus>>,
}

impl Registry {
    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
        while let Some(command) = commands.recv().await {
            self.handle(command);
        }
        debug!("Attempt registry stopped");
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::Begin {
                bundle_id,
                state,
                reply,
            } => {
                let accepted = !self.status.in_progress.contains_key(&bundle_id);
                if accepted {
                    self.status.in_progress.insert(bundle_id, state);
                    self.publish();
                }
                let _ = reply.send(accepted);
            }
            Command::Transition { bundle_id, state } => {
                if let Some(current) = self.status.in_progress.get_mut(&bundle_id) {
                    *current = state;
                    self.publish();
                }
            }
            Command::Finish {
                bundle_id,
                state,
                reason,
                reply,
            } => {
                self.status.in_progress.remove(&bundle_id);
                match reason {
                    Some(reason) if !state.is_success() => {
                        self.status.last_failures.insert(bundle_id, reason);
                    }
                    _ => {
                        self.status.last_failures.remove(&bundle_id);
                    }
                }
                self.publish();
                let _ = reply.send(());
            }
        }
    }

    fn publish(&self) {
        *self.published.write() = self.status.clone();
    }
}

/// Runs termination attempts against a [`ProcessTerminatorPort`].
///
/// Cloning is cheap; clones share the registry.
pub struct AttemptRunner<T: ProcessTerminatorPort> {
    terminator: Arc<T>,
    policy: Arc<ProtectionPolicy>,
    timings: TerminationTimings,
    commands: mpsc::UnboundedSender<Command>,
    status: Arc<RwLock<AttemptStatus>>,
}

impl<T: ProcessTerminatorPort> Clone for AttemptRunner<T> {
    fn clone(&self) -> Self {
        Self {
            terminator: Arc::clone(&self.terminator),
            policy: Arc::clone(&self.policy),
            timings: self.timings,
            commands: self.commands.clone(),
            status: Arc::clone(&self.status),
        }
    }
}

impl<T: ProcessTerminatorPort> AttemptRunner<T> {
    /// Create a runner and start its registry task.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(
        terminator: Arc<T>,
        policy: Arc<ProtectionPolicy>,
        timings: TerminationTimings,
    ) -> Self {
        let (commands, receiver) = mpsc::unbounded_channel();
        let status = Arc::new(RwLock::new(AttemptStatus::default()));

        let registry = Registry {
            status: AttemptStatus::default(),
            published: Arc::clone(&status),
        };
        tokio::spawn(registry.run(receiver));

        Self {
            terminator,
            policy,
            timings,
            commands,
            status,
        }
    }

    pub fn policy(&self) -> &Arc<ProtectionPolicy> {
        &self.policy
    }

    pub fn timings(&self) -> TerminationTimings {
        self.timings
    }

    // =========================================================================
    // Attempts
    // =========================================================================

    /// Ask an application to quit and wait for it to exit.
    ///
    /// Ends in `Succeeded`, `TimedOut`, `PermissionDenied`, `Protected` or
    /// `AlreadyInProgress`. The attempt runs on its own task, so dropping the
    /// returned future does not stop it from reaching a terminal state.
    pub async fn quit(&self, identity: ProcessIdentity) -> Result<AttemptReport> {
        let runner = self.clone();
        detached(async move { runner.run_graceful(identity).await }).await
    }

    /// Terminate an application unconditionally, then check once whether it
    /// is gone.
    ///
    /// Ends in `ForceSucceeded`, `ForceFailed`, `PermissionDenied`,
    /// `Protected` or `AlreadyInProgress`. Runs on its own task like
    /// [`quit`](Self::quit).
    pub async fn force_quit(&self, identity: ProcessIdentity) -> Result<AttemptReport> {
        let runner = self.clone();
        detached(async move { runner.run_force(identity).await }).await
    }

    async fn run_graceful(&self, identity: ProcessIdentity) -> Result<AttemptReport> {
        if let Some(report) = self.refuse_protected(&identity) {
            return Ok(report);
        }
        let Some(mut attempt) = self.begin(identity.clone()).await? else {
            return Ok(already_in_progress(identity));
        };

        attempt.advance(AttemptEvent::RequestGraceful);
        match self.terminator.request_graceful(&attempt.identity).await {
            Ok(()) => {}
            Err(KillError::ProcessNotFound(_)) => {
                attempt.advance(AttemptEvent::Exited);
                return attempt.finish(None).await;
            }
            Err(e) => {
                attempt.advance(AttemptEvent::Rejected);
                return attempt.finish(Some(e.to_string())).await;
            }
        }

        if self.wait_for_exit(&attempt.identity).await {
            attempt.advance(AttemptEvent::Exited);
            attempt.finish(None).await
        } else {
            attempt.advance(AttemptEvent::DeadlineElapsed);
            let reason = format!(
                "did not exit within {:?}",
                self.timings.graceful_timeout
            );
            attempt.finish(Some(reason)).await
        }
    }

    async fn run_force(&self, identity: ProcessIdentity) -> Result<AttemptReport> {
        if let Some(report) = self.refuse_protected(&identity) {
            return Ok(report);
        }
        let Some(mut attempt) = self.begin(identity.clone()).await? else {
            return Ok(already_in_progress(identity));
        };

        attempt.advance(AttemptEvent::Escalate);
        match self.terminator.request_force(&attempt.identity).await {
            Ok(()) => {}
            Err(KillError::ProcessNotFound(_)) => {
                attempt.advance(AttemptEvent::Exited);
                return attempt.finish(None).await;
            }
            Err(e) => {
                attempt.advance(AttemptEvent::Rejected);
                return attempt.finish(Some(e.to_string())).await;
            }
        }

        sleep(self.timings.force_grace).await;

        if self.terminator.is_alive(&attempt.identity).await {
            attempt.advance(AttemptEvent::StillAlive);
            attempt
                .finish(Some("still running after forced termination".to_string()))
                .await
        } else {
            attempt.advance(AttemptEvent::Exited);
            attempt.finish(None).await
        }
    }

    fn refuse_protected(&self, identity: &ProcessIdentity) -> Option<AttemptReport> {
        let reason = self.policy.protection_reason(identity.bundle_id())?;
        debug!(bundle_id = identity.bundle_id(), %reason, "Refusing protected target");
        Some(AttemptReport::failure(
            identity.clone(),
            AttemptState::Protected,
            reason.to_string(),
        ))
    }

    /// Register a new attempt, or `None` if one is already running.
    async fn begin(&self, identity: ProcessIdentity) -> Result<Option<Attempt<'_, T>>> {
        let (reply, accepted) = oneshot::channel();
        self.commands
            .send(Command::Begin {
                bundle_id: identity.bundle_id().to_string(),
                state: AttemptState::Pending,
                reply,
            })
            .map_err(|_| Error::CoordinatorStopped)?;

        if !accepted.await.map_err(|_| Error::CoordinatorStopped)? {
            debug!(bundle_id = identity.bundle_id(), "Attempt already in progress");
            return Ok(None);
        }

        Ok(Some(Attempt {
            runner: self,
            identity,
            state: AttemptState::Pending,
            finished: false,
        }))
    }

    /// Poll until the process is gone or the graceful timeout elapses.
    async fn wait_for_exit(&self, target: &ProcessIdentity) -> bool {
        let start = Instant::now();
        let deadline = start + self.timings.graceful_timeout;
        let period = self.timings.poll_interval;
        let mut ticker = interval_at(start + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            if !self.terminator.is_alive(target).await {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
        }
    }

    // =========================================================================
    // Status
    // =========================================================================

    /// Current snapshot of the shared attempt state.
    pub fn status(&self) -> AttemptStatus {
        self.status.read().clone()
    }

    /// State of the running attempt for an identifier, if any.
    pub fn state_of(&self, bundle_id: &str) -> Option<AttemptState> {
        self.status.read().in_progress.get(bundle_id).copied()
    }

    pub fn is_in_progress(&self, bundle_id: &str) -> bool {
        self.status.read().in_progress.contains_key(bundle_id)
    }

    /// Last failure reason recorded for an identifier.
    pub fn last_failure(&self, bundle_id: &str) -> Option<String> {
        self.status.read().last_failures.get(bundle_id).cloned()
    }
}

/// Run an attempt on its own task and wait for its report.
async fn detached<F>(attempt: F) -> Result<AttemptReport>
where
    F: Future<Output = Result<AttemptReport>> + Send + 'static,
{
    match tokio::spawn(attempt).await {
        Ok(report) => report,
        Err(e) => Err(Error::AttemptAborted(e.to_string())),
    }
}

fn already_in_progress(identity: ProcessIdentity) -> AttemptReport {
    AttemptReport::failure(
        identity,
        AttemptState::AlreadyInProgress,
        "a quit request is already in progress",
    )
}

/// One registered attempt. Dropped after its terminal transition.
///
/// Dropping it before [`finish`](Attempt::finish) (a panicking terminator)
/// still releases the identifier, recording the attempt as aborted.
struct Attempt<'a, T: ProcessTerminatorPort> {
    runner: &'a AttemptRunner<T>,
    identity: ProcessIdentity,
    state: AttemptState,
    finished: bool,
}

impl<T: ProcessTerminatorPort> Drop for Attempt<'_, T> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        warn!(
            bundle_id = self.identity.bundle_id(),
            state = %self.state,
            "Attempt dropped before finishing"
        );
        let (reply, _) = oneshot::channel();
        let _ = self.runner.commands.send(Command::Finish {
            bundle_id: self.identity.bundle_id().to_string(),
            state: AttemptState::Aborted,
            reason: Some(format!("attempt aborted while {}", self.state)),
            reply,
        });
    }
}

impl<T: ProcessTerminatorPort> Attempt<'_, T> {
    fn advance(&mut self, event: AttemptEvent) {
        let Some(next) = self.state.next(event) else {
            warn!(
                bundle_id = self.identity.bundle_id(),
                state = %self.state,
                ?event,
                "Ignoring invalid attempt transition"
            );
            return;
        };

        debug!(
            bundle_id = self.identity.bundle_id(),
            pid = self.identity.pid(),
            from = %self.state,
            to = %next,
            "Attempt transition"
        );
        self.state = next;

        if !next.is_terminal() {
            let _ = self.runner.commands.send(Command::Transition {
                bundle_id: self.identity.bundle_id().to_string(),
                state: next,
            });
        }
    }

    async fn finish(mut self, reason: Option<String>) -> Result<AttemptReport> {
        self.finished = true;
        let identity = self.identity.clone();
        let state = self.state;

        let (reply, done) = oneshot::channel();
        self.runner
            .commands
            .send(Command::Finish {
                bundle_id: identity.bundle_id().to_string(),
                state,
                reason: reason.clone(),
                reply,
            })
            .map_err(|_| Error::CoordinatorStopped)?;
        done.await.map_err(|_| Error::CoordinatorStopped)?;

        if state.is_success() {
            Ok(AttemptReport::success(identity, state))
        } else {
            warn!(
                bundle_id = identity.bundle_id(),
                %state,
                reason = reason.as_deref().unwrap_or(""),
                "Attempt failed"
            );
            let reason = reason.unwrap_or_else(|| state.to_string());
            Ok(AttemptReport::failure(identity, state, reason))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Call, Script, ScriptedTerminator};

    const SELF_ID: &str = "com.example.quitter";

    fn runner(terminator: &Arc<ScriptedTerminator>) -> AttemptRunner<ScriptedTerminator> {
        AttemptRunner::spawn(
            Arc::clone(terminator),
            Arc::new(ProtectionPolicy::new(SELF_ID)),
            TerminationTimings::default(),
        )
    }

    fn app(bundle_id: &str, pid: u32) -> ProcessIdentity {
        ProcessIdentity::new(bundle_id, pid, bundle_id).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_graceful_exit_within_two_polls() {
        let terminator = Arc::new(ScriptedTerminator::new());
        terminator.script(10, Script::ExitsAfter(Duration::from_millis(800)));
        let runner = runner(&terminator);

        let started = Instant::now();
        let report = runner.quit(app("com.example.d", 10)).await.unwrap();

        assert_eq!(report.state, AttemptState::Succeeded);
        assert!(report.reason.is_none());
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(1) && elapsed < Duration::from_millis(1500));
        assert!(!runner.is_in_progress("com.example.d"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_when_process_never_exits() {
        let terminator = Arc::new(ScriptedTerminator::new());
        terminator.script(11, Script::IgnoresGraceful);
        let runner = runner(&terminator);

        let started = Instant::now();
        let report = runner.quit(app("com.example.e", 11)).await.unwrap();

        assert_eq!(report.state, AttemptState::TimedOut);
        let elapsed = started.elapsed();
        assert!(elapsed >= GRACEFUL_TIMEOUT && elapsed < GRACEFUL_TIMEOUT + POLL_INTERVAL);
        assert_eq!(
            runner.last_failure("com.example.e").as_deref(),
            Some("did not exit within 5s")
        );
        // No automatic escalation.
        assert!(!terminator.calls().iter().any(|c| matches!(c, Call::Force(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejected_request_skips_wait() {
        let terminator = Arc::new(ScriptedTerminator::new());
        terminator.script(12, Script::RejectsGraceful);
        let runner = runner(&terminator);

        let started = Instant::now();
        let report = runner.quit(app("com.example.locked", 12)).await.unwrap();

        assert_eq!(report.state, AttemptState::PermissionDenied);
        assert!(started.elapsed() < POLL_INTERVAL);
        assert!(runner.last_failure("com.example.locked").is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_already_gone_counts_as_success() {
        let terminator = Arc::new(ScriptedTerminator::new());
        terminator.script(13, Script::AlreadyGone);
        let runner = runner(&terminator);

        let report = runner.quit(app("com.example.gone", 13)).await.unwrap();
        assert_eq!(report.state, AttemptState::Succeeded);
    }

    #[tokio::test(start_paused = true)]
    async fn test_protected_never_reaches_os() {
        let terminator = Arc::new(ScriptedTerminator::new());
        let runner = runner(&terminator);

        for id in crate::protection::DEFAULT_PROTECTED_IDS.iter().chain([&SELF_ID]) {
            let report = runner.quit(app(id, 20)).await.unwrap();
            assert_eq!(report.state, AttemptState::Protected);
            let forced = runner.force_quit(app(id, 20)).await.unwrap();
            assert_eq!(forced.state, AttemptState::Protected);
        }

        assert!(terminator.calls().is_empty());
        assert!(runner.status().in_progress.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_duplicate_attempt_rejected() {
        let terminator = Arc::new(ScriptedTerminator::new());
        terminator.script(30, Script::ExitsAfter(Duration::from_secs(2)));
        let runner = runner(&terminator);

        let first = tokio::spawn({
            let runner = runner.clone();
            async move { runner.quit(app("com.example.slow", 30)).await }
        });

        while !runner.is_in_progress("com.example.slow") {
            sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(
            runner.state_of("com.example.slow"),
            Some(AttemptState::GracefulRequested)
        );

        let second = runner.quit(app("com.example.slow", 31)).await.unwrap();
        assert_eq!(second.state, AttemptState::AlreadyInProgress);

        let first = first.await.unwrap().unwrap();
        assert_eq!(first.state, AttemptState::Succeeded);
        assert_eq!(terminator.graceful_count("com.example.slow"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_force_after_timeout() {
        let terminator = Arc::new(ScriptedTerminator::new());
        terminator.script(40, Script::IgnoresGraceful);
        let runner = runner(&terminator);

        let timed_out = runner.quit(app("com.example.stuck", 40)).await.unwrap();
        assert!(timed_out.state.can_escalate());

        let started = Instant::now();
        let forced = runner.force_quit(app("com.example.stuck", 40)).await.unwrap();
        assert_eq!(forced.state, AttemptState::ForceSucceeded);
        let elapsed = started.elapsed();
        assert!(elapsed >= FORCE_GRACE_PERIOD && elapsed < FORCE_GRACE_PERIOD + POLL_INTERVAL);
        assert!(runner.last_failure("com.example.stuck").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_force_failed_when_process_survives() {
        let terminator = Arc::new(ScriptedTerminator::new());
        terminator.script(41, Script::Unkillable);
        let runner = runner(&terminator);

        let forced = runner.force_quit(app("com.example.zombie", 41)).await.unwrap();
        assert_eq!(forced.state, AttemptState::ForceFailed);
        assert_eq!(
            forced.message(),
            "Could not quit com.example.zombie: still running after forced termination"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejected_force_is_permission_denied() {
        let terminator = Arc::new(ScriptedTerminator::new());
        terminator.script(42, Script::RejectsForce);
        let runner = runner(&terminator);

        let timed_out = runner.quit(app("com.example.root", 42)).await.unwrap();
        assert_eq!(timed_out.state, AttemptState::TimedOut);

        let started = Instant::now();
        let forced = runner.force_quit(app("com.example.root", 42)).await.unwrap();
        assert_eq!(forced.state, AttemptState::PermissionDenied);
        assert!(started.elapsed() < FORCE_GRACE_PERIOD);
        assert_eq!(
            runner.last_failure("com.example.root").as_deref(),
            Some("Permission denied to terminate process 42")
        );
        assert!(!runner.is_in_progress("com.example.root"));
        // Permission denial still allows another escalation.
        assert!(forced.state.can_escalate());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_caller_does_not_strand_attempt() {
        let terminator = Arc::new(ScriptedTerminator::new());
        terminator.script(50, Script::IgnoresGraceful);
        let runner = runner(&terminator);

        let pending = runner.quit(app("com.example.hung", 50));
        let abandoned = tokio::time::timeout(Duration::from_secs(1), pending).await;
        assert!(abandoned.is_err());
        assert!(runner.is_in_progress("com.example.hung"));

        sleep(GRACEFUL_TIMEOUT).await;

        assert!(!runner.is_in_progress("com.example.hung"));
        assert_eq!(
            runner.last_failure("com.example.hung").as_deref(),
            Some("did not exit within 5s")
        );

        let retry = runner.quit(app("com.example.hung", 50)).await.unwrap();
        assert_eq!(retry.state, AttemptState::TimedOut);
        assert_eq!(terminator.graceful_count("com.example.hung"), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_panicking_terminator_releases_identifier() {
        let terminator = Arc::new(ScriptedTerminator::new());
        terminator.script(60, Script::Panics);
        let runner = runner(&terminator);

        let result = runner.quit(app("com.example.crash", 60)).await;
        assert!(matches!(result, Err(Error::AttemptAborted(_))));

        sleep(POLL_INTERVAL).await;
        assert!(!runner.is_in_progress("com.example.crash"));
        assert_eq!(
            runner.last_failure("com.example.crash").as_deref(),
            Some("attempt aborted while graceful-requested")
        );
    }
}
