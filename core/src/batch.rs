//! Batch coordinator: quit every candidate that is not whitelisted.
//!
//! One attempt runs per remaining candidate, all concurrently. A single
//! aggregator task owns the [`BatchResult`] and the remaining count, forwards
//! each resolution as a [`BatchEvent::Progress`], and sends
//! [`BatchEvent::Completed`] once, after the last progress event.

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::attempt::AttemptRunner;
use crate::domain::{AttemptReport, AttemptState, BatchEvent, BatchResult, ProcessIdentity};
use crate::error::{Error, Result};
use crate::ports::ProcessTerminatorPort;

/// Fans attempts out over a candidate list.
pub struct BatchCoordinator<T: ProcessTerminatorPort> {
    runner: AttemptRunner<T>,
}

impl<T: ProcessTerminatorPort> BatchCoordinator<T> {
    pub fn new(runner: AttemptRunner<T>) -> Self {
        Self { runner }
    }

    pub fn runner(&self) -> &AttemptRunner<T> {
        &self.runner
    }

    /// Quit every candidate for which `is_whitelisted` is false.
    ///
    /// Candidates are trusted to be regular applications; protected ones are
    /// still refused by the attempt runner. Must be called from within a tokio
    /// runtime.
    pub fn quit_all<F>(&self, candidates: Vec<ProcessIdentity>, is_whitelisted: F) -> BatchHandle
    where
        F: Fn(&str) -> bool,
    {
        let total = candidates.len();
        let targets: Vec<ProcessIdentity> = candidates
            .into_iter()
            .filter(|c| !is_whitelisted(c.bundle_id()))
            .collect();
        let filtered = total - targets.len();

        let mut result = BatchResult::new(total, filtered);
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        info!(
            batch = %result.id,
            candidates = total,
            filtered,
            "Starting quit-all batch"
        );

        if targets.is_empty() {
            result.complete();
            let _ = events_tx.send(BatchEvent::Completed(result));
            return BatchHandle { events: events_rx };
        }

        let (resolved_tx, resolved_rx) = mpsc::unbounded_channel();
        for identity in targets.iter().cloned() {
            let runner = self.runner.clone();
            let resolved = resolved_tx.clone();
            tokio::spawn(async move {
                let report = match runner.quit(identity.clone()).await {
                    Ok(report) => report,
                    Err(e) => {
                        warn!(bundle_id = identity.bundle_id(), error = %e, "Attempt aborted");
                        AttemptReport::failure(identity, AttemptState::Aborted, e.to_string())
                    }
                };
                let _ = resolved.send(report);
            });
        }
        drop(resolved_tx);

        tokio::spawn(aggregate(result, targets.len(), resolved_rx, events_tx));

        BatchHandle { events: events_rx }
    }
}

/// Collect resolutions until `remaining` reaches zero, then complete.
async fn aggregate(
    mut result: BatchResult,
    mut remaining: usize,
    mut resolved: mpsc::UnboundedReceiver<AttemptReport>,
    events: mpsc::UnboundedSender<BatchEvent>,
) {
    while remaining > 0 {
        let Some(report) = resolved.recv().await else {
            // Every attempt task is gone; nothing else will arrive.
            break;
        };
        remaining -= 1;
        debug!(
            batch = %result.id,
            bundle_id = report.identity.bundle_id(),
            state = %report.state,
            remaining,
            "Batch attempt resolved"
        );

        result.record(report.clone());
        // A dropped handle only means nobody is listening anymore.
        let _ = events.send(BatchEvent::Progress {
            identity: report.identity.clone(),
            report,
        });
    }

    result.complete();
    info!(
        batch = %result.id,
        succeeded = result.succeeded().count(),
        failed = result.failed().count(),
        "Quit-all batch completed"
    );
    let _ = events.send(BatchEvent::Completed(result));
}

/// Receiving end of a running batch.
#[derive(Debug)]
pub struct BatchHandle {
    events: mpsc::UnboundedReceiver<BatchEvent>,
}

impl BatchHandle {
    /// Next event, or `None` once the completion event has been consumed.
    pub async fn next_event(&mut self) -> Option<BatchEvent> {
        self.events.recv().await
    }

    /// Drain the batch and return its result.
    pub async fn wait(mut self) -> Result<BatchResult> {
        while let Some(event) = self.next_event().await {
            if let BatchEvent::Completed(result) = event {
                return Ok(result);
            }
        }
        Err(Error::CoordinatorStopped)
    }
}
