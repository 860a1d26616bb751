//! Batch ("quit all") result model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{AttemptReport, ProcessIdentity};

/// Aggregate over one "quit all" invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchResult {
    pub id: Uuid,
    /// Candidates handed to the batch, before whitelist filtering.
    pub total_candidates: usize,
    /// Candidates dropped because the whitelist predicate matched.
    pub filtered_count: usize,
    /// One entry per attempt, in resolution order.
    pub entries: Vec<(ProcessIdentity, AttemptReport)>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl BatchResult {
    pub fn new(total_candidates: usize, filtered_count: usize) -> Self {
        Self {
            id: Uuid::new_v4(),
            total_candidates,
            filtered_count,
            entries: Vec::new(),
            started_at: Utc::now(),
            completed_at: None,
        }
    }

    /// Number of attempts that were started.
    pub fn processed_count(&self) -> usize {
        self.total_candidates - self.filtered_count
    }

    pub fn succeeded(&self) -> impl Iterator<Item = &AttemptReport> {
        self.entries.iter().map(|(_, r)| r).filter(|r| r.is_success())
    }

    pub fn failed(&self) -> impl Iterator<Item = &AttemptReport> {
        self.entries.iter().map(|(_, r)| r).filter(|r| !r.is_success())
    }

    pub fn is_complete(&self) -> bool {
        self.completed_at.is_some()
    }

    pub(crate) fn record(&mut self, report: AttemptReport) {
        self.entries.push((report.identity.clone(), report));
    }

    pub(crate) fn complete(&mut self) {
        self.completed_at = Some(Utc::now());
    }
}

/// Event streamed from a running batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchEvent {
    /// One attempt resolved.
    Progress {
        identity: ProcessIdentity,
        report: AttemptReport,
    },
    /// Every attempt resolved. Always the last event of a batch.
    Completed(BatchResult),
}
