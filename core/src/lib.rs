//! AppQuitter Core Library
//!
//! Quit orchestration and safety gating for running applications.
//! Provides functionality to:
//! - Refuse protected system applications and the controlling app itself
//! - Keep a session and a persistent whitelist
//! - Quit applications gracefully, with a bounded wait, or forcefully
//! - Quit a whole list of applications concurrently and report each outcome
//!
//! # Architecture
//! This library follows hexagonal architecture (ports & adapters):
//! - `domain`: Pure business logic and data models
//! - `ports`: Trait definitions (interfaces)
//! - `adapters`: External system implementations
//!
//! Process enumeration is not part of this crate; callers pass in the
//! applications they want considered.

// Hexagonal architecture layers
pub mod adapters;
pub mod domain;
pub mod ports;

pub mod attempt;
pub mod batch;
pub mod config;
pub mod engine;
pub mod error;
pub mod protection;
pub mod whitelist;

#[cfg(test)]
pub(crate) mod testing;

// Re-export domain types (primary API)
pub use domain::{
    AttemptEvent, AttemptReport, AttemptState, BatchEvent, BatchResult, ProcessIdentity,
};

// Re-export other commonly used types
pub use adapters::MemoryStore;
#[cfg(unix)]
pub use adapters::SignalTerminator;
pub use attempt::{AttemptRunner, AttemptStatus, TerminationTimings};
pub use batch::{BatchCoordinator, BatchHandle};
pub use config::{ConfigStore, QuitterConfig};
pub use engine::QuitterEngine;
pub use error::{Error, KillError, Result};
pub use ports::{KeyValueStore, ProcessTerminatorPort};
pub use protection::{ProtectionPolicy, ProtectionReason};
pub use whitelist::WhitelistStore;
