//! Domain layer - Pure business logic and data models.
//!
//! This module contains domain entities that represent core business concepts.
//! These types have no I/O dependencies and can be tested in isolation.

mod attempt;
mod batch;
mod identity;

// Re-export all domain types
pub use attempt::{AttemptEvent, AttemptReport, AttemptState};
pub use batch::{BatchEvent, BatchResult};
pub use identity::ProcessIdentity;
