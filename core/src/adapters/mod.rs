//! Adapters layer - External system implementations.
//!
//! This module contains implementations of the port traits defined in `ports`.
//! Each adapter handles communication with external systems.

pub mod memory_store;

#[cfg(unix)]
pub mod signal;

// Re-export main types for convenience
pub use memory_store::MemoryStore;

#[cfg(unix)]
pub use signal::SignalTerminator;
