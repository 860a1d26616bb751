//! Ports layer - Trait definitions (interfaces).
//!
//! This module defines the interfaces that the application layer uses
//! to interact with external systems. Implementations live in `adapters`.

mod store;
mod terminator;

pub use store::KeyValueStore;
pub use terminator::ProcessTerminatorPort;
