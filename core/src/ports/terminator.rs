//! Process terminator port (interface).

use crate::domain::ProcessIdentity;
use crate::error::KillError;

/// Port for terminating processes.
///
/// This trait defines the interface the attempt runner uses to reach the OS.
/// Implementations only deliver requests; waiting and classification are
/// done by the caller.
pub trait ProcessTerminatorPort: Send + Sync + 'static {
    /// Ask the process to exit cooperatively.
    ///
    /// `Err(KillError::ProcessNotFound)` means the process is already gone.
    /// Any other error means the OS rejected the request.
    fn request_graceful(
        &self,
        target: &ProcessIdentity,
    ) -> impl std::future::Future<Output = Result<(), KillError>> + Send;

    /// Terminate the process unconditionally.
    fn request_force(
        &self,
        target: &ProcessIdentity,
    ) -> impl std::future::Future<Output = Result<(), KillError>> + Send;

    /// Check if the process is still running.
    fn is_alive(&self, target: &ProcessIdentity) -> impl std::future::Future<Output = bool> + Send;
}
