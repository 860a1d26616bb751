//! Key-value store port (interface).

use crate::error::Result;

/// Port for durable storage of string lists under fixed keys.
///
/// `save_list` must not return until the value is durable.
pub trait KeyValueStore: Send + Sync {
    /// Load the list stored under `key`. A missing key is an empty list.
    fn load_list(
        &self,
        key: &str,
    ) -> impl std::future::Future<Output = Result<Vec<String>>> + Send;

    /// Replace the list stored under `key`.
    fn save_list(
        &self,
        key: &str,
        values: &[String],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}
