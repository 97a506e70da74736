//! Repository trait for the app snapshot.

use async_trait::async_trait;

use super::AppSnapshot;
use crate::error::Result;

/// An abstract repository for persisting the [`AppSnapshot`].
///
/// This trait decouples the application layer from the concrete storage
/// format, enabling different backends (JSON file, in-memory for tests).
#[async_trait]
pub trait SnapshotRepository: Send + Sync {
    /// Loads the stored snapshot.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(snapshot))`: A snapshot was stored
    /// - `Ok(None)`: Nothing has been saved yet
    /// - `Err(_)`: The store exists but could not be read
    async fn load(&self) -> Result<Option<AppSnapshot>>;

    /// Replaces the stored snapshot.
    async fn save(&self, snapshot: &AppSnapshot) -> Result<()>;

    /// Synchronous save for shutdown paths where no runtime may be available.
    fn save_blocking(&self, snapshot: &AppSnapshot) -> Result<()>;
}
