mod memory;

pub use memory::MemorySaveStore;

use futures::future::BoxFuture;

use crate::dao::{models::SaveEntity, storage::StorageResult};

/// Abstraction over the persistence layer holding the save history.
pub trait SaveStore: Send + Sync {
    /// Append a save to the history.
    fn insert(&self, save: SaveEntity) -> BoxFuture<'static, StorageResult<()>>;
    /// Every save, most recent first.
    fn list(&self) -> BoxFuture<'static, StorageResult<Vec<SaveEntity>>>;
    /// Most recent save, if any.
    fn last(&self) -> BoxFuture<'static, StorageResult<Option<SaveEntity>>>;
    /// Probe the backing medium; in-memory stores are always healthy.
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
}
