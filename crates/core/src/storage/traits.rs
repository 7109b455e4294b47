use async_trait::async_trait;
use uuid::Uuid;

use super::{Filter, Row, StorageResult};

/// Minimal storage client contract the repositories are written against.
///
/// Reads outside a transaction go through [`StorageClient::select`]; every
/// mutation goes through a [`StorageTransaction`].
#[async_trait]
pub trait StorageClient: Send + Sync + 'static {
    type Transaction: StorageTransaction;

    /// Reads the rows of `table` that satisfy `filter`.
    async fn select(&self, table: &str, filter: &Filter) -> StorageResult<Vec<Row>>;

    /// Opens a unit of work.
    async fn transaction(&self) -> StorageResult<Self::Transaction>;
}

/// A unit of work against the storage backend.
///
/// Writes become visible to other readers only after [`commit`]. Dropping a
/// transaction without committing discards its writes.
///
/// [`commit`]: StorageTransaction::commit
#[async_trait]
pub trait StorageTransaction: Send + Sized {
    fn id(&self) -> Uuid;

    /// Reads rows, including writes staged earlier in this transaction.
    async fn select(&mut self, table: &str, filter: &Filter) -> StorageResult<Vec<Row>>;

    /// Inserts a row and returns it as stored. The backend assigns `id` when
    /// the row has none.
    async fn insert(&mut self, table: &str, row: Row) -> StorageResult<Row>;

    /// Replaces the row with the given id. `None` if no such row exists.
    async fn update(&mut self, table: &str, id: Uuid, row: Row) -> StorageResult<Option<Row>>;

    /// Deletes a row. Returns false if no row had that id.
    async fn delete(&mut self, table: &str, id: Uuid) -> StorageResult<bool>;

    async fn commit(self) -> StorageResult<()>;

    async fn rollback(self) -> StorageResult<()>;
}
