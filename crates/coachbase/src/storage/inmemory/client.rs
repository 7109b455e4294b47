//! In-memory storage client and transaction.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;
use uuid::Uuid;

use coachbase_core::storage::{
    row_id, Filter, Row, StorageClient, StorageError, StorageErrorKind, StorageResult,
    StorageTransaction,
};

use super::faults::{FaultPlan, StorageOp};

type Tables = HashMap<String, Vec<Row>>;

#[derive(Debug, Clone)]
enum StagedWrite {
    Insert { table: String, row: Row },
    Update { table: String, id: Uuid, row: Row },
    Delete { table: String, id: Uuid },
}

impl StagedWrite {
    fn table(&self) -> &str {
        match self {
            StagedWrite::Insert { table, .. }
            | StagedWrite::Update { table, .. }
            | StagedWrite::Delete { table, .. } => table,
        }
    }
}

fn conflict(message: String) -> StorageError {
    StorageError::new(StorageErrorKind::Conflict, message)
}

fn position_of(rows: &[Row], id: Uuid) -> Option<usize> {
    rows.iter().position(|row| row_id(row) == Some(id))
}

fn apply(tables: &mut Tables, write: &StagedWrite) -> StorageResult<()> {
    match write {
        StagedWrite::Insert { table, row } => {
            let rows = tables.entry(table.clone()).or_default();
            if let Some(id) = row_id(row) {
                if position_of(rows, id).is_some() {
                    return Err(conflict(format!("duplicate id {} in {}", id, table)));
                }
            }
            rows.push(row.clone());
        }
        StagedWrite::Update { table, id, row } => {
            let position = tables
                .get(table)
                .and_then(|rows| position_of(rows, *id))
                .ok_or_else(|| conflict(format!("row {} vanished from {}", id, table)))?;
            if let Some(rows) = tables.get_mut(table) {
                rows[position] = row.clone();
            }
        }
        StagedWrite::Delete { table, id } => {
            let position = tables
                .get(table)
                .and_then(|rows| position_of(rows, *id))
                .ok_or_else(|| conflict(format!("row {} vanished from {}", id, table)))?;
            if let Some(rows) = tables.get_mut(table) {
                rows.remove(position);
            }
        }
    }
    Ok(())
}

/// In-memory storage backend for testing.
///
/// Clones share the same tables and fault plan. Data is lost when the last
/// clone is dropped.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStorage {
    tables: Arc<RwLock<Tables>>,
    faults: Arc<Mutex<FaultPlan>>,
}

impl InMemoryStorage {
    /// Creates a new empty storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `times` calls of `op`, on any table, fail with `kind`.
    pub fn fail_next(&self, op: StorageOp, kind: StorageErrorKind, times: u32) {
        if let Ok(mut plan) = self.faults.lock() {
            plan.schedule(op, None, kind, times);
        }
    }

    /// Like [`InMemoryStorage::fail_next`], restricted to one table.
    pub fn fail_next_on(&self, op: StorageOp, table: &str, kind: StorageErrorKind, times: u32) {
        if let Ok(mut plan) = self.faults.lock() {
            plan.schedule(op, Some(table.to_string()), kind, times);
        }
    }

    /// Drops every fault that has not fired yet.
    pub fn clear_faults(&self) {
        if let Ok(mut plan) = self.faults.lock() {
            plan.clear();
        }
    }

    /// How many times `op` has been attempted, failed attempts included.
    pub fn call_count(&self, op: StorageOp) -> u32 {
        self.faults.lock().map(|plan| plan.calls(op)).unwrap_or(0)
    }

    /// Committed rows of `table`, in insertion order.
    pub async fn rows(&self, table: &str) -> Vec<Row> {
        self.tables
            .read()
            .await
            .get(table)
            .cloned()
            .unwrap_or_default()
    }

    fn check(&self, op: StorageOp, table: Option<&str>) -> StorageResult<()> {
        let mut plan = self
            .faults
            .lock()
            .map_err(|_| StorageError::new(StorageErrorKind::Other, "fault plan lock poisoned"))?;
        plan.check(op, table)
    }
}

#[async_trait]
impl StorageClient for InMemoryStorage {
    type Transaction = InMemoryTransaction;

    async fn select(&self, table: &str, filter: &Filter) -> StorageResult<Vec<Row>> {
        self.check(StorageOp::Select, Some(table))?;
        let tables = self.tables.read().await;
        Ok(tables
            .get(table)
            .map(|rows| rows.iter().filter(|row| filter.matches(row)).cloned().collect())
            .unwrap_or_default())
    }

    async fn transaction(&self) -> StorageResult<InMemoryTransaction> {
        self.check(StorageOp::Begin, None)?;
        Ok(InMemoryTransaction {
            id: Uuid::new_v4(),
            storage: self.clone(),
            staged: Vec::new(),
        })
    }
}

/// A unit of work against [`InMemoryStorage`].
///
/// Writes are staged and only become visible to other readers on commit.
/// Reads inside the transaction see its own staged writes.
#[derive(Debug)]
pub struct InMemoryTransaction {
    id: Uuid,
    storage: InMemoryStorage,
    staged: Vec<StagedWrite>,
}

impl InMemoryTransaction {
    /// Rows of `table` as this transaction sees them.
    async fn view(&self, table: &str) -> Vec<Row> {
        let mut tables = Tables::new();
        tables.insert(table.to_string(), self.storage.rows(table).await);
        for write in self.staged.iter().filter(|write| write.table() == table) {
            // Staged writes were checked against this view when recorded.
            let _ = apply(&mut tables, write);
        }
        tables.remove(table).unwrap_or_default()
    }

    async fn contains(&self, table: &str, id: Uuid) -> bool {
        position_of(&self.view(table).await, id).is_some()
    }
}

#[async_trait]
impl StorageTransaction for InMemoryTransaction {
    fn id(&self) -> Uuid {
        self.id
    }

    async fn select(&mut self, table: &str, filter: &Filter) -> StorageResult<Vec<Row>> {
        self.storage.check(StorageOp::Select, Some(table))?;
        Ok(self
            .view(table)
            .await
            .into_iter()
            .filter(|row| filter.matches(row))
            .collect())
    }

    async fn insert(&mut self, table: &str, mut row: Row) -> StorageResult<Row> {
        self.storage.check(StorageOp::Insert, Some(table))?;

        match row_id(&row) {
            Some(id) if self.contains(table, id).await => {
                return Err(conflict(format!("duplicate id {} in {}", id, table)));
            }
            Some(_) => {}
            None => {
                row.insert("id".to_string(), Value::String(Uuid::new_v4().to_string()));
            }
        }

        self.staged.push(StagedWrite::Insert {
            table: table.to_string(),
            row: row.clone(),
        });
        Ok(row)
    }

    async fn update(&mut self, table: &str, id: Uuid, mut row: Row) -> StorageResult<Option<Row>> {
        self.storage.check(StorageOp::Update, Some(table))?;

        if !self.contains(table, id).await {
            return Ok(None);
        }

        row.insert("id".to_string(), Value::String(id.to_string()));
        self.staged.push(StagedWrite::Update {
            table: table.to_string(),
            id,
            row: row.clone(),
        });
        Ok(Some(row))
    }

    async fn delete(&mut self, table: &str, id: Uuid) -> StorageResult<bool> {
        self.storage.check(StorageOp::Delete, Some(table))?;

        if !self.contains(table, id).await {
            return Ok(false);
        }

        self.staged.push(StagedWrite::Delete {
            table: table.to_string(),
            id,
        });
        Ok(true)
    }

    async fn commit(self) -> StorageResult<()> {
        self.storage.check(StorageOp::Commit, None)?;

        let mut tables = self.storage.tables.write().await;
        let mut next = tables.clone();
        for write in &self.staged {
            apply(&mut next, write)?;
        }
        *tables = next;

        tracing::trace!(transaction = %self.id, writes = self.staged.len(), "Committed in-memory transaction");
        Ok(())
    }

    async fn rollback(self) -> StorageResult<()> {
        self.storage.check(StorageOp::Rollback, None)?;
        tracing::trace!(transaction = %self.id, discarded = self.staged.len(), "Rolled back in-memory transaction");
        Ok(())
    }
}
