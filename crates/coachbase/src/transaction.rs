//! Transaction coordination for repository writes.
//!
//! [`TransactionCoordinator::with_transaction`] runs a unit of work inside a
//! fresh storage transaction per attempt, retries transient failures, rolls
//! back on any error and, only once a commit has succeeded, publishes the
//! collected domain events and invalidates the changed entities' caches.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use uuid::Uuid;

use coachbase_core::cache::{CacheInvalidator, ChangedEntity};
use coachbase_core::event::{DomainEvent, EventSink};
use coachbase_core::retry::RetryPolicy;
use coachbase_core::storage::{
    Filter, RepositoryError, Result, Row, StorageClient, StorageError, StorageErrorKind,
    StorageTransaction,
};

use crate::retry::RetryExecutor;

/// Boxed future returned by a unit of work. Borrows the transaction handle.
pub type TxFuture<'t, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 't>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    Open,
    Committed,
    RolledBack,
}

impl fmt::Display for TransactionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransactionState::Open => "open",
            TransactionState::Committed => "committed",
            TransactionState::RolledBack => "rolled back",
        };
        f.write_str(name)
    }
}

/// Handle to one storage transaction.
///
/// The terminal state is set exactly once; every call after that fails
/// with [`RepositoryError::Transaction`].
pub struct Transaction<T: StorageTransaction> {
    id: Uuid,
    state: TransactionState,
    inner: Option<T>,
}

impl<T: StorageTransaction> Transaction<T> {
    fn new(inner: T) -> Self {
        Self {
            id: inner.id(),
            state: TransactionState::Open,
            inner: Some(inner),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> TransactionState {
        self.state
    }

    fn closed(&self, operation: &'static str) -> RepositoryError {
        RepositoryError::Transaction {
            operation,
            message: format!("transaction {} is {}", self.id, self.state),
        }
    }

    fn open(&mut self, operation: &'static str) -> Result<&mut T> {
        if self.state != TransactionState::Open || self.inner.is_none() {
            return Err(self.closed(operation));
        }
        self.inner.as_mut().ok_or(RepositoryError::Transaction {
            operation,
            message: "transaction handle is empty".to_string(),
        })
    }

    fn take(&mut self, operation: &'static str) -> Result<T> {
        if self.state != TransactionState::Open || self.inner.is_none() {
            return Err(self.closed(operation));
        }
        self.inner.take().ok_or(RepositoryError::Transaction {
            operation,
            message: "transaction handle is empty".to_string(),
        })
    }

    pub async fn select(&mut self, table: &str, filter: &Filter) -> Result<Vec<Row>> {
        Ok(self.open("select")?.select(table, filter).await?)
    }

    /// Inserts a row and returns it as stored, id included.
    pub async fn insert(&mut self, table: &str, row: Row) -> Result<Row> {
        Ok(self.open("insert")?.insert(table, row).await?)
    }

    pub async fn update(&mut self, table: &str, id: Uuid, row: Row) -> Result<Option<Row>> {
        Ok(self.open("update")?.update(table, id, row).await?)
    }

    pub async fn delete(&mut self, table: &str, id: Uuid) -> Result<bool> {
        Ok(self.open("delete")?.delete(table, id).await?)
    }

    /// Commits. A failed commit leaves the transaction rolled back.
    pub async fn commit(&mut self) -> Result<()> {
        let inner = self.take("commit")?;
        match inner.commit().await {
            Ok(()) => {
                self.state = TransactionState::Committed;
                Ok(())
            }
            Err(err) => {
                self.state = TransactionState::RolledBack;
                Err(err.into())
            }
        }
    }

    pub async fn rollback(&mut self) -> Result<()> {
        let inner = self.take("rollback")?;
        self.state = TransactionState::RolledBack;
        Ok(inner.rollback().await?)
    }
}

impl<T: StorageTransaction> Drop for Transaction<T> {
    fn drop(&mut self) {
        if self.state == TransactionState::Open && self.inner.is_some() {
            tracing::warn!(transaction = %self.id, "Transaction dropped while open, staged writes discarded");
        }
    }
}

/// Names a write for diagnostics and error settlement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransactionOptions {
    pub entity_type: &'static str,
    pub operation: &'static str,
}

impl TransactionOptions {
    pub fn new(entity_type: &'static str, operation: &'static str) -> Self {
        Self {
            entity_type,
            operation,
        }
    }
}

/// What a unit of work returns: the caller's result plus the side effects
/// to release once the transaction has committed.
#[derive(Debug, Clone)]
pub struct UnitOfWork<T> {
    pub result: T,
    pub events: Vec<DomainEvent>,
    pub changes: Vec<ChangedEntity>,
}

impl<T> UnitOfWork<T> {
    pub fn new(result: T) -> Self {
        Self {
            result,
            events: Vec::new(),
            changes: Vec::new(),
        }
    }

    pub fn with_events(mut self, events: impl IntoIterator<Item = DomainEvent>) -> Self {
        self.events.extend(events);
        self
    }

    pub fn with_change(mut self, change: ChangedEntity) -> Self {
        self.changes.push(change);
        self
    }
}

#[derive(Debug, Default)]
struct HookCounters {
    commits: AtomicU64,
    rollbacks: AtomicU64,
    events_published: AtomicU64,
    publish_failures: AtomicU64,
    invalidations: AtomicU64,
    invalidation_failures: AtomicU64,
}

/// Point-in-time copy of the coordinator counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TransactionMetrics {
    pub commits: u64,
    pub rollbacks: u64,
    pub events_published: u64,
    pub publish_failures: u64,
    pub invalidations: u64,
    pub invalidation_failures: u64,
}

/// Runs units of work against a storage client and releases their side
/// effects after commit.
pub struct TransactionCoordinator<S: StorageClient> {
    storage: Arc<S>,
    retry: RetryExecutor,
    events: Arc<dyn EventSink>,
    invalidator: Arc<dyn CacheInvalidator>,
    timeout: Option<Duration>,
    counters: HookCounters,
}

impl<S: StorageClient> TransactionCoordinator<S> {
    pub fn new(
        storage: Arc<S>,
        events: Arc<dyn EventSink>,
        invalidator: Arc<dyn CacheInvalidator>,
    ) -> Self {
        Self {
            storage,
            retry: RetryExecutor::default(),
            events,
            invalidator,
            timeout: None,
            counters: HookCounters::default(),
        }
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry = RetryExecutor::new(policy);
        self
    }

    /// Bounds each attempt. An attempt that overruns is rolled back and
    /// retried like a storage timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn storage(&self) -> &Arc<S> {
        &self.storage
    }

    pub fn retry(&self) -> &RetryExecutor {
        &self.retry
    }

    pub fn metrics(&self) -> TransactionMetrics {
        let c = &self.counters;
        TransactionMetrics {
            commits: c.commits.load(Ordering::Relaxed),
            rollbacks: c.rollbacks.load(Ordering::Relaxed),
            events_published: c.events_published.load(Ordering::Relaxed),
            publish_failures: c.publish_failures.load(Ordering::Relaxed),
            invalidations: c.invalidations.load(Ordering::Relaxed),
            invalidation_failures: c.invalidation_failures.load(Ordering::Relaxed),
        }
    }

    /// Opens a transaction without retry or hooks.
    pub async fn begin(&self) -> Result<Transaction<S::Transaction>> {
        let inner = self.storage.transaction().await?;
        let tx = Transaction::new(inner);
        tracing::trace!(transaction = %tx.id(), "Began transaction");
        Ok(tx)
    }

    /// Runs `work` inside a transaction and returns its result after commit.
    ///
    /// Each attempt gets a fresh transaction, so a retried attempt never
    /// sees writes staged by a failed one. Post-commit hook failures are
    /// logged and counted, never returned.
    pub async fn with_transaction<T, F>(&self, options: TransactionOptions, work: F) -> Result<T>
    where
        T: Send,
        F: for<'t> Fn(&'t mut Transaction<S::Transaction>) -> TxFuture<'t, UnitOfWork<T>>
            + Send
            + Sync,
    {
        let work = &work;
        let unit = self
            .retry
            .run(options.operation, move |attempt| {
                self.attempt(options, work, attempt)
            })
            .await
            .map_err(|failure| failure.settle(options.entity_type, options.operation))?;

        self.release_side_effects(options, unit.events, &unit.changes)
            .await;

        Ok(unit.result)
    }

    async fn attempt<T, F>(
        &self,
        options: TransactionOptions,
        work: &F,
        attempt: u32,
    ) -> Result<UnitOfWork<T>>
    where
        F: for<'t> Fn(&'t mut Transaction<S::Transaction>) -> TxFuture<'t, UnitOfWork<T>> + Sync,
    {
        let mut tx = self.begin().await?;

        let outcome = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, work(&mut tx))
                .await
                .unwrap_or_else(|_| {
                    Err(RepositoryError::Storage(StorageError::new(
                        StorageErrorKind::Timeout,
                        format!("{} exceeded {:?}", options.operation, limit),
                    )))
                }),
            None => work(&mut tx).await,
        };

        match outcome {
            Ok(unit) => match tx.commit().await {
                Ok(()) => {
                    self.counters.commits.fetch_add(1, Ordering::Relaxed);
                    tracing::debug!(
                        transaction = %tx.id(),
                        entity_type = options.entity_type,
                        operation = options.operation,
                        attempt,
                        "Committed transaction"
                    );
                    Ok(unit)
                }
                Err(err) => {
                    self.counters.rollbacks.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(
                        transaction = %tx.id(),
                        operation = options.operation,
                        attempt,
                        error = %err,
                        "Commit failed"
                    );
                    Err(err)
                }
            },
            Err(err) => {
                if let Err(rollback_err) = tx.rollback().await {
                    tracing::error!(
                        transaction = %tx.id(),
                        operation = options.operation,
                        error = %rollback_err,
                        "Rollback failed"
                    );
                }
                self.counters.rollbacks.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(
                    transaction = %tx.id(),
                    operation = options.operation,
                    attempt,
                    error = %err,
                    "Rolled back transaction"
                );
                Err(err)
            }
        }
    }

    async fn release_side_effects(
        &self,
        options: TransactionOptions,
        events: Vec<DomainEvent>,
        changes: &[ChangedEntity],
    ) {
        for event in events {
            let event_id = event.id;
            let event_type = event.event_type.clone();
            match self.events.publish(event).await {
                Ok(()) => {
                    self.counters.events_published.fetch_add(1, Ordering::Relaxed);
                }
                Err(err) => {
                    self.counters.publish_failures.fetch_add(1, Ordering::Relaxed);
                    tracing::error!(
                        event_id = %event_id,
                        event_type = %event_type,
                        operation = options.operation,
                        error = %err,
                        "Failed to publish domain event after commit"
                    );
                }
            }
        }

        for change in changes {
            match self.invalidator.invalidate_changed(change).await {
                Ok(()) => {
                    self.counters.invalidations.fetch_add(1, Ordering::Relaxed);
                }
                Err(err) => {
                    self.counters
                        .invalidation_failures
                        .fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(
                        entity_type = change.entity_type,
                        entity_id = ?change.id,
                        operation = options.operation,
                        error = %err,
                        "Cache invalidation failed after commit"
                    );
                }
            }
        }
    }
}
