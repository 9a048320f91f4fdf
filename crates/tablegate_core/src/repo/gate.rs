//! One-time schema introspection barrier.
//!
//! # Responsibility
//! - Load the table schema exactly once per repository instance.
//! - Let every repository operation await that load before doing work.
//!
//! # Invariants
//! - The settled outcome (ready or failed) never changes.
//! - Concurrent waiters share one in-flight introspection.
//! - A failed outcome is re-surfaced as-is; introspection is not retried.

use crate::db::Store;
use crate::model::schema::TableSchema;
use crate::repo::table_repo::{RepoError, RepoResult};
use log::{error, info};
use std::sync::Arc;
use std::time::Instant;
use tokio::runtime::Handle;
use tokio::sync::OnceCell;
use tokio::task::AbortHandle;

/// Observable lifecycle state of a repository's readiness gate.
#[derive(Debug, Clone)]
pub enum Readiness {
    Pending,
    Ready(Arc<TableSchema>),
    Failed(RepoError),
}

impl Readiness {
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

pub(crate) struct ReadinessGate {
    inner: Arc<GateInner>,
    eager: Option<AbortHandle>,
}

struct GateInner {
    table: String,
    store: Option<Arc<dyn Store>>,
    outcome: OnceCell<RepoResult<Arc<TableSchema>>>,
}

impl ReadinessGate {
    /// Creates the gate and starts introspection when possible.
    ///
    /// Without a store the gate settles to failed immediately. Inside a
    /// Tokio runtime introspection starts on a spawned task; otherwise the
    /// first waiter drives it. The spawned task is aborted when the gate is
    /// dropped, releasing its hold on the store.
    pub(crate) fn open(store: Option<Arc<dyn Store>>, table: String) -> Self {
        let inner = Arc::new(GateInner {
            table,
            store,
            outcome: OnceCell::new(),
        });

        let mut eager = None;
        if inner.store.is_none() {
            error!(
                "event=schema_load module=repo status=error table={} error_code=no_store",
                inner.table
            );
            let _ = inner.outcome.set(Err(no_store_error()));
        } else if let Ok(handle) = Handle::try_current() {
            let task = Arc::clone(&inner);
            let join = handle.spawn(async move {
                let _ = task.settle().await;
            });
            eager = Some(join.abort_handle());
        }

        Self { inner, eager }
    }

    /// Waits for the gate to settle and returns the loaded schema.
    pub(crate) async fn wait(&self) -> RepoResult<Arc<TableSchema>> {
        self.inner.settle().await.clone()
    }

    pub(crate) fn state(&self) -> Readiness {
        match self.inner.outcome.get() {
            None => Readiness::Pending,
            Some(Ok(schema)) => Readiness::Ready(Arc::clone(schema)),
            Some(Err(err)) => Readiness::Failed(err.clone()),
        }
    }
}

impl Drop for ReadinessGate {
    fn drop(&mut self) {
        if let Some(eager) = self.eager.take() {
            eager.abort();
        }
    }
}

impl GateInner {
    async fn settle(&self) -> &RepoResult<Arc<TableSchema>> {
        self.outcome.get_or_init(|| self.introspect()).await
    }

    async fn introspect(&self) -> RepoResult<Arc<TableSchema>> {
        let Some(store) = self.store.as_ref() else {
            return Err(no_store_error());
        };

        let started_at = Instant::now();
        info!(
            "event=schema_load module=repo status=start table={}",
            self.table
        );

        let outcome = match store.column_info(&self.table).await {
            Ok(schema) if schema.is_empty() => Err(RepoError::Schema(format!(
                "no schema found for table {}",
                self.table
            ))),
            Ok(schema) => Ok(Arc::new(schema)),
            Err(err) => Err(RepoError::from(err)),
        };

        match &outcome {
            Ok(schema) => info!(
                "event=schema_load module=repo status=ok table={} columns={} duration_ms={}",
                self.table,
                schema.len(),
                started_at.elapsed().as_millis()
            ),
            Err(err) => error!(
                "event=schema_load module=repo status=error table={} duration_ms={} error={}",
                self.table,
                started_at.elapsed().as_millis(),
                err
            ),
        }

        outcome
    }
}

fn no_store_error() -> RepoError {
    RepoError::Configuration("no data store provided".to_string())
}
