//! # Persistence Collaborator
//!
//! Narrow interface to an external SQL-like store, consumed by sessions but
//! implemented elsewhere.
//!
//! ## Components
//! - **SqlStore**: the synchronous query/execute surface a backend provides
//! - **AsyncQuery**: single-flight asynchronous query path — at most one
//!   async query is in flight across the whole process; additional calls
//!   wait for the active one to complete, then run
//! - **Keep-alive**: background ping on a fixed interval, an operational
//!   detail of the collaborator's connections
//!
//! The single-flight guard is a capacity-one semaphore with asynchronous
//! wait semantics; callers queue on the permit rather than polling.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, instrument, warn};

use crate::error::{ProtocolError, Result};

/// Value bound to a named query parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Int(i64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
}

/// Named parameter pairs for one statement.
pub type SqlParams<'a> = &'a [(&'a str, SqlValue)];

/// Tabular result of a query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SqlResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<SqlValue>>,
}

impl SqlResult {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }
}

/// Surface a relational backend exposes to this crate.
///
/// `execute` and `query` are synchronous and may block; drive them through
/// [`AsyncQuery`] from async contexts.
pub trait SqlStore: Send + Sync + 'static {
    /// Run a statement that returns no rows.
    fn execute(&self, sql: &str, params: SqlParams<'_>) -> Result<()>;

    /// Run a statement and collect its rows.
    fn query(&self, sql: &str, params: SqlParams<'_>) -> Result<SqlResult>;

    /// Connection keep-alive probe.
    fn ping(&self) -> Result<()> {
        Ok(())
    }
}

/// Single-flight asynchronous query path over a [`SqlStore`].
///
/// The store's own connection is not safe for overlapped async queries, so
/// at most one runs at a time process-wide. Callers past the first wait on
/// the capacity-one semaphore, in order, without busy-polling.
pub struct AsyncQuery<S: SqlStore> {
    store: Arc<S>,
    permit: Arc<Semaphore>,
}

impl<S: SqlStore> AsyncQuery<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            permit: Arc::new(Semaphore::new(1)),
        }
    }

    /// Queue an asynchronous query; `callback` is invoked exactly once with
    /// the result when the query completes.
    ///
    /// Returns the spawned task handle so callers can await completion when
    /// they need to.
    #[instrument(skip_all)]
    pub fn query_async<F>(
        &self,
        callback: F,
        sql: impl Into<String>,
        params: Vec<(String, SqlValue)>,
    ) -> JoinHandle<()>
    where
        F: FnOnce(Result<SqlResult>) + Send + 'static,
    {
        let store = Arc::clone(&self.store);
        let permit = Arc::clone(&self.permit);
        let sql = sql.into();

        tokio::spawn(async move {
            // Waits here until the active query (if any) completes.
            let _guard = match permit.acquire().await {
                Ok(guard) => guard,
                Err(_) => {
                    callback(Err(ProtocolError::StoreError(
                        "query gate closed".to_string(),
                    )));
                    return;
                }
            };

            debug!(sql = %sql, "async query started");
            let result = tokio::task::spawn_blocking(move || {
                let borrowed: Vec<(&str, SqlValue)> = params
                    .iter()
                    .map(|(name, value)| (name.as_str(), value.clone()))
                    .collect();
                store.query(&sql, &borrowed)
            })
            .await
            .unwrap_or_else(|e| Err(ProtocolError::StoreError(format!("query task failed: {e}"))));

            if let Err(ref e) = result {
                error!(error = %e, "async query failed");
            }
            callback(result);
        })
    }

    /// The wrapped store, for synchronous `execute`/`query` calls.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }
}

/// Spawn the collaborator's keep-alive loop: ping every `interval` until the
/// token is cancelled.
pub fn spawn_keepalive<S: SqlStore>(
    store: Arc<S>,
    interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // The immediate first tick doubles as a startup probe.
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    if let Err(e) = store.ping() {
                        warn!(error = %e, "keep-alive ping failed");
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// In-memory store that records call order and can simulate slowness.
    struct RecordingStore {
        calls: Mutex<Vec<String>>,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        delay: Duration,
    }

    impl RecordingStore {
        fn new(delay: Duration) -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
                delay,
            }
        }
    }

    impl SqlStore for RecordingStore {
        fn execute(&self, sql: &str, _params: SqlParams<'_>) -> Result<()> {
            self.calls.lock().unwrap().push(sql.to_string());
            Ok(())
        }

        fn query(&self, sql: &str, _params: SqlParams<'_>) -> Result<SqlResult> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(self.delay);
            self.calls.lock().unwrap().push(sql.to_string());
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            Ok(SqlResult {
                columns: vec!["value".to_string()],
                rows: vec![vec![SqlValue::Text(sql.to_string())]],
            })
        }
    }

    #[test]
    fn result_counts_follow_shape() {
        let result = SqlResult {
            columns: vec!["a".into(), "b".into()],
            rows: vec![
                vec![SqlValue::Int(1), SqlValue::Null],
                vec![SqlValue::Int(2), SqlValue::Text("x".into())],
            ],
        };
        assert_eq!(result.row_count(), 2);
        assert_eq!(result.column_count(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn at_most_one_query_in_flight() {
        let store = Arc::new(RecordingStore::new(Duration::from_millis(20)));
        let gate = AsyncQuery::new(Arc::clone(&store));

        let mut tasks = Vec::new();
        for i in 0..4 {
            tasks.push(gate.query_async(|_| {}, format!("SELECT {i}"), Vec::new()));
        }
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(store.max_in_flight.load(Ordering::SeqCst), 1);
        assert_eq!(store.calls.lock().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn callback_fires_exactly_once_with_rows() {
        let store = Arc::new(RecordingStore::new(Duration::ZERO));
        let gate = AsyncQuery::new(store);

        let fired = Arc::new(AtomicUsize::new(0));
        let fired_in_cb = Arc::clone(&fired);
        let task = gate.query_async(
            move |result| {
                let result = result.unwrap();
                assert_eq!(result.row_count(), 1);
                assert_eq!(result.column_count(), 1);
                fired_in_cb.fetch_add(1, Ordering::SeqCst);
            },
            "SELECT 1",
            Vec::new(),
        );

        task.await.unwrap();
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn keepalive_stops_on_cancel() {
        let store = Arc::new(RecordingStore::new(Duration::ZERO));
        let cancel = CancellationToken::new();
        let task = spawn_keepalive(Arc::clone(&store), Duration::from_millis(5), cancel.clone());

        tokio::time::sleep(Duration::from_millis(20)).await;
        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("keepalive should stop on cancel")
            .unwrap();
    }
}
