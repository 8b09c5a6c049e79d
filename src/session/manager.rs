//! # Session Manager
//!
//! Owner of the set of live sessions.
//!
//! Creates sessions on accept/connect, removes them on close, and exposes the
//! shared logging collaborator to every session it creates. The session map
//! sits behind one manager-scoped lock: insert and remove are rare relative
//! to per-session I/O, so contention stays low.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::NetworkConfig;
use crate::log::{Severity, SharedLogSink, TracingSink};
use crate::session::{reader, writer, SessionHandle, SessionHooks};

/// Builds the hooks object for each new session.
///
/// Any `Fn(u64) -> Arc<dyn SessionHooks>` works; the argument is the id the
/// new session was assigned.
pub trait SessionFactory: Send + Sync + 'static {
    fn create(&self, session_id: u64) -> Arc<dyn SessionHooks>;
}

impl<F> SessionFactory for F
where
    F: Fn(u64) -> Arc<dyn SessionHooks> + Send + Sync + 'static,
{
    fn create(&self, session_id: u64) -> Arc<dyn SessionHooks> {
        self(session_id)
    }
}

/// Process-wide registry of live sessions.
pub struct SessionManager {
    config: NetworkConfig,
    factory: Box<dyn SessionFactory>,
    sessions: Mutex<HashMap<u64, SessionHandle>>,
    next_id: AtomicU64,
    sink: SharedLogSink,
}

impl SessionManager {
    /// Create a manager with the default `tracing`-backed log sink.
    pub fn new(config: NetworkConfig, factory: impl SessionFactory) -> Arc<Self> {
        Self::with_log_sink(config, factory, Arc::new(TracingSink))
    }

    /// Create a manager with an injected logging collaborator.
    pub fn with_log_sink(
        config: NetworkConfig,
        factory: impl SessionFactory,
        sink: SharedLogSink,
    ) -> Arc<Self> {
        Arc::new(Self {
            config,
            factory: Box::new(factory),
            sessions: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            sink,
        })
    }

    /// Adopt a newly established connection: allocate an id, construct the
    /// session's hooks, register the handle, and start its writer and read
    /// tasks. `initialize` runs in the read task before the first read.
    pub fn on_accept<S>(self: &Arc<Self>, stream: S) -> SessionHandle
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let hooks = self.factory.create(id);

        let (read_half, write_half) = tokio::io::split(stream);
        let (tx, rx) = mpsc::channel(self.config.frame.send_queue_capacity);
        let cancel = CancellationToken::new();
        let handle = SessionHandle::new(id, hooks.clone(), tx, cancel.clone());

        self.insert(handle.clone());
        self.log(Severity::Message, &format!("session {id} opened"));

        let writer_handle = handle.clone();
        let writer_manager = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(e) = writer::run_writer(write_half, rx, cancel).await {
                writer_manager.log(
                    Severity::Error,
                    &format!("session {}: write failed: {e}", writer_handle.id()),
                );
            }
            // A dead write half ends the whole session.
            writer_handle.close();
        });

        tokio::spawn(reader::run_session(
            read_half,
            handle.clone(),
            hooks,
            Arc::clone(self),
            self.config.frame.clone(),
        ));

        handle
    }

    /// Remove a session from the set and close it.
    ///
    /// Safe to call from the session's own error path and from an external
    /// shutdown request; the close-once guard inside the handle makes the
    /// underlying release happen exactly once.
    pub fn on_close(&self, session_id: u64) {
        let removed = self.lock_sessions().remove(&session_id);
        if let Some(handle) = removed {
            if handle.close() {
                self.log(Severity::Message, &format!("session {session_id} closed"));
            } else {
                debug!(session_id, "session already closing");
            }
        }
    }

    /// Look up a live session by id.
    pub fn get(&self, session_id: u64) -> Option<SessionHandle> {
        self.lock_sessions().get(&session_id).cloned()
    }

    /// Number of sessions currently registered.
    pub fn session_count(&self) -> usize {
        self.lock_sessions().len()
    }

    /// Close every live session. Used by graceful server shutdown.
    pub fn shutdown(&self) {
        let handles: Vec<SessionHandle> = self.lock_sessions().drain().map(|(_, h)| h).collect();
        let count = handles.len();
        for handle in handles {
            handle.close();
        }
        if count > 0 {
            self.log(Severity::Message, &format!("closed {count} sessions"));
        }
    }

    /// Forward to the injected logging collaborator. Never panics.
    pub fn log(&self, severity: Severity, message: &str) {
        self.sink.log(severity, message);
    }

    /// Configuration this manager hands to its sessions.
    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    fn lock_sessions(&self) -> std::sync::MutexGuard<'_, HashMap<u64, SessionHandle>> {
        // Session map operations must survive a poisoned lock; the map itself
        // is always left consistent by the short critical sections.
        self.sessions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn insert(&self, handle: SessionHandle) {
        self.lock_sessions().insert(handle.id(), handle);
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("sessions", &self.session_count())
            .finish()
    }
}
