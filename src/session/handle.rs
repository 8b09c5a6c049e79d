//! # Session Handle
//!
//! Clonable handle to one live session.
//!
//! Sends may be issued from any task — the session's own dispatch loop or an
//! external broadcaster. Every send funnels through the session's outbound
//! queue, whose single consumer writes whole frames to the transport, so
//! frames from concurrent senders never interleave on the wire.
//!
//! Closing is idempotent: the first `close()` wins the state transition and
//! fires the cancellation token; later calls are no-ops. Cancellation
//! unblocks the session's pending read, and the read task releases the
//! underlying connection exactly once on exit.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::core::packet::Packet;
use crate::error::{ProtocolError, Result};
use crate::session::{SessionHooks, SessionState};

const STATE_OPEN: u8 = 0;
const STATE_CLOSING: u8 = 1;
const STATE_CLOSED: u8 = 2;

struct HandleInner {
    id: u64,
    hooks: Arc<dyn SessionHooks>,
    outbound: mpsc::Sender<Bytes>,
    cancel: CancellationToken,
    state: AtomicU8,
}

/// Handle for sending to and closing one session from any task.
#[derive(Clone)]
pub struct SessionHandle {
    inner: Arc<HandleInner>,
}

impl SessionHandle {
    pub(crate) fn new(
        id: u64,
        hooks: Arc<dyn SessionHooks>,
        outbound: mpsc::Sender<Bytes>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            inner: Arc::new(HandleInner {
                id,
                hooks,
                outbound,
                cancel,
                state: AtomicU8::new(STATE_OPEN),
            }),
        }
    }

    /// Unique id assigned by the session manager.
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        match self.inner.state.load(Ordering::Acquire) {
            STATE_OPEN => SessionState::Open,
            STATE_CLOSING => SessionState::Closing,
            _ => SessionState::Closed,
        }
    }

    pub fn is_open(&self) -> bool {
        self.state() == SessionState::Open
    }

    /// Serialize a packet via `before_send` and queue it for transmission.
    ///
    /// Waits for queue capacity. The queued frame is written whole by the
    /// session's writer task.
    pub async fn send_packet(&self, packet: Packet) -> Result<()> {
        if !self.is_open() {
            return Err(ProtocolError::ConnectionClosed);
        }
        let bytes = self.inner.hooks.before_send(&packet)?;
        self.inner
            .outbound
            .send(bytes)
            .await
            .map_err(|_| ProtocolError::ConnectionClosed)
    }

    /// Non-blocking variant of [`send_packet`](Self::send_packet); fails with
    /// [`ProtocolError::SendQueueFull`] instead of waiting.
    pub fn try_send_packet(&self, packet: Packet) -> Result<()> {
        if !self.is_open() {
            return Err(ProtocolError::ConnectionClosed);
        }
        let bytes = self.inner.hooks.before_send(&packet)?;
        self.inner.outbound.try_send(bytes).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => ProtocolError::SendQueueFull,
            mpsc::error::TrySendError::Closed(_) => ProtocolError::ConnectionClosed,
        })
    }

    /// Begin closing the session. Idempotent; returns `true` only for the
    /// call that performed the transition out of `Open`.
    ///
    /// Safe to invoke concurrently from the session's own failure path and
    /// from the manager's shutdown path: both converge here, and only the
    /// winner fires the cancellation that releases the connection.
    pub fn close(&self) -> bool {
        let won = self
            .inner
            .state
            .compare_exchange(
                STATE_OPEN,
                STATE_CLOSING,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok();
        if won {
            self.inner.cancel.cancel();
        }
        won
    }

    /// Wait until the session has been cancelled.
    pub async fn closed(&self) {
        self.inner.cancel.cancelled().await;
    }

    pub(crate) fn cancellation(&self) -> CancellationToken {
        self.inner.cancel.clone()
    }

    /// Terminal transition, set by the read task once the transport half is
    /// released.
    pub(crate) fn mark_closed(&self) {
        self.inner.state.store(STATE_CLOSED, Ordering::Release);
    }
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle")
            .field("id", &self.id())
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::DefaultHooks;

    fn test_handle(capacity: usize) -> (SessionHandle, mpsc::Receiver<Bytes>) {
        let (tx, rx) = mpsc::channel(capacity);
        let handle = SessionHandle::new(7, Arc::new(DefaultHooks), tx, CancellationToken::new());
        (handle, rx)
    }

    #[tokio::test]
    async fn send_packet_queues_packed_frame() {
        let (handle, mut rx) = test_handle(4);
        handle.send_packet(Packet::new(1, &b"hi"[..])).await.unwrap();

        let frame = rx.recv().await.unwrap();
        assert_eq!(&frame[..], Packet::new(1, &b"hi"[..]).pack().unwrap());
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let (handle, _rx) = test_handle(1);
        assert_eq!(handle.state(), SessionState::Open);

        assert!(handle.close());
        assert_eq!(handle.state(), SessionState::Closing);

        // Second close performs nothing and does not panic.
        assert!(!handle.close());
        let clone = handle.clone();
        assert!(!clone.close());
    }

    #[tokio::test]
    async fn sends_after_close_are_rejected() {
        let (handle, _rx) = test_handle(1);
        handle.close();

        let err = handle
            .send_packet(Packet::new(1, Bytes::new()))
            .await
            .unwrap_err();
        assert!(matches!(err, ProtocolError::ConnectionClosed));
    }

    #[tokio::test]
    async fn try_send_reports_full_queue() {
        let (handle, _rx) = test_handle(1);
        handle.try_send_packet(Packet::new(1, Bytes::new())).unwrap();

        let err = handle
            .try_send_packet(Packet::new(2, Bytes::new()))
            .unwrap_err();
        assert!(matches!(err, ProtocolError::SendQueueFull));
    }
}
