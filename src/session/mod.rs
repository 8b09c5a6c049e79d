//! # Session Layer
//!
//! Per-connection state, lifecycle hooks, and frame dispatch.
//!
//! A session binds one transport connection to a receive buffer, a handler
//! table, and a set of lifecycle hooks. One tokio task per session drives its
//! reads and the extraction/dispatch loop; a second task owns the write half
//! and drains a single-writer queue, so concurrent senders can never
//! interleave bytes on the wire.
//!
//! ## Components
//! - **SessionHooks**: strategy trait with the overridable lifecycle moments
//!   (`initialize`, `before_read`, `before_send`, `handle_unregistered`)
//! - **HandlerRegistry**: plain dispatch table from command id to handler
//! - **SessionHandle**: clonable handle for sending and closing from any task
//! - **SessionManager**: owns the set of live sessions
//!
//! ## Handler table discipline
//! All registrations happen inside `initialize`, strictly before the first
//! frame is consumed. The table is read-only afterwards; this ordering is a
//! documented precondition, not enforced by a lock.

pub mod handle;
pub mod manager;

mod reader;
mod writer;

use std::collections::HashMap;

use bytes::Bytes;
use tracing::warn;

use crate::core::buffer::ByteBuffer;
use crate::core::packet::Packet;
use crate::error::Result;

pub use handle::SessionHandle;
pub use manager::{SessionFactory, SessionManager};

/// Lifecycle state of a session. `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Open,
    Closing,
    Closed,
}

/// Handler invoked for frames matching its registered command id.
///
/// Returning `Ok(Some(packet))` has the session's own loop send the reply;
/// returning `Err` is contained at the dispatch site and leaves the session
/// open.
pub type Handler = Box<dyn Fn(&[u8]) -> Result<Option<Packet>> + Send + Sync>;

/// Dispatch table from command id to handler.
///
/// Populated during [`SessionHooks::initialize`] and treated as read-only
/// once the extraction loop starts consuming frames.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<i32, Handler>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a handler to a command id. Re-registration replaces the previous
    /// binding: last registration wins.
    pub fn register<F>(&mut self, command_id: i32, handler: F)
    where
        F: Fn(&[u8]) -> Result<Option<Packet>> + Send + Sync + 'static,
    {
        self.handlers.insert(command_id, Box::new(handler));
    }

    /// Look up the handler bound to a command id.
    pub fn get(&self, command_id: i32) -> Option<&Handler> {
        self.handlers.get(&command_id)
    }

    pub fn contains(&self, command_id: i32) -> bool {
        self.handlers.contains_key(&command_id)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

/// Overridable lifecycle moments of a session.
///
/// A concrete session variant is composed from a hooks object injected at
/// construction; every method has a default body, so implementors override
/// only the moments they care about.
pub trait SessionHooks: Send + Sync + 'static {
    /// Called exactly once, after the connection is established and before
    /// any received bytes are processed. Register handlers here; optionally
    /// return a greeting packet that is sent before the read loop starts.
    fn initialize(&self, registry: &mut HandlerRegistry) -> Result<Option<Packet>> {
        let _ = registry;
        Ok(None)
    }

    /// Called once per inbound read event. Default appends the raw bytes to
    /// the receive buffer.
    fn before_read(&self, raw: &[u8], recv: &mut ByteBuffer) {
        recv.write(raw);
    }

    /// Convert an outgoing packet to wire bytes. Override point for wrapping
    /// or tagging bytes before transmission.
    fn before_send(&self, packet: &Packet) -> Result<Bytes> {
        packet.pack()
    }

    /// Called for frames whose command id has no registered handler.
    /// Non-fatal; the loop continues either way.
    fn handle_unregistered(&self, command_id: i32, payload: &[u8]) -> Result<()> {
        warn!(
            command_id,
            payload_len = payload.len(),
            "no handler registered for command"
        );
        Ok(())
    }
}

/// Hooks implementation with every default behavior: append on read, plain
/// `pack()` on send, log-and-continue for unregistered commands.
#[derive(Debug, Default)]
pub struct DefaultHooks;

impl SessionHooks for DefaultHooks {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_registration_wins() {
        let mut registry = HandlerRegistry::new();
        registry.register(42, |_| Ok(Some(Packet::new(1, &b"old"[..]))));
        registry.register(42, |_| Ok(Some(Packet::new(2, &b"new"[..]))));

        assert_eq!(registry.len(), 1);
        let reply = registry.get(42).unwrap()(b"").unwrap().unwrap();
        assert_eq!(reply.command_id, 2);
    }

    #[test]
    fn lookup_misses_unbound_ids() {
        let mut registry = HandlerRegistry::new();
        registry.register(1, |_| Ok(None));

        assert!(registry.contains(1));
        assert!(registry.get(2).is_none());
    }

    #[test]
    fn default_hooks_append_on_read_and_pack_on_send() {
        let hooks = DefaultHooks;
        let mut recv = ByteBuffer::new();
        hooks.before_read(b"abc", &mut recv);
        assert_eq!(recv.unread(), b"abc");

        let packet = Packet::new(5, &b"xy"[..]);
        let wire = hooks.before_send(&packet).unwrap();
        assert_eq!(wire, packet.pack().unwrap());

        // Unregistered commands are non-fatal by default.
        assert!(hooks.handle_unregistered(99, b"data").is_ok());
    }
}
