//! # framewire
//!
//! Length-delimited packet framing and session management core for TCP
//! services.
//!
//! The crate turns a raw byte-oriented transport stream into discrete
//! `(command id, payload)` messages, routes each message to a registered
//! handler, and manages the lifecycle of many concurrent connections. One
//! malformed or misbehaving connection never affects the others.
//!
//! ## Wire Format
//! ```text
//! [Length(4, BE)] [CommandId(4, BE)] [Payload(Length)]
//! ```
//!
//! ## Architecture
//! - [`core`]: byte buffering and the framing contract
//! - [`session`]: per-connection hooks, dispatch loop, and the manager
//! - [`transport`]: TCP accept loop and client attach
//! - [`store`]: narrow interface to the external persistence collaborator
//! - [`log`]: injected logging collaborator
//!
//! ## Example
//! ```no_run
//! use std::sync::Arc;
//! use framewire::config::NetworkConfig;
//! use framewire::core::packet::Packet;
//! use framewire::error::Result;
//! use framewire::session::{HandlerRegistry, SessionHooks, SessionManager};
//! use framewire::transport;
//! use tokio::net::TcpListener;
//!
//! struct EchoSession;
//!
//! impl SessionHooks for EchoSession {
//!     fn initialize(&self, registry: &mut HandlerRegistry) -> Result<Option<Packet>> {
//!         registry.register(1, |payload| {
//!             Ok(Some(Packet::new(1, payload.to_vec())))
//!         });
//!         Ok(None)
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = NetworkConfig::default();
//!     let manager = SessionManager::new(config, |_id: u64| -> Arc<dyn SessionHooks> {
//!         Arc::new(EchoSession)
//!     });
//!     let listener = TcpListener::bind("127.0.0.1:9000").await?;
//!     transport::serve(listener, manager).await
//! }
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod log;
pub mod session;
pub mod store;
pub mod transport;

pub use config::NetworkConfig;
pub use core::buffer::ByteBuffer;
pub use core::packet::Packet;
pub use error::{ProtocolError, Result};
pub use session::{
    DefaultHooks, HandlerRegistry, SessionHandle, SessionHooks, SessionManager, SessionState,
};
