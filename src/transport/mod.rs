//! # Transport Layer
//!
//! TCP accept loop and client-side attach.
//!
//! This layer owns nothing but sockets: every established connection is
//! handed to the [`SessionManager`](crate::session::SessionManager), which
//! runs the session lifecycle from there. No transport-layer encryption; the
//! wire carries raw frames.

pub mod tcp;

pub use tcp::{connect, serve, serve_with_shutdown};
