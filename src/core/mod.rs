//! # Core Framing Components
//!
//! Low-level byte buffering and packet framing.
//!
//! This module provides the foundation for the session layer: an arena-style
//! receive buffer and the header/payload wire contract.
//!
//! ## Components
//! - **ByteBuffer**: growable byte container with independent read cursor and
//!   write length; survives across read events without per-frame reallocation
//! - **Packet**: the `(command id, payload)` envelope, its wire encoding, and
//!   the extraction loop that pulls complete frames out of a receive buffer
//!
//! ## Wire Format
//! ```text
//! [Length(4, BE)] [CommandId(4, BE)] [Payload(Length)]
//! ```
//! `Length` counts the payload only; the 8-byte header is excluded.
//!
//! ## Security
//! - Declared lengths are validated before any payload allocation
//! - Negative or oversized lengths reject the frame without consuming it

pub mod buffer;
pub mod packet;
