//! # Packet Framing
//!
//! The header+payload wire contract and the frame extraction loop.
//!
//! A frame on the wire is `[length: i32 BE][command_id: i32 BE][payload]`,
//! where `length` counts the payload only. [`Packet::pack`] produces the full
//! frame for sending; [`peek_header`] inspects a receive buffer without
//! consuming it, which is what lets the extraction loop tolerate partial
//! arrivals; [`extract_frame`] consumes one complete frame at a time so a
//! bad header never costs the valid frames ahead of it; [`extract_frames`]
//! drains every complete frame and leaves trailing partial bytes buffered
//! for the next read event.

use bytes::{Bytes, BytesMut};
use tracing::trace;

use crate::config::HEADER_SIZE;
use crate::core::buffer::ByteBuffer;
use crate::error::{ProtocolError, Result};

/// One application message: a command id and an opaque payload.
///
/// Produced fresh per send or per received frame; ownership transfers to the
/// handler or the send path that receives it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    /// Routing key looked up in the session's handler table.
    pub command_id: i32,
    /// Payload bytes; the framing layer never interprets them.
    pub payload: Bytes,
}

impl Packet {
    /// Create a packet from a command id and payload bytes.
    pub fn new(command_id: i32, payload: impl Into<Bytes>) -> Self {
        Self {
            command_id,
            payload: payload.into(),
        }
    }

    /// Encode this packet into its wire frame.
    ///
    /// # Errors
    ///
    /// [`ProtocolError::OversizedPayload`] if the payload length does not fit
    /// the i32 length field.
    pub fn pack(&self) -> Result<Bytes> {
        let len = self.payload.len();
        if len > i32::MAX as usize {
            return Err(ProtocolError::OversizedPayload(len));
        }

        let mut frame = BytesMut::with_capacity(HEADER_SIZE + len);
        frame.extend_from_slice(&(len as i32).to_be_bytes());
        frame.extend_from_slice(&self.command_id.to_be_bytes());
        frame.extend_from_slice(&self.payload);
        Ok(frame.freeze())
    }
}

/// Parsed frame header: declared payload length and command id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub length: i32,
    pub command_id: i32,
}

/// Inspect the front of a receive buffer without consuming it.
///
/// Returns `None` while fewer than [`HEADER_SIZE`] bytes are buffered. The
/// declared length is reported as-is; validation is the extraction loop's
/// job so a bad header can be rejected without being consumed.
pub fn peek_header(recv: &ByteBuffer) -> Option<FrameHeader> {
    let length = recv.peek_i32(0)?;
    let command_id = recv.peek_i32(4)?;
    Some(FrameHeader { length, command_id })
}

/// Consume and return the next complete frame, if one has fully arrived.
///
/// Returns `Ok(None)` while the front of the buffer holds only a partial
/// frame; nothing is consumed in that case.
///
/// # Errors
///
/// [`ProtocolError::MalformedLength`] for a negative declared length and
/// [`ProtocolError::OversizedFrame`] for one beyond `max_payload`. In both
/// cases the offending frame is left unconsumed; the caller closes the
/// session without dispatching it.
pub fn extract_frame(recv: &mut ByteBuffer, max_payload: usize) -> Result<Option<Packet>> {
    let Some(header) = peek_header(recv) else {
        return Ok(None);
    };
    if header.length < 0 {
        return Err(ProtocolError::MalformedLength(header.length));
    }
    let payload_len = header.length as usize;
    if payload_len > max_payload {
        return Err(ProtocolError::OversizedFrame {
            declared: payload_len,
            max: max_payload,
        });
    }

    if recv.remaining() < HEADER_SIZE + payload_len {
        // Partial frame, wait for the next read event.
        return Ok(None);
    }

    recv.advance(HEADER_SIZE)?;
    let payload = Bytes::copy_from_slice(recv.read_bytes(payload_len)?);
    trace!(
        command_id = header.command_id,
        payload_len,
        "frame extracted"
    );
    Ok(Some(Packet {
        command_id: header.command_id,
        payload,
    }))
}

/// Drain every complete frame out of `recv`.
///
/// Consumes exactly the frames whose payload has fully arrived; leftover
/// bytes beyond the last complete frame stay buffered untouched, so frames
/// are never double-dispatched or dropped across split reads.
///
/// # Errors
///
/// Propagates [`extract_frame`] errors, but never at the cost of frames
/// already drained in this call: a bad header behind valid frames stays
/// buffered and the valid frames are returned; the error surfaces on the
/// next call.
pub fn extract_frames(recv: &mut ByteBuffer, max_payload: usize) -> Result<Vec<Packet>> {
    let mut frames = Vec::new();

    loop {
        match extract_frame(recv, max_payload) {
            Ok(Some(packet)) => frames.push(packet),
            Ok(None) => break,
            Err(e) if frames.is_empty() => return Err(e),
            Err(_) => break,
        }
    }

    recv.compact();
    Ok(frames)
}
