//! Per-session read task: lifecycle hooks, extraction loop, dispatch.
//!
//! This task is the only writer of the session's receive buffer and the only
//! invoker of its handlers, so handler code never races with buffer mutation
//! for its own session. It runs `initialize` before the first read, feeds
//! every read event through `before_read`, and consumes one complete frame
//! at a time, dispatching each by command id before touching the next.
//!
//! Failure containment follows
//! [`ProtocolError::is_fatal`](crate::error::ProtocolError::is_fatal): a
//! handler error is logged and the loop continues; a framing violation or
//! transport error closes this session only. Frames ahead of a bad header
//! were already dispatched by the time it is seen; the offending frame
//! itself never is.

use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, instrument};

use crate::config::FrameConfig;
use crate::core::buffer::ByteBuffer;
use crate::core::packet::{extract_frame, Packet};
use crate::error::Result;
use crate::log::Severity;
use crate::session::manager::SessionManager;
use crate::session::{HandlerRegistry, SessionHandle, SessionHooks};

#[instrument(skip_all, fields(session_id = handle.id()))]
pub(crate) async fn run_session<R>(
    mut reader: R,
    handle: SessionHandle,
    hooks: Arc<dyn SessionHooks>,
    manager: Arc<SessionManager>,
    frame: FrameConfig,
) where
    R: AsyncRead + Unpin,
{
    // Handler registration completes here, before any byte is consumed; the
    // table is read-only for the rest of the session.
    let mut registry = HandlerRegistry::new();
    match hooks.initialize(&mut registry) {
        Ok(Some(greeting)) => {
            if let Err(e) = handle.send_packet(greeting).await {
                manager.log(
                    Severity::Error,
                    &format!("session {}: greeting send failed: {e}", handle.id()),
                );
            }
        }
        Ok(None) => {}
        Err(e) => {
            manager.log(
                Severity::Error,
                &format!("session {}: initialize failed: {e}", handle.id()),
            );
            finish(&handle, &manager);
            return;
        }
    }

    let mut recv = ByteBuffer::with_capacity(frame.recv_buffer_capacity);
    let mut chunk = vec![0u8; frame.read_chunk_size];
    let cancel = handle.cancellation();

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!("read loop cancelled");
                break;
            }
            read = reader.read(&mut chunk) => {
                match read {
                    Ok(0) => {
                        manager.log(
                            Severity::Message,
                            &format!("session {}: closed by peer", handle.id()),
                        );
                        break;
                    }
                    Ok(n) => {
                        hooks.before_read(&chunk[..n], &mut recv);
                        let mut failure = false;
                        loop {
                            match extract_frame(&mut recv, frame.max_payload_size) {
                                Ok(Some(packet)) => {
                                    let command_id = packet.command_id;
                                    if let Err(e) =
                                        dispatch(packet, &registry, &hooks, &handle).await
                                    {
                                        manager.log(
                                            Severity::Error,
                                            &format!(
                                                "session {}: command {command_id}: {e}",
                                                handle.id()
                                            ),
                                        );
                                        if e.is_fatal() {
                                            failure = true;
                                            break;
                                        }
                                    }
                                }
                                Ok(None) => break,
                                Err(e) => {
                                    // Framing violation: fatal, frame not dispatched.
                                    manager.log(
                                        Severity::Error,
                                        &format!("session {}: {e}", handle.id()),
                                    );
                                    failure = true;
                                    break;
                                }
                            }
                        }
                        recv.compact();
                        if failure {
                            break;
                        }
                    }
                    Err(e) => {
                        manager.log(
                            Severity::Error,
                            &format!("session {}: read failed: {e}", handle.id()),
                        );
                        break;
                    }
                }
            }
        }
    }

    finish(&handle, &manager);
}

/// Look up the handler table and invoke the handler or the fallback hook.
///
/// The caller decides close-vs-continue from the returned error's
/// [`ProtocolError::is_fatal`](crate::error::ProtocolError::is_fatal):
/// handler and unregistered-command failures leave the session open, a
/// failed reply send does not.
async fn dispatch(
    packet: Packet,
    registry: &HandlerRegistry,
    hooks: &Arc<dyn SessionHooks>,
    handle: &SessionHandle,
) -> Result<()> {
    match registry.get(packet.command_id) {
        Some(handler) => match handler(&packet.payload)? {
            Some(reply) => handle.send_packet(reply).await,
            None => Ok(()),
        },
        None => hooks.handle_unregistered(packet.command_id, &packet.payload),
    }
}

/// Converge with any concurrent close, then release the session's entry.
/// Dropping the read half here is the single release of the connection.
fn finish(handle: &SessionHandle, manager: &Arc<SessionManager>) {
    handle.close();
    handle.mark_closed();
    manager.on_close(handle.id());
}
