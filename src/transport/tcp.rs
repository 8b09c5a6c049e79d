//! TCP acceptor and connector.
//!
//! `serve` runs the accept loop; `serve_with_shutdown` adds graceful
//! shutdown driven by an external channel, closing live sessions through the
//! manager before returning.

use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tokio::sync::mpsc;
use tracing::{error, info, instrument, warn};

use crate::error::Result;
use crate::session::{SessionHandle, SessionManager};

/// Accept connections forever, handing each to the session manager.
#[instrument(skip_all)]
pub async fn serve(listener: TcpListener, manager: Arc<SessionManager>) -> Result<()> {
    let local = listener.local_addr()?;
    info!(address = %local, "listening");

    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                accept_one(stream, peer, &manager);
            }
            Err(e) => {
                error!(error = %e, "error accepting connection");
            }
        }
    }
}

/// Accept connections until the shutdown channel fires, then close every
/// live session and return.
#[instrument(skip_all)]
pub async fn serve_with_shutdown(
    listener: TcpListener,
    manager: Arc<SessionManager>,
    mut shutdown_rx: mpsc::Receiver<()>,
) -> Result<()> {
    let local = listener.local_addr()?;
    info!(address = %local, "listening");

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => {
                info!("shutting down server, closing sessions");
                manager.shutdown();
                return Ok(());
            }
            accept_result = listener.accept() => {
                match accept_result {
                    Ok((stream, peer)) => {
                        accept_one(stream, peer, &manager);
                    }
                    Err(e) => {
                        error!(error = %e, "error accepting connection");
                    }
                }
            }
        }
    }
}

/// Establish an outbound connection and attach a session to it.
pub async fn connect<A: ToSocketAddrs>(
    addr: A,
    manager: &Arc<SessionManager>,
) -> Result<SessionHandle> {
    let stream = TcpStream::connect(addr).await?;
    stream.set_nodelay(true)?;
    Ok(manager.on_accept(stream))
}

fn accept_one(stream: TcpStream, peer: std::net::SocketAddr, manager: &Arc<SessionManager>) {
    let max_sessions = manager.config().server.max_sessions;
    if manager.session_count() >= max_sessions {
        warn!(peer = %peer, max_sessions, "session limit reached, refusing connection");
        drop(stream);
        return;
    }

    if let Err(e) = stream.set_nodelay(true) {
        warn!(peer = %peer, error = %e, "failed to set TCP_NODELAY");
    }
    let handle = manager.on_accept(stream);
    info!(peer = %peer, session_id = handle.id(), "connection established");
}
