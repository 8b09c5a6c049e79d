//! Single-writer task draining a session's outbound queue.
//!
//! Being the only writer of the transport's write half, this task makes
//! whole-frame atomicity structural: a queued frame is written and flushed in
//! full before the next one is touched, whatever task queued it.

use bytes::Bytes;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::Result;

pub(crate) async fn run_writer<W>(
    mut writer: W,
    mut outbound: mpsc::Receiver<Bytes>,
    cancel: CancellationToken,
) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            frame = outbound.recv() => {
                match frame {
                    // All senders gone, clean shutdown.
                    None => break,
                    Some(bytes) => {
                        writer.write_all(&bytes).await?;
                        writer.flush().await?;
                    }
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::packet::Packet;
    use std::time::Duration;
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn writes_queued_frames_in_order() {
        let (client, mut server) = tokio::io::duplex(4096);
        let (tx, rx) = mpsc::channel(8);
        let cancel = CancellationToken::new();
        let task = tokio::spawn(run_writer(client, rx, cancel));

        for i in 0..3i32 {
            let frame = Packet::new(i, i.to_be_bytes().to_vec()).pack().unwrap();
            tx.send(frame).await.unwrap();
        }
        drop(tx);
        task.await.unwrap().unwrap();

        let mut received = Vec::new();
        server.read_to_end(&mut received).await.unwrap();
        let mut expected = Vec::new();
        for i in 0..3i32 {
            expected.extend_from_slice(&Packet::new(i, i.to_be_bytes().to_vec()).pack().unwrap());
        }
        assert_eq!(received, expected);
    }

    #[tokio::test]
    async fn cancellation_stops_the_writer() {
        let (client, _server) = tokio::io::duplex(64);
        let (_tx, rx) = mpsc::channel::<Bytes>(1);
        let cancel = CancellationToken::new();
        let task = tokio::spawn(run_writer(client, rx, cancel.clone()));

        cancel.cancel();
        let result = tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("writer should exit on cancel");
        assert!(result.unwrap().is_ok());
    }
}
