//! Operator app link and its receiver/sender workers

use crate::error::MissionError;
use crate::link::traits::{OperatorLink, TransportListener, TransportStream};
use crate::mission::Action;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use rover_shared::codec::{self, FrameDecoder};
use rover_shared::{OperatorAction, OperatorMessage};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::sync::{mpsc, Mutex};
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

type Stream = Box<dyn TransportStream>;

struct FrameReader {
    half: ReadHalf<Stream>,
    decoder: FrameDecoder,
    buf: Vec<u8>,
}

enum ReadOutcome {
    Action(OperatorAction),
    Data,
    TimedOut,
    Closed(String),
}

/// Operator link over any accepted byte stream, framed with the shared codec
pub struct StreamOperatorLink<L> {
    listener: L,
    device_id: String,
    read_timeout: Duration,
    sequence_id: AtomicU64,
    reader: Mutex<Option<FrameReader>>,
    writer: Mutex<Option<WriteHalf<Stream>>>,
}

impl<L: TransportListener> StreamOperatorLink<L> {
    pub fn new(listener: L, device_id: impl Into<String>, read_timeout: Duration) -> Self {
        Self {
            listener,
            device_id: device_id.into(),
            read_timeout,
            sequence_id: AtomicU64::new(0),
            reader: Mutex::new(None),
            writer: Mutex::new(None),
        }
    }

    fn next_sequence_id(&self) -> u64 {
        self.sequence_id.fetch_add(1, Ordering::SeqCst) + 1
    }

    async fn read_once(&self, reader: &mut FrameReader) -> Result<ReadOutcome> {
        while let Some(envelope) = reader.decoder.decode_next()? {
            match OperatorAction::from_envelope(&envelope) {
                Some(action) => return Ok(ReadOutcome::Action(action)),
                None => debug!("[OPERATOR] Ignoring envelope without an action payload"),
            }
        }

        match timeout(self.read_timeout, reader.half.read(&mut reader.buf)).await {
            Err(_) => Ok(ReadOutcome::TimedOut),
            Ok(Ok(0)) => Ok(ReadOutcome::Closed("operator closed the link".into())),
            Ok(Ok(n)) => {
                reader.decoder.extend(&reader.buf[..n]);
                Ok(ReadOutcome::Data)
            }
            Ok(Err(e)) => Ok(ReadOutcome::Closed(format!("read error: {}", e))),
        }
    }
}

#[async_trait]
impl<L: TransportListener> OperatorLink for StreamOperatorLink<L> {
    async fn connect(&self) -> Result<()> {
        info!("[OPERATOR] Waiting for operator app on {}", self.listener.name());
        let (stream, peer) = self.listener.accept().await?;
        let (half, write_half) = tokio::io::split(stream);

        *self.reader.lock().await = Some(FrameReader {
            half,
            decoder: FrameDecoder::new(),
            buf: vec![0u8; 4096],
        });
        *self.writer.lock().await = Some(write_half);

        info!("[OPERATOR] Connected to {}", peer);
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        self.reader.lock().await.take();
        if let Some(mut writer) = self.writer.lock().await.take() {
            writer.shutdown().await?;
        }
        info!("[OPERATOR] Disconnected");
        Ok(())
    }

    async fn send(&self, message: &OperatorMessage) -> Result<()> {
        let envelope = message
            .clone()
            .into_envelope(&self.device_id, self.next_sequence_id());
        let encoded = codec::encode(&envelope)?;

        let mut guard = self.writer.lock().await;
        let writer = guard
            .as_mut()
            .ok_or_else(|| MissionError::Link("operator link not connected".into()))?;

        if let Err(e) = writer.write_all(&encoded).await {
            guard.take();
            return Err(anyhow!("operator write failed: {}", e));
        }
        Ok(())
    }

    async fn recv(&self) -> Result<Option<OperatorAction>> {
        let mut guard = self.reader.lock().await;

        loop {
            let reader = guard
                .as_mut()
                .ok_or_else(|| MissionError::Link("operator link not connected".into()))?;

            match self.read_once(reader).await {
                Ok(ReadOutcome::Action(action)) => return Ok(Some(action)),
                Ok(ReadOutcome::Data) => continue,
                Ok(ReadOutcome::TimedOut) => return Ok(None),
                Ok(ReadOutcome::Closed(reason)) => {
                    guard.take();
                    return Err(MissionError::Link(reason).into());
                }
                Err(e) => {
                    guard.take();
                    return Err(e);
                }
            }
        }
    }
}

/// Operator-Receiver worker: decode operator messages into actions
///
/// Returns when the action queue is closed.
pub async fn run_receiver(
    link: Arc<dyn OperatorLink>,
    actions: mpsc::UnboundedSender<Action>,
    reconnect_delay: Duration,
) {
    let mut connected = false;

    loop {
        if actions.is_closed() {
            info!("[OPERATOR] Action queue closed, receiver stopping");
            break;
        }

        if !connected {
            match link.connect().await {
                Ok(()) => connected = true,
                Err(e) => {
                    error!("[OPERATOR] Connect failed: {}", e);
                    tokio::time::sleep(reconnect_delay).await;
                    continue;
                }
            }
        }

        match link.recv().await {
            Ok(Some(action)) => {
                debug!("[OPERATOR] Received {:?}", action);
                if actions.send(Action::from(action)).is_err() {
                    break;
                }
            }
            Ok(None) => {
                // No message within the read timeout
            }
            Err(e) => {
                warn!("[OPERATOR] Link dropped: {}", e);
                if let Err(e) = link.disconnect().await {
                    debug!("[OPERATOR] Disconnect after drop: {}", e);
                }
                connected = false;
            }
        }
    }
}

/// Operator-Sender worker: deliver outbound messages in FIFO order
///
/// A message that cannot be written is retried until the link comes back, so
/// nothing is dropped or reordered. Returns when every producer is gone.
pub async fn run_sender(
    link: Arc<dyn OperatorLink>,
    mut outbound: mpsc::UnboundedReceiver<OperatorMessage>,
    retry_delay: Duration,
) {
    while let Some(message) = outbound.recv().await {
        debug!("[OPERATOR] Sending {:?}", message.category());
        loop {
            match link.send(&message).await {
                Ok(()) => break,
                Err(e) => {
                    warn!("[OPERATOR] Send failed, retrying: {}", e);
                    tokio::time::sleep(retry_delay).await;
                }
            }
        }
    }

    info!("[OPERATOR] Outbound queue closed, sender stopping");
}
