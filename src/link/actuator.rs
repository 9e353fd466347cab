//! Motor-board link
//!
//! Commands are written as newline-terminated ASCII tokens; the board
//! answers with newline-terminated acknowledgement tokens.

use crate::config::{ActuatorConfig, ActuatorConnection};
use crate::error::MissionError;
use crate::link::tcp;
use crate::link::traits::{ActuatorLink, TransportStream};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use rover_shared::ActuatorCommand;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines, ReadHalf, WriteHalf};
use tokio::sync::{mpsc, Mutex};
use tokio::time::timeout;
use tokio_serial::{SerialPortBuilderExt, SerialStream};
use tracing::{debug, error, info, warn};

type Stream = Box<dyn TransportStream>;

/// Events forwarded from the motor board to the command follower
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActuatorEvent {
    /// A token exactly as received
    Token(String),
    /// The link dropped; any acknowledgement in flight is lost
    Disconnected { reason: String },
}

#[async_trait]
impl TransportStream for SerialStream {
    async fn shutdown(&mut self) -> Result<()> {
        AsyncWriteExt::shutdown(self).await?;
        Ok(())
    }
}

/// Line-oriented motor-board link over a serial port or TCP
pub struct LineActuatorLink {
    connection: ActuatorConnection,
    read_timeout: Duration,
    reader: Mutex<Option<Lines<BufReader<ReadHalf<Stream>>>>>,
    writer: Mutex<Option<WriteHalf<Stream>>>,
}

impl LineActuatorLink {
    pub fn new(config: &ActuatorConfig) -> Self {
        Self {
            connection: config.connection.clone(),
            read_timeout: config.read_timeout(),
            reader: Mutex::new(None),
            writer: Mutex::new(None),
        }
    }

    async fn open(&self) -> Result<Stream> {
        match &self.connection {
            ActuatorConnection::Serial { port, baud } => {
                let stream = tokio_serial::new(port, *baud)
                    .open_native_async()
                    .map_err(|e| anyhow!("failed to open {}: {}", port, e))?;
                Ok(Box::new(stream))
            }
            ActuatorConnection::Tcp { address } => tcp::connect(address).await,
        }
    }
}

#[async_trait]
impl ActuatorLink for LineActuatorLink {
    async fn connect(&self) -> Result<()> {
        let stream = self.open().await?;
        let (read_half, write_half) = tokio::io::split(stream);

        *self.reader.lock().await = Some(BufReader::new(read_half).lines());
        *self.writer.lock().await = Some(write_half);

        info!("[ACTUATOR] Connected via {:?}", self.connection);
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        self.reader.lock().await.take();
        if let Some(mut writer) = self.writer.lock().await.take() {
            writer.shutdown().await?;
        }
        info!("[ACTUATOR] Disconnected");
        Ok(())
    }

    async fn send(&self, command: &ActuatorCommand) -> Result<()> {
        let line = format!("{}\n", command);

        let mut guard = self.writer.lock().await;
        let writer = guard
            .as_mut()
            .ok_or_else(|| MissionError::Link("actuator link not connected".into()))?;

        let written = async {
            writer.write_all(line.as_bytes()).await?;
            writer.flush().await
        }
        .await;

        if let Err(e) = written {
            guard.take();
            return Err(anyhow!("actuator write failed: {}", e));
        }

        debug!("[ACTUATOR] Sent {}", command);
        Ok(())
    }

    async fn recv(&self) -> Result<Option<String>> {
        let mut guard = self.reader.lock().await;
        let lines = guard
            .as_mut()
            .ok_or_else(|| MissionError::Link("actuator link not connected".into()))?;

        let next = timeout(self.read_timeout, lines.next_line()).await;
        match next {
            Err(_) => Ok(None),
            Ok(Ok(Some(line))) => Ok(Some(line.trim().to_string())),
            Ok(Ok(None)) => {
                guard.take();
                Err(MissionError::Link("motor board closed the link".into()).into())
            }
            Ok(Err(e)) => {
                guard.take();
                Err(MissionError::Link(format!("read error: {}", e)).into())
            }
        }
    }
}

/// Actuator-Receiver worker: forward every token to the follower verbatim
///
/// A dropped link is reported once as [`ActuatorEvent::Disconnected`] and
/// then re-established. Returns when the follower is gone.
pub async fn run_receiver(
    link: Arc<dyn ActuatorLink>,
    events: mpsc::UnboundedSender<ActuatorEvent>,
    reconnect_delay: Duration,
) {
    loop {
        if events.is_closed() {
            info!("[ACTUATOR] Follower gone, receiver stopping");
            break;
        }

        match link.recv().await {
            Ok(Some(token)) => {
                debug!("[ACTUATOR] Received {:?}", token);
                if events.send(ActuatorEvent::Token(token)).is_err() {
                    break;
                }
            }
            Ok(None) => {
                // Read timeout placeholder
            }
            Err(e) => {
                warn!("[ACTUATOR] Link lost: {}", e);
                let _ = events.send(ActuatorEvent::Disconnected {
                    reason: e.to_string(),
                });
                reconnect(link.as_ref(), &events, reconnect_delay).await;
            }
        }
    }
}

async fn reconnect(
    link: &dyn ActuatorLink,
    events: &mpsc::UnboundedSender<ActuatorEvent>,
    delay: Duration,
) {
    let _ = link.disconnect().await;

    while !events.is_closed() {
        tokio::time::sleep(delay).await;
        match link.connect().await {
            Ok(()) => return,
            Err(e) => error!("[ACTUATOR] Reconnect failed: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::tcp::TcpAcceptor;
    use crate::link::traits::TransportListener;
    use rover_shared::{Motion, MotionKind};
    use tokio::io::AsyncReadExt;

    async fn tcp_link() -> (Arc<LineActuatorLink>, Stream) {
        let board = TcpAcceptor::bind("127.0.0.1:0").await.unwrap();
        let config = ActuatorConfig {
            connection: ActuatorConnection::Tcp {
                address: board.local_addr().unwrap().to_string(),
            },
            read_timeout_ms: 50,
            ..Default::default()
        };
        let link = Arc::new(LineActuatorLink::new(&config));

        let connecting = {
            let link = link.clone();
            tokio::spawn(async move { link.connect().await })
        };
        let (stream, _) = board.accept().await.unwrap();
        connecting.await.unwrap().unwrap();
        (link, stream)
    }

    #[tokio::test]
    async fn test_send_writes_one_line_per_command() {
        let (link, mut board) = tcp_link().await;

        link.send(&ActuatorCommand::ResetHeading).await.unwrap();
        link.send(&ActuatorCommand::Move(Motion::new(MotionKind::Forward, 1)))
            .await
            .unwrap();

        let mut buf = vec![0u8; 64];
        let mut received = String::new();
        while received.matches('\n').count() < 2 {
            let n = board.read(&mut buf).await.unwrap();
            received.push_str(std::str::from_utf8(&buf[..n]).unwrap());
        }
        assert_eq!(received, "RS00\nFW01\n");
    }

    #[tokio::test]
    async fn test_recv_placeholder_then_token_then_drop() {
        let (link, mut board) = tcp_link().await;

        assert_eq!(link.recv().await.unwrap(), None);

        board.write_all(b"ACK\r\n").await.unwrap();
        assert_eq!(link.recv().await.unwrap(), Some("ACK".to_string()));

        drop(board);
        assert!(link.recv().await.is_err());
    }

    #[tokio::test]
    async fn test_receiver_forwards_tokens_and_reports_drop() {
        let (link, mut board) = tcp_link().await;
        let (tx, mut rx) = mpsc::unbounded_channel();

        let worker = tokio::spawn(run_receiver(link, tx, Duration::from_secs(60)));

        board.write_all(b"ACK\nSTATUS ok\n").await.unwrap();
        assert_eq!(rx.recv().await, Some(ActuatorEvent::Token("ACK".into())));
        assert_eq!(rx.recv().await, Some(ActuatorEvent::Token("STATUS ok".into())));

        drop(board);
        assert!(matches!(
            rx.recv().await,
            Some(ActuatorEvent::Disconnected { .. })
        ));

        worker.abort();
    }
}
