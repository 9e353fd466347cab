//! Link abstractions for pluggable transports and collaborators

use anyhow::Result;
use async_trait::async_trait;
use rover_shared::{ActuatorCommand, OperatorAction, OperatorMessage};
use tokio::io::{AsyncRead, AsyncWrite};

/// A byte stream a link runs over (TCP socket, RFCOMM socket, serial port)
#[async_trait]
pub trait TransportStream: AsyncRead + AsyncWrite + Send + Unpin + 'static {
    /// Close the transport gracefully
    async fn shutdown(&mut self) -> Result<()>;
}

/// Accepts the operator app's connection
#[async_trait]
pub trait TransportListener: Send + Sync {
    /// Wait for a peer; returns the stream and a printable peer address
    async fn accept(&self) -> Result<(Box<dyn TransportStream>, String)>;

    /// Human-readable name for this transport
    fn name(&self) -> &'static str;
}

/// The operator app link
///
/// `recv` returns `Ok(None)` when nothing arrived within the read timeout;
/// an `Err` means the link dropped and must be re-established.
#[async_trait]
pub trait OperatorLink: Send + Sync {
    async fn connect(&self) -> Result<()>;
    async fn disconnect(&self) -> Result<()>;
    async fn send(&self, message: &OperatorMessage) -> Result<()>;
    async fn recv(&self) -> Result<Option<OperatorAction>>;
}

/// The motor-control board link
///
/// `recv` returns `Ok(None)` as the placeholder for "nothing within the read
/// timeout"; an `Err` means the link dropped.
#[async_trait]
pub trait ActuatorLink: Send + Sync {
    async fn connect(&self) -> Result<()>;
    async fn disconnect(&self) -> Result<()>;
    async fn send(&self, command: &ActuatorCommand) -> Result<()>;
    async fn recv(&self) -> Result<Option<String>>;
}
