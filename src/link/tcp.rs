//! TCP transport for the operator link and the motor-board simulator

use crate::link::traits::{TransportListener, TransportStream};
use anyhow::Result;
use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};

#[async_trait]
impl TransportStream for TcpStream {
    async fn shutdown(&mut self) -> Result<()> {
        AsyncWriteExt::shutdown(self).await?;
        Ok(())
    }
}

/// Listens for the operator app on a TCP address
pub struct TcpAcceptor {
    listener: TcpListener,
}

impl TcpAcceptor {
    pub async fn bind(address: &str) -> Result<Self> {
        let listener = TcpListener::bind(address).await?;
        Ok(Self { listener })
    }

    pub fn local_addr(&self) -> Result<std::net::SocketAddr> {
        Ok(self.listener.local_addr()?)
    }
}

#[async_trait]
impl TransportListener for TcpAcceptor {
    async fn accept(&self) -> Result<(Box<dyn TransportStream>, String)> {
        let (stream, addr) = self.listener.accept().await?;
        stream.set_nodelay(true)?;
        Ok((Box::new(stream), addr.to_string()))
    }

    fn name(&self) -> &'static str {
        "TCP"
    }
}

/// Open an outbound TCP stream (motor-board simulator)
pub async fn connect(address: &str) -> Result<Box<dyn TransportStream>> {
    let stream = TcpStream::connect(address).await?;
    stream.set_nodelay(true)?;
    Ok(Box::new(stream))
}
