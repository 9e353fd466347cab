//! RFCOMM transport for the operator app's Bluetooth link

use crate::link::traits::{TransportListener, TransportStream};
use anyhow::Result;
use async_trait::async_trait;
use bluer::rfcomm::{Listener, SocketAddr as RfcommAddr, Stream as RfcommStream};
use bluer::Address;
use tracing::info;

#[async_trait]
impl TransportStream for RfcommStream {
    async fn shutdown(&mut self) -> Result<()> {
        tokio::io::AsyncWriteExt::shutdown(self).await?;
        Ok(())
    }
}

/// Listens for the operator app on an RFCOMM channel
pub struct RfcommAcceptor {
    listener: Listener,
    channel: u8,
}

impl RfcommAcceptor {
    /// Bind on every local adapter
    pub async fn bind(channel: u8) -> Result<Self> {
        let listener = Listener::bind(RfcommAddr::new(Address::any(), channel)).await?;
        info!("[RFCOMM] Listening on channel {}", channel);
        Ok(Self { listener, channel })
    }

    pub fn channel(&self) -> u8 {
        self.channel
    }
}

#[async_trait]
impl TransportListener for RfcommAcceptor {
    async fn accept(&self) -> Result<(Box<dyn TransportStream>, String)> {
        let (stream, peer) = self.listener.accept().await?;
        Ok((Box::new(stream), peer.addr.to_string()))
    }

    fn name(&self) -> &'static str {
        "Bluetooth"
    }
}
