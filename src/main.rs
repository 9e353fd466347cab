mod backend;
mod camera;
mod config;
mod error;
mod link;
mod mission;
mod rover;
#[cfg(test)]
mod testing;

use anyhow::{Context, Result};
use backend::{Backend, HttpBackend};
use camera::StillCamera;
use config::{OperatorTransport, RoverConfig};
use link::{ActuatorLink, LineActuatorLink, OperatorLink, StreamOperatorLink};
use rover::{Collaborators, Rover};
use std::sync::Arc;

use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let config = RoverConfig::from_env()?;

    info!("Rover controller starting: {}", config.device_id);
    info!("  Backend: {}", config.backend.base_url);
    info!("  Actuator: {:?}", config.actuator.connection);

    let operator = operator_link(&config).await?;

    let actuator = Arc::new(LineActuatorLink::new(&config.actuator));
    if let Err(e) = actuator.connect().await {
        // The actuator receiver keeps retrying
        warn!("Motor board not connected yet: {}", e);
    }

    let backend = Arc::new(HttpBackend::new(&config.backend).context("backend client")?);
    match backend.status().await {
        Ok(()) => info!("Backend reachable"),
        Err(e) => warn!("Backend not reachable: {}", e),
    }

    let mut rover = Rover::spawn(
        Collaborators {
            operator,
            actuator,
            backend,
            camera: Arc::new(StillCamera::new(&config.vision)),
        },
        &config,
    );

    tokio::select! {
        worker = rover.wait() => error!("Worker {} exited", worker),
        _ = tokio::signal::ctrl_c() => info!("Shutting down"),
    }

    rover.shutdown().await;
    Ok(())
}

async fn operator_link(config: &RoverConfig) -> Result<Arc<dyn OperatorLink>> {
    let read_timeout = config.operator.read_timeout();

    match config.operator.transport {
        OperatorTransport::Tcp => {
            let listener = link::tcp::TcpAcceptor::bind(&config.operator.tcp_address).await?;
            info!("  Operator: TCP {}", config.operator.tcp_address);
            Ok(Arc::new(StreamOperatorLink::new(
                listener,
                config.device_id.clone(),
                read_timeout,
            )))
        }
        #[cfg(feature = "bluetooth")]
        OperatorTransport::Rfcomm => {
            let listener = link::rfcomm::RfcommAcceptor::bind(config.operator.rfcomm_channel).await?;
            info!("  Operator: RFCOMM channel {}", listener.channel());
            Ok(Arc::new(StreamOperatorLink::new(
                listener,
                config.device_id.clone(),
                read_timeout,
            )))
        }
        #[cfg(not(feature = "bluetooth"))]
        OperatorTransport::Rfcomm => {
            anyhow::bail!("operator transport rfcomm needs the `bluetooth` feature")
        }
    }
}
