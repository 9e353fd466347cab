//! Still-image capture for the vision step

use crate::config::VisionConfig;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

/// A source of JPEG stills
#[async_trait]
pub trait Camera: Send + Sync {
    /// Capture one image; `attempt` counts from zero and lets the camera
    /// vary its exposure between retries
    async fn capture(&self, attempt: u32) -> Result<Vec<u8>>;
}

/// Runs an external still-capture program that writes a JPEG to stdout
pub struct StillCamera {
    program: String,
    args: Vec<String>,
}

impl StillCamera {
    pub fn new(config: &VisionConfig) -> Self {
        Self {
            program: config.capture_program.clone(),
            args: config.capture_args.clone(),
        }
    }

    /// Retries brighten the image in half-stop steps
    fn exposure_args(attempt: u32) -> Vec<String> {
        if attempt == 0 {
            return Vec::new();
        }
        vec!["--ev".into(), format!("{:.1}", attempt as f32 * 0.5)]
    }
}

#[async_trait]
impl Camera for StillCamera {
    async fn capture(&self, attempt: u32) -> Result<Vec<u8>> {
        let output = Command::new(&self.program)
            .args(&self.args)
            .args(Self::exposure_args(attempt))
            .kill_on_drop(true)
            .output()
            .await
            .with_context(|| format!("failed to run {}", self.program))?;

        if !output.status.success() {
            bail!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        if output.stdout.is_empty() {
            bail!("{} produced no image", self.program);
        }

        debug!(
            "[CAMERA] Captured {} bytes (attempt {})",
            output.stdout.len(),
            attempt + 1
        );
        Ok(output.stdout)
    }
}
