//! Planning/vision backend
//!
//! The backend is an HTTP service on the operator's network. It plans a
//! command sequence for an obstacle set, recognises captured images, and
//! stitches the recognised images once a mission ends.

pub mod http;
pub mod types;

pub use http::HttpBackend;
pub use types::{PathRequest, PlanResponse, Recognition};

use crate::error::BackendError;
use async_trait::async_trait;

/// Operations the mission needs from the backend
#[async_trait]
pub trait Backend: Send + Sync {
    /// Liveness check
    async fn status(&self) -> Result<(), BackendError>;

    /// Ask for a command plan and its matching path
    async fn request_path(&self, request: &PathRequest) -> Result<PlanResponse, BackendError>;

    /// Submit one captured image for recognition
    async fn recognize(
        &self,
        obstacle_id: u32,
        symbol: &str,
        image: Vec<u8>,
    ) -> Result<Recognition, BackendError>;

    /// Combine the recognised images of the finished mission
    async fn stitch(&self) -> Result<(), BackendError>;
}
