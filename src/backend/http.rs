//! reqwest client for the backend's HTTP API

use crate::backend::types::{PathRequest, PlanResponse, Recognition};
use crate::backend::Backend;
use crate::config::BackendConfig;
use crate::error::BackendError;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, info};

pub struct HttpBackend {
    client: Client,
    base_url: String,
    status_timeout: Duration,
}

impl HttpBackend {
    pub fn new(config: &BackendConfig) -> Result<Self, BackendError> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            status_timeout: Duration::from_millis(config.status_timeout_ms),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }
}

/// Upload name of a captured image: `<unix-secs>_<obstacle id>_<symbol>.jpg`
pub fn image_file_name(obstacle_id: u32, symbol: &str) -> String {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    format!("{}_{}_{}.jpg", secs, obstacle_id, symbol)
}

async fn check(response: Response) -> Result<Response, BackendError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(BackendError::Status {
        status: status.as_u16(),
        body,
    })
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, BackendError> {
    let body = check(response).await?.bytes().await?;
    serde_json::from_slice(&body).map_err(|e| BackendError::Malformed(e.to_string()))
}

#[async_trait]
impl Backend for HttpBackend {
    async fn status(&self) -> Result<(), BackendError> {
        let response = self
            .client
            .get(self.url("status"))
            .timeout(self.status_timeout)
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }

    async fn request_path(&self, request: &PathRequest) -> Result<PlanResponse, BackendError> {
        debug!(
            "[BACKEND] Requesting path for {} obstacles",
            request.obstacles.len()
        );
        let response = self
            .client
            .post(self.url("path"))
            .json(request)
            .send()
            .await?;
        let plan: PlanResponse = decode(response).await?;

        info!(
            "[BACKEND] Plan received: {} commands, {} waypoints",
            plan.data.commands.len(),
            plan.data.path.len()
        );
        Ok(plan)
    }

    async fn recognize(
        &self,
        obstacle_id: u32,
        symbol: &str,
        image: Vec<u8>,
    ) -> Result<Recognition, BackendError> {
        let part = Part::bytes(image)
            .file_name(image_file_name(obstacle_id, symbol))
            .mime_str("image/jpeg")?;
        let form = Form::new().part("file", part);

        let response = self
            .client
            .post(self.url("image"))
            .multipart(form)
            .send()
            .await?;
        decode(response).await
    }

    async fn stitch(&self) -> Result<(), BackendError> {
        let response = self.client.get(self.url("stitch")).send().await?;
        check(response).await?;
        Ok(())
    }
}
