use crate::errors::ApiError;
use crate::models::{
    CleanupResponse, InfoRequest, InfoResponse, JobId, StatusPayload, SubmitRequest,
    SubmitResponse,
};
use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

/// The four endpoints of the job server.
#[async_trait]
pub trait JobApi: Send + Sync {
    /// `POST /get_info`
    async fn get_info(&self, url: &str) -> Result<InfoResponse, ApiError>;

    /// `POST /download`
    async fn submit(&self, url: &str, quality: &str) -> Result<SubmitResponse, ApiError>;

    /// `GET /status/{id}`
    async fn status(&self, job_id: &JobId) -> Result<StatusPayload, ApiError>;

    /// `POST /cleanup`
    async fn cleanup(&self) -> Result<CleanupResponse, ApiError>;
}

pub struct HttpJobApi {
    client: Client,
    base_url: Url,
}

impl HttpJobApi {
    pub fn new(base_url: Url, timeout: Duration) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::Connection(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client, base_url })
    }

    fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        self.base_url
            .join(path)
            .map_err(|e| ApiError::Connection(format!("bad endpoint {path}: {e}")))
    }

    fn status_endpoint(&self, job_id: &JobId) -> Result<Url, ApiError> {
        let mut endpoint = self.base_url.clone();
        endpoint
            .path_segments_mut()
            .map_err(|_| ApiError::Connection(format!("bad server URL {}", self.base_url)))?
            .pop_if_empty()
            .push("status")
            .push(job_id.as_str());
        Ok(endpoint)
    }

    /// Envelope endpoints answer `{success:false, error}` with a 4xx/5xx code, so the
    /// body is decoded whatever the status.
    async fn decode_envelope<T: DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ApiError> {
        let code = response.status();
        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| {
            if code.is_success() {
                ApiError::Decode(e.to_string())
            } else {
                ApiError::Status {
                    code: code.as_u16(),
                    message: body.trim().to_string(),
                }
            }
        })
    }
}

#[async_trait]
impl JobApi for HttpJobApi {
    async fn get_info(&self, url: &str) -> Result<InfoResponse, ApiError> {
        let endpoint = self.endpoint("get_info")?;
        debug!(%endpoint, url, "requesting video info");
        let response = self
            .client
            .post(endpoint)
            .json(&InfoRequest { url })
            .send()
            .await?;
        Self::decode_envelope(response).await
    }

    async fn submit(&self, url: &str, quality: &str) -> Result<SubmitResponse, ApiError> {
        let endpoint = self.endpoint("download")?;
        debug!(%endpoint, url, quality, "submitting job");
        let response = self
            .client
            .post(endpoint)
            .json(&SubmitRequest { url, quality })
            .send()
            .await?;
        Self::decode_envelope(response).await
    }

    async fn status(&self, job_id: &JobId) -> Result<StatusPayload, ApiError> {
        let endpoint = self.status_endpoint(job_id)?;
        let response = self.client.get(endpoint).send().await?;

        let code = response.status();
        if !code.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<serde_json::Value>(&body)
                .ok()
                .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(str::to_string))
                .or_else(|| Some(body.trim().to_string()).filter(|b| !b.is_empty()))
                .unwrap_or_else(|| "no details".to_string());
            return Err(ApiError::Status {
                code: code.as_u16(),
                message,
            });
        }

        Ok(response.json().await?)
    }

    async fn cleanup(&self) -> Result<CleanupResponse, ApiError> {
        let endpoint = self.endpoint("cleanup")?;
        let response = self.client.post(endpoint).send().await?;
        Self::decode_envelope(response).await
    }
}

/// Resolves a possibly relative `download_url` against the server base.
pub fn resolve_download_url(base_url: &Url, download_url: &str) -> Result<Url, ApiError> {
    base_url
        .join(download_url)
        .map_err(|e| ApiError::Decode(format!("bad download URL {download_url}: {e}")))
}
