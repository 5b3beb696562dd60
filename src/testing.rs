//! Scripted in-memory [`JobApi`] used by the unit tests.

use crate::api::JobApi;
use crate::errors::ApiError;
use crate::models::{
    CleanupResponse, InfoResponse, JobId, StatusPayload, SubmitResponse, WireQuality,
};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

#[derive(Default)]
pub struct ScriptedApi {
    pub info: Mutex<Option<Result<InfoResponse, ApiError>>>,
    pub submits: Mutex<VecDeque<Result<SubmitResponse, ApiError>>>,
    /// Per job: replies handed out in order; the last one repeats forever.
    pub statuses: Mutex<HashMap<String, VecDeque<Result<StatusPayload, ApiError>>>>,
    pub status_delay: Mutex<HashMap<String, Duration>>,
    pub status_calls: Mutex<Vec<String>>,
    pub cleanup: Mutex<Option<Result<CleanupResponse, ApiError>>>,
}

impl ScriptedApi {
    pub fn with_info(self, info: InfoResponse) -> Self {
        *self.info.lock().unwrap() = Some(Ok(info));
        self
    }

    pub fn with_submit(self, reply: Result<SubmitResponse, ApiError>) -> Self {
        self.submits.lock().unwrap().push_back(reply);
        self
    }

    pub fn with_statuses(self, job: &str, replies: Vec<Result<StatusPayload, ApiError>>) -> Self {
        self.statuses
            .lock()
            .unwrap()
            .insert(job.to_string(), replies.into());
        self
    }

    pub fn with_status_delay(self, job: &str, delay: Duration) -> Self {
        self.status_delay
            .lock()
            .unwrap()
            .insert(job.to_string(), delay);
        self
    }

    pub fn calls_for(&self, job: &str) -> usize {
        self.status_calls
            .lock()
            .unwrap()
            .iter()
            .filter(|j| j.as_str() == job)
            .count()
    }
}

pub fn status(tag: &str) -> StatusPayload {
    StatusPayload {
        status: Some(tag.to_string()),
        ..Default::default()
    }
}

pub fn completed(url: &str) -> StatusPayload {
    StatusPayload {
        download_url: Some(url.to_string()),
        ..status("completed")
    }
}

pub fn failed(message: &str) -> StatusPayload {
    StatusPayload {
        error: Some(message.to_string()),
        ..status("error")
    }
}

pub fn two_variant_info() -> InfoResponse {
    InfoResponse {
        success: true,
        title: "Clip".to_string(),
        author: "Someone".to_string(),
        length: "3:07".to_string(),
        views: "1,024".to_string(),
        thumbnail: "https://i.ytimg.com/vi/abc/hq.jpg".to_string(),
        qualities: vec![
            WireQuality {
                value: "v1".to_string(),
                label: "Video (720p) - 20.0MB".to_string(),
                kind: Some("video".to_string()),
                stream_type: Some("progressive".to_string()),
            },
            WireQuality {
                value: "v2".to_string(),
                label: "Audio Only (WEBM) - 3.1MB".to_string(),
                kind: Some("audio".to_string()),
                stream_type: None,
            },
        ],
        ..Default::default()
    }
}

#[async_trait]
impl JobApi for ScriptedApi {
    async fn get_info(&self, _url: &str) -> Result<InfoResponse, ApiError> {
        self.info
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| Err(ApiError::Connection("no info scripted".to_string())))
    }

    async fn submit(&self, _url: &str, _quality: &str) -> Result<SubmitResponse, ApiError> {
        self.submits
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ApiError::Connection("no submit scripted".to_string())))
    }

    async fn status(&self, job_id: &JobId) -> Result<StatusPayload, ApiError> {
        self.status_calls
            .lock()
            .unwrap()
            .push(job_id.to_string());

        let delay = self.status_delay.lock().unwrap().get(job_id.as_str()).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut statuses = self.statuses.lock().unwrap();
        let replies = statuses
            .get_mut(job_id.as_str())
            .ok_or_else(|| ApiError::Status {
                code: 404,
                message: "Download not found".to_string(),
            })?;
        if replies.len() > 1 {
            replies.pop_front().unwrap_or_else(|| Ok(status("processing")))
        } else {
            replies
                .front()
                .cloned()
                .unwrap_or_else(|| Ok(status("processing")))
        }
    }

    async fn cleanup(&self) -> Result<CleanupResponse, ApiError> {
        self.cleanup
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| Err(ApiError::Connection("no cleanup scripted".to_string())))
    }
}

/// Throwaway HTTP/1.1 server answering every request with the same response.
pub struct CannedServer {
    pub addr: SocketAddr,
    requests: Arc<Mutex<Vec<String>>>,
}

impl CannedServer {
    /// Request lines seen so far, as `METHOD /path`.
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

pub async fn serve_canned(status_line: &'static str, body: &'static str) -> CannedServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let requests = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&requests);

    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                return;
            };
            let seen = Arc::clone(&seen);
            tokio::spawn(async move {
                let mut buf = vec![0u8; 8192];
                let mut read = 0;
                let header_end = loop {
                    let n = socket.read(&mut buf[read..]).await.unwrap_or(0);
                    if n == 0 {
                        return;
                    }
                    read += n;
                    if let Some(pos) = buf[..read].windows(4).position(|w| w == b"\r\n\r\n") {
                        break pos + 4;
                    }
                };

                let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
                let content_length = head
                    .lines()
                    .find_map(|l| l.to_lowercase().strip_prefix("content-length:").map(|v| v.trim().to_string()))
                    .and_then(|v| v.parse::<usize>().ok())
                    .unwrap_or(0);
                while read < header_end + content_length {
                    let n = socket.read(&mut buf[read..]).await.unwrap_or(0);
                    if n == 0 {
                        break;
                    }
                    read += n;
                }

                let request_line: Vec<&str> = head
                    .lines()
                    .next()
                    .unwrap_or_default()
                    .split_whitespace()
                    .take(2)
                    .collect();
                seen.lock().unwrap().push(request_line.join(" "));

                let response = format!(
                    "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status_line,
                    body.len(),
                    body
                );
                socket.write_all(response.as_bytes()).await.ok();
                socket.shutdown().await.ok();
            });
        }
    });

    CannedServer { addr, requests }
}
