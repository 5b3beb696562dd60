use crate::models::StatusPayload;
use serde::{Deserialize, Serialize};
use std::fmt;

const DEFAULT_ERROR_MESSAGE: &str = "Unknown error";
const MISSING_URL_MESSAGE: &str = "backend reported completion without a download URL";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatusPhase {
    Idle,
    Processing,
    Downloading,
    Completed,
    Error,
    Unknown,
}

impl StatusPhase {
    /// Only these two phases end a polling activity.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Error)
    }
}

impl fmt::Display for StatusPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Processing => "processing",
            Self::Downloading => "downloading",
            Self::Completed => "completed",
            Self::Error => "error",
            Self::Unknown => "preparing",
        };
        f.write_str(name)
    }
}

/// Status tags the server is known to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusTag {
    Processing,
    Downloading,
    Completed,
    Error,
    Other(String),
}

impl StatusTag {
    pub fn parse(raw: Option<&str>) -> Self {
        match raw {
            Some("processing") => Self::Processing,
            Some("downloading") => Self::Downloading,
            Some("completed") => Self::Completed,
            Some("error") => Self::Error,
            other => Self::Other(other.unwrap_or_default().to_string()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobDetail {
    pub title: Option<String>,
    pub resolution: Option<String>,
    pub filesize_mb: Option<f64>,
    pub error_message: Option<String>,
}

/// Normalized view of one status payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Progress {
    pub phase: StatusPhase,
    pub percent: u8,
    pub label: String,
    pub detail: JobDetail,
    pub download_url: Option<String>,
}

fn failed(detail: &mut JobDetail, message: String) -> (StatusPhase, u8, String, Option<String>) {
    let label = format!("Error: {message}");
    detail.error_message = Some(message);
    (StatusPhase::Error, 0, label, None)
}

fn non_empty(value: Option<&String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty()).cloned()
}

pub fn normalize(payload: &StatusPayload) -> Progress {
    let mut detail = JobDetail {
        title: non_empty(payload.title.as_ref()),
        resolution: non_empty(payload.resolution.as_ref()),
        filesize_mb: payload.filesize,
        error_message: None,
    };

    let (phase, percent, label, download_url) = match StatusTag::parse(payload.status.as_deref())
    {
        StatusTag::Processing => (
            StatusPhase::Processing,
            25,
            "Fetching video information".to_string(),
            None,
        ),
        StatusTag::Downloading => (
            StatusPhase::Downloading,
            50,
            "Downloading video".to_string(),
            None,
        ),
        StatusTag::Completed => match non_empty(payload.download_url.as_ref()) {
            Some(url) => (
                StatusPhase::Completed,
                100,
                "Download complete".to_string(),
                Some(url),
            ),
            None => failed(&mut detail, MISSING_URL_MESSAGE.to_string()),
        },
        StatusTag::Error => {
            let message = non_empty(payload.error.as_ref())
                .unwrap_or_else(|| DEFAULT_ERROR_MESSAGE.to_string());
            failed(&mut detail, message)
        }
        StatusTag::Other(_) => (
            StatusPhase::Unknown,
            10,
            "Preparing download".to_string(),
            None,
        ),
    };

    Progress {
        phase,
        percent,
        label,
        detail,
        download_url,
    }
}
