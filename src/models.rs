use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque identifier of a backend job, handed out by `POST /download`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VariantKind {
    AudioOnly,
    VideoWithAudio,
}

impl VariantKind {
    fn from_wire(kind: Option<&str>) -> Self {
        match kind {
            Some("audio") => Self::AudioOnly,
            _ => Self::VideoWithAudio,
        }
    }
}

impl fmt::Display for VariantKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AudioOnly => f.write_str("audio only"),
            Self::VideoWithAudio => f.write_str("video with audio"),
        }
    }
}

/// One retrievable rendition of the media.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantOption {
    pub id: String,
    pub label: String,
    pub kind: VariantKind,
    /// `adaptive` or `progressive`, when the backend says so
    pub stream_type: Option<String>,
}

/// Descriptive metadata for a validated reference. `variants` is never empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoInfo {
    pub title: String,
    pub author: String,
    pub length: String,
    pub views: String,
    pub thumbnail: String,
    pub variants: Vec<VariantOption>,
}

impl VideoInfo {
    pub fn variant(&self, id: &str) -> Option<&VariantOption> {
        self.variants.iter().find(|v| v.id == id)
    }
}

// Wire payloads

#[derive(Debug, Clone, Serialize)]
pub struct InfoRequest<'a> {
    pub url: &'a str,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubmitRequest<'a> {
    pub url: &'a str,
    pub quality: &'a str,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WireQuality {
    pub value: String,
    #[serde(default)]
    pub label: String,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub stream_type: Option<String>,
}

impl From<WireQuality> for VariantOption {
    fn from(q: WireQuality) -> Self {
        Self {
            kind: VariantKind::from_wire(q.kind.as_deref()),
            label: if q.label.is_empty() { q.value.clone() } else { q.label },
            id: q.value,
            stream_type: q.stream_type,
        }
    }
}

/// Body of `POST /get_info`, both the success and the failure shape.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InfoResponse {
    #[serde(default)]
    pub success: bool,
    pub error: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub length: String,
    #[serde(default)]
    pub views: String,
    #[serde(default)]
    pub thumbnail: String,
    #[serde(default)]
    pub qualities: Vec<WireQuality>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubmitResponse {
    #[serde(default)]
    pub success: bool,
    pub download_id: Option<String>,
    pub message: Option<String>,
    pub error: Option<String>,
}

/// Body of `GET /status/{id}`. Every field is optional; unknown fields are ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusPayload {
    pub status: Option<String>,
    pub title: Option<String>,
    pub resolution: Option<String>,
    /// Megabytes
    pub filesize: Option<f64>,
    pub download_url: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CleanupResponse {
    #[serde(default)]
    pub success: bool,
    pub message: Option<String>,
    #[serde(default)]
    pub deleted_files: Vec<String>,
    pub error: Option<String>,
}
