//! Request and response documents for the public API.

use serde::{Deserialize, Serialize};
use viddl_core::{FormatOption, MediaEntry, MediaInfo, MultiItemSummary};

/// RFC9457-compatible problem document surfaced on every error.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProblemDetails {
    /// Problem type URI.
    #[serde(rename = "type")]
    pub kind: String,
    /// Short constant summary.
    pub title: String,
    /// HTTP status code.
    pub status: u16,
    /// Client-safe explanation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// Fields that failed validation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invalid_params: Option<Vec<ProblemInvalidParam>>,
}

/// Invalid parameter pointer surfaced alongside a [`ProblemDetails`] payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProblemInvalidParam {
    /// JSON pointer into the request body.
    pub pointer: String,
    /// What was wrong with it.
    pub message: String,
}

/// Body accepted by the info, download, and audio endpoints.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct JobPayload {
    /// Target URL.
    #[serde(default)]
    pub url: String,
    /// Requested format identifier; absent or `best` selects the default.
    #[serde(default)]
    pub format: Option<String>,
    /// One-based playlist item; zero or absent means none.
    #[serde(default)]
    pub video_index: Option<u32>,
    /// Audio codec for extraction; unknown values fall back to mp3.
    #[serde(default)]
    pub audio_format: Option<String>,
}

/// Result of a metadata probe.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MediaInfoResponse {
    pub(crate) title: String,
    pub(crate) thumbnail: String,
    pub(crate) duration: Option<f64>,
    pub(crate) uploader: String,
    pub(crate) formats: Vec<FormatOption>,
    pub(crate) is_multi_video: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) multi_videos: Option<Vec<MediaEntry>>,
}

impl From<MediaInfo> for MediaInfoResponse {
    fn from(info: MediaInfo) -> Self {
        Self {
            title: info.title,
            thumbnail: info.thumbnail,
            duration: info.duration,
            uploader: info.uploader,
            formats: info.formats,
            is_multi_video: false,
            multi_videos: None,
        }
    }
}

impl From<MultiItemSummary> for MediaInfoResponse {
    fn from(summary: MultiItemSummary) -> Self {
        Self {
            title: summary.title,
            thumbnail: String::new(),
            duration: None,
            uploader: String::new(),
            formats: Vec::new(),
            is_multi_video: true,
            multi_videos: Some(summary.entries),
        }
    }
}

/// Liveness report.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct HealthResponse {
    pub(crate) status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) error: Option<&'static str>,
}
