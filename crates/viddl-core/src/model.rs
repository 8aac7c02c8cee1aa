//! Job requests, outcomes, and media metadata.

use std::fmt::{self, Display, Formatter};
use std::path::PathBuf;

use serde::Serialize;

use crate::error::JobResult;
use crate::validate::{TargetUrl, validate_format_id};

/// Opaque per-client identity used by the admission gates.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClientKey(String);

impl ClientKey {
    /// Wrap an identity string.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Identity used when no address could be determined.
    #[must_use]
    pub fn unknown() -> Self {
        Self("unknown".to_string())
    }

    /// Borrow the identity string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ClientKey {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.0)
    }
}

/// Audio codecs accepted for extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioCodec {
    /// MPEG layer 3.
    #[default]
    Mp3,
    /// AAC in an MP4 container.
    M4a,
    /// Raw AAC.
    Aac,
    /// Opus.
    Opus,
    /// Vorbis.
    Vorbis,
    /// FLAC.
    Flac,
    /// PCM WAV.
    Wav,
}

impl AudioCodec {
    /// Resolve a requested codec, falling back to mp3 for anything unknown.
    #[must_use]
    pub fn from_request(requested: Option<&str>) -> Self {
        match requested.map(|value| value.trim().to_ascii_lowercase()).as_deref() {
            Some("m4a") => Self::M4a,
            Some("aac") => Self::Aac,
            Some("opus") => Self::Opus,
            Some("vorbis") => Self::Vorbis,
            Some("flac") => Self::Flac,
            Some("wav") => Self::Wav,
            _ => Self::Mp3,
        }
    }

    /// Name passed to the extraction tool.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Mp3 => "mp3",
            Self::M4a => "m4a",
            Self::Aac => "aac",
            Self::Opus => "opus",
            Self::Vorbis => "vorbis",
            Self::Flac => "flac",
            Self::Wav => "wav",
        }
    }

    /// MIME type of the extracted file.
    #[must_use]
    pub const fn content_type(self) -> &'static str {
        match self {
            Self::Mp3 => "audio/mpeg",
            Self::M4a | Self::Aac => "audio/mp4",
            Self::Opus => "audio/opus",
            Self::Vorbis => "audio/ogg",
            Self::Flac => "audio/flac",
            Self::Wav => "audio/wav",
        }
    }
}

/// What a job produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    /// Download video, remuxed to mp4.
    Video,
    /// Extract audio in the given codec.
    Audio(AudioCodec),
    /// Describe the target without downloading it.
    Probe,
}

impl JobKind {
    /// Stable label for logs and metrics.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Video => "video",
            Self::Audio(_) => "audio",
            Self::Probe => "probe",
        }
    }
}

/// Requested video format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormatChoice {
    /// Best available, remuxed to mp4.
    Best,
    /// A tool-specific format identifier.
    Specific(String),
}

impl FormatChoice {
    /// Parse the optional format field of a request.
    ///
    /// Absent, empty, and `best` all select [`FormatChoice::Best`].
    ///
    /// # Errors
    ///
    /// Returns [`crate::JobError::InvalidInput`] when the identifier is not 1-20 ASCII
    /// alphanumerics.
    pub fn parse(raw: Option<&str>) -> JobResult<Self> {
        match raw.map(str::trim) {
            None | Some("" | "best") => Ok(Self::Best),
            Some(value) => {
                validate_format_id(value)?;
                Ok(Self::Specific(value.to_string()))
            }
        }
    }

    /// True when a specific format was requested.
    #[must_use]
    pub const fn is_specific(&self) -> bool {
        matches!(self, Self::Specific(_))
    }
}

/// One validated unit of work. Fields are fixed at construction.
#[derive(Debug, Clone)]
pub struct JobRequest {
    target: TargetUrl,
    format: FormatChoice,
    item_index: Option<u32>,
    kind: JobKind,
}

impl JobRequest {
    /// Assemble a request from validated parts; an index of zero means "none".
    #[must_use]
    pub fn new(
        target: TargetUrl,
        format: FormatChoice,
        item_index: Option<u32>,
        kind: JobKind,
    ) -> Self {
        Self {
            target,
            format,
            item_index: item_index.filter(|index| *index > 0),
            kind,
        }
    }

    /// Validated target.
    #[must_use]
    pub const fn target(&self) -> &TargetUrl {
        &self.target
    }

    /// Requested format.
    #[must_use]
    pub const fn format(&self) -> &FormatChoice {
        &self.format
    }

    /// One-based playlist position, when one was requested.
    #[must_use]
    pub const fn item_index(&self) -> Option<u32> {
        self.item_index
    }

    /// Operation kind.
    #[must_use]
    pub const fn kind(&self) -> JobKind {
        self.kind
    }
}

/// A produced file ready to be streamed to the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    /// Absolute path inside the temp directory.
    pub path: PathBuf,
    /// Size in bytes at the time the job finished.
    pub size: u64,
    /// MIME type derived from the job kind and file extension.
    pub content_type: &'static str,
    /// File name shown to the client, without the session prefix.
    pub display_name: String,
}

/// One selectable video quality.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FormatOption {
    /// Tool format identifier.
    pub format_id: String,
    /// Container served for this option.
    pub ext: String,
    /// Human label such as `1080p` or `4K`.
    pub quality: String,
    /// Size in bytes; see `size_estimated`.
    pub filesize: u64,
    /// True when `filesize` is a heuristic estimate rather than a tool value.
    pub size_estimated: bool,
}

/// Description of a single media item.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MediaInfo {
    /// Item title.
    pub title: String,
    /// Thumbnail URL.
    pub thumbnail: String,
    /// Duration in seconds when known.
    pub duration: Option<f64>,
    /// Uploader name.
    pub uploader: String,
    /// Selectable qualities, highest first as reported by the tool.
    pub formats: Vec<FormatOption>,
}

/// One entry of a multi-item listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MediaEntry {
    /// One-based position used for `video_index`.
    pub index: u32,
    /// Entry title.
    pub title: String,
    /// Thumbnail URL.
    pub thumbnail: String,
    /// Duration in seconds when known.
    pub duration: Option<f64>,
}

/// Summary returned when the target holds more than one item.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MultiItemSummary {
    /// Display title, e.g. `Multiple videos (4)`.
    pub title: String,
    /// Listed entries in tool order.
    pub entries: Vec<MediaEntry>,
}

impl MultiItemSummary {
    /// Build a summary titled after the number of entries.
    #[must_use]
    pub fn new(entries: Vec<MediaEntry>) -> Self {
        Self {
            title: format!("Multiple videos ({})", entries.len()),
            entries,
        }
    }
}

/// Result of a finished job.
#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    /// A downloaded or extracted file.
    Artifact(Artifact),
    /// Metadata for a single item.
    Info(MediaInfo),
    /// Listing for a multi-item target.
    MultiItem(MultiItemSummary),
}
