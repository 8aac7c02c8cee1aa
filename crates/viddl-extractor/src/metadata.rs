//! Decoding of the tool's JSON output.
//!
//! Records are tolerant: every field is optional and unknown fields are ignored,
//! since the tool adds fields freely between releases.

use serde::{Deserialize, Deserializer};
use viddl_core::{JobError, JobResult, MediaEntry};

/// Single-item record from `--dump-json`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MediaRecord {
    /// Item title.
    #[serde(deserialize_with = "null_as_default")]
    pub title: String,
    /// Thumbnail URL.
    #[serde(deserialize_with = "null_as_default")]
    pub thumbnail: String,
    /// Duration in seconds.
    pub duration: Option<f64>,
    /// Uploader name.
    #[serde(deserialize_with = "null_as_default")]
    pub uploader: String,
    /// Available formats, in tool order.
    #[serde(deserialize_with = "null_as_default")]
    pub formats: Vec<FormatRecord>,
}

/// One entry of [`MediaRecord::formats`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FormatRecord {
    /// Tool format identifier.
    #[serde(deserialize_with = "null_as_default")]
    pub format_id: String,
    /// Free-form note (`storyboard`, `DASH video`, ...).
    pub format_note: Option<String>,
    /// Exact size in bytes.
    pub filesize: Option<f64>,
    /// Approximate size in bytes.
    pub filesize_approx: Option<f64>,
    /// Video codec; `none` for audio-only formats.
    pub vcodec: Option<String>,
    /// Frame height in pixels.
    pub height: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ListingRecord {
    #[serde(rename = "_type")]
    kind: Option<String>,
    #[serde(deserialize_with = "null_as_default")]
    title: String,
    #[serde(deserialize_with = "null_as_default")]
    thumbnail: String,
    duration: Option<f64>,
}

/// Explicit `null` decodes the same as an absent field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Decode a single-item record.
///
/// # Errors
///
/// Returns [`JobError::Metadata`] when `stdout` is not a JSON object.
pub fn parse_media_record(stdout: &str) -> JobResult<MediaRecord> {
    serde_json::from_str(stdout.trim()).map_err(|source| JobError::Metadata {
        operation: "probe.metadata",
        source,
    })
}

/// Decode a flat listing (one JSON object per line).
///
/// Entries are numbered by their position among non-blank lines, which is the
/// numbering `--playlist-items` understands. Lines that fail to decode or are
/// not `url`/`video` entries are skipped but still consume their position.
#[must_use]
pub fn parse_listing(stdout: &str) -> Vec<MediaEntry> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .zip(1_u32..)
        .filter_map(|(line, index)| {
            let record: ListingRecord = serde_json::from_str(line).ok()?;
            matches!(record.kind.as_deref(), Some("url" | "video")).then(|| MediaEntry {
                index,
                title: record.title,
                thumbnail: record.thumbnail,
                duration: record.duration,
            })
        })
        .collect()
}
