//! Selectable quality enumeration for probe results.
//!
//! # Design
//! - One option per distinct frame height, first occurrence wins, capped at
//!   [`MAX_FORMAT_OPTIONS`].
//! - Sizes the tool does not report are estimated. Estimates are advisory only;
//!   they are flagged with `size_estimated` and never used for limits.

use viddl_core::FormatOption;

use crate::metadata::{FormatRecord, MediaRecord};

/// Upper bound on options returned for one item.
pub const MAX_FORMAT_OPTIONS: usize = 15;

/// How to estimate a size the tool did not report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeHeuristic {
    /// `height² × 100` bytes.
    Resolution,
    /// `duration × height × 200` bytes, or `height² × 80` without a duration.
    /// For providers whose reported durations are reliable.
    Duration,
}

/// Human label for a frame height.
#[must_use]
pub fn quality_label(height: u32) -> String {
    const BREAKPOINTS: &[(u32, &str)] = &[
        (2160, "4K"),
        (1440, "1440p"),
        (1080, "1080p"),
        (720, "720p"),
        (480, "480p"),
        (360, "360p"),
        (240, "240p"),
        (144, "144p"),
    ];
    BREAKPOINTS
        .iter()
        .find(|(min, _)| height >= *min)
        .map_or_else(|| format!("{height}p"), |(_, label)| (*label).to_string())
}

/// Estimated size in bytes for a format of `height` pixels.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn estimate_size(height: u32, duration: Option<f64>, heuristic: SizeHeuristic) -> u64 {
    let h = u64::from(height);
    match (heuristic, duration) {
        (SizeHeuristic::Duration, Some(secs)) if secs > 0.0 => {
            (secs * f64::from(height) * 200.0) as u64
        }
        (SizeHeuristic::Duration, _) => h * h * 80,
        (SizeHeuristic::Resolution, _) => h * h * 100,
    }
}

/// Video options for `record`, in tool order.
#[must_use]
pub fn enumerate_video_formats(record: &MediaRecord, heuristic: SizeHeuristic) -> Vec<FormatOption> {
    let mut seen = Vec::new();
    let mut options = Vec::new();
    for format in &record.formats {
        let Some(height) = usable_height(format) else {
            continue;
        };
        if seen.contains(&height) {
            continue;
        }
        seen.push(height);

        let reported = format.filesize.or(format.filesize_approx).filter(|size| *size > 0.0);
        let (filesize, size_estimated) = reported.map_or_else(
            || (estimate_size(height, record.duration, heuristic), true),
            |size| (to_bytes(size), false),
        );
        options.push(FormatOption {
            format_id: format.format_id.clone(),
            ext: "mp4".into(),
            quality: quality_label(height),
            filesize,
            size_estimated,
        });
        if options.len() >= MAX_FORMAT_OPTIONS {
            break;
        }
    }
    options
}

fn usable_height(format: &FormatRecord) -> Option<u32> {
    let codec = format.vcodec.as_deref().unwrap_or_default();
    if codec.is_empty() || codec == "none" {
        return None;
    }
    let storyboard = format
        .format_note
        .as_deref()
        .is_some_and(|note| note.to_lowercase().contains("storyboard"));
    if storyboard {
        return None;
    }
    format
        .height
        .filter(|height| *height > 0)
        .and_then(|height| u32::try_from(height).ok())
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
const fn to_bytes(size: f64) -> u64 {
    size as u64
}
