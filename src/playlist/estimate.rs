//! Output size estimation
//!
//! Exact when every segment (and every distinct init segment) is addressed by a
//! byte range; otherwise derived from the variant's advertised bandwidth for VOD
//! playlists; otherwise unknown.

use super::{MediaPlaylist, Variant};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// How a [`SizeEstimate`] was obtained
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EstimateSource {
    /// Sum of byte ranges
    Byterange,
    /// Bandwidth multiplied by duration
    AvgBw,
    /// Not enough information
    Unknown,
}

/// Estimated output size
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SizeEstimate {
    /// Estimated bytes, when known
    pub bytes: Option<u64>,
    /// Total duration in seconds
    pub seconds: f64,
    /// Whether the playlist is terminated
    pub vod: bool,
    /// Estimation method
    pub via: EstimateSource,
}

impl SizeEstimate {
    /// Estimate for `media`, using `variant`'s bandwidth as a fallback
    pub fn for_media(media: &MediaPlaylist, variant: Option<&Variant>) -> Self {
        let seconds = media.total_duration();
        let vod = media.end_list;

        if let Some(bytes) = exact_bytes(media) {
            return Self {
                bytes: Some(bytes),
                seconds,
                vod,
                via: EstimateSource::Byterange,
            };
        }

        match variant.and_then(Variant::bandwidth) {
            Some(bandwidth) if vod && bandwidth > 0 && seconds > 0.0 => Self {
                bytes: Some((bandwidth as f64 / 8.0 * seconds).round() as u64),
                seconds,
                vod,
                via: EstimateSource::AvgBw,
            },
            _ => Self {
                bytes: None,
                seconds,
                vod,
                via: EstimateSource::Unknown,
            },
        }
    }
}

/// Sum of all segment ranges plus each distinct init range, or `None` when any
/// segment or required init segment lacks a range or the sum overflows
pub fn exact_bytes(media: &MediaPlaylist) -> Option<u64> {
    let mut total = 0u64;
    let mut seen_init = HashSet::new();

    for segment in &media.segments {
        total = total.checked_add(segment.byte_range?.len())?;

        if segment.needs_init_segment {
            if let Some(init) = &segment.init_segment {
                let range = init.byte_range?;
                if seen_init.insert((init.uri.as_str(), range)) {
                    total = total.checked_add(range.len())?;
                }
            }
        }
    }
    Some(total)
}

/// Human-readable size, e.g. `1.2 GB`
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else if value >= 100.0 {
        format!("{value:.0} {}", UNITS[unit])
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}
