//! HLS playlist model and parsing
//!
//! A playlist is either a [`MasterPlaylist`] listing variant streams or a
//! [`MediaPlaylist`] listing the segments of one rendition. Parsing is a single
//! linear scan ([`parse_playlist`]); attribute lists and byte ranges are decoded
//! into typed values so nothing downstream looks up tags by string.
//!
//! # Submodules
//!
//! - [`attributes`]: `KEY=value` / `KEY="quoted"` attribute-list decoding
//! - [`byte_range`]: `<length>[@<offset>]` decoding with contiguous-offset tracking
//! - [`parser`]: the playlist scanner
//! - [`estimate`]: duration and output-size estimation

pub mod attributes;
pub mod byte_range;
pub mod estimate;
pub mod parser;

pub use byte_range::{ByteRange, DecodedByteRange};
pub use estimate::{EstimateSource, SizeEstimate};
pub use parser::parse_playlist;

use serde::{Deserialize, Serialize};
use std::cmp::Reverse;

/// A parsed playlist
#[derive(Clone, Debug, PartialEq)]
pub enum Playlist {
    /// Multi-variant playlist
    Master(MasterPlaylist),
    /// Segment list of a single rendition
    Media(MediaPlaylist),
}

/// Variant streams of a master playlist, in playlist order
#[derive(Clone, Debug, PartialEq)]
pub struct MasterPlaylist {
    /// Variants with a URI
    pub variants: Vec<Variant>,
}

impl MasterPlaylist {
    /// Variants in default selection order: tallest first, then highest bandwidth
    pub fn sorted_variants(&self) -> Vec<Variant> {
        let mut variants = self.variants.clone();
        variants.sort_by_key(|v| Reverse((v.height(), v.bandwidth())));
        variants
    }

    /// The variant chosen when the caller expresses no preference
    pub fn best_variant(&self) -> Option<&Variant> {
        self.variants
            .iter()
            .enumerate()
            // earlier entries win ties, matching a stable descending sort
            .max_by_key(|(i, v)| (v.height(), v.bandwidth(), Reverse(*i)))
            .map(|(_, v)| v)
    }
}

/// One `#EXT-X-STREAM-INF` entry
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variant {
    /// Absolute URL of the variant's media playlist
    pub url: String,
    /// `BANDWIDTH` (peak bits per second)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bandwidth_peak: Option<u64>,
    /// `AVERAGE-BANDWIDTH` (bits per second)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bandwidth_average: Option<u64>,
    /// `RESOLUTION`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution: Option<Resolution>,
    /// `CODECS`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub codecs: Option<String>,
}

impl Variant {
    /// Variant pointing at `url` with no attributes
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            bandwidth_peak: None,
            bandwidth_average: None,
            resolution: None,
            codecs: None,
        }
    }

    /// Average bandwidth when advertised, otherwise peak
    pub fn bandwidth(&self) -> Option<u64> {
        self.bandwidth_average.or(self.bandwidth_peak)
    }

    /// Height in pixels, when advertised
    pub fn height(&self) -> Option<u32> {
        self.resolution.map(|r| r.height)
    }
}

/// Video resolution in pixels
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resolution {
    /// Width
    pub width: u32,
    /// Height
    pub height: u32,
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Segment list of one rendition
#[derive(Clone, Debug, PartialEq)]
pub struct MediaPlaylist {
    /// Segments in playlist order
    pub segments: Vec<Segment>,
    /// `#EXT-X-MEDIA-SEQUENCE` (0 when absent)
    pub media_sequence: u64,
    /// Whether `#EXT-X-ENDLIST` was present
    pub end_list: bool,
    /// `#EXT-X-TARGETDURATION`, in seconds
    pub target_duration: Option<f64>,
}

impl MediaPlaylist {
    /// Sum of segment durations, in seconds
    pub fn total_duration(&self) -> f64 {
        self.segments.iter().map(|s| s.duration_seconds).sum()
    }

    /// Whether any segment declares AES-128 encryption
    pub fn has_encryption(&self) -> bool {
        self.segments
            .iter()
            .any(|s| s.key.as_ref().is_some_and(|k| k.method == KeyMethod::Aes128))
    }

    /// Whether segments are fragmented MP4
    ///
    /// True when any segment carries an init map or the first segment is `.m4s`.
    pub fn is_fmp4(&self) -> bool {
        self.segments.iter().any(|s| s.init_segment.is_some())
            || self.segments.first().is_some_and(|s| has_m4s_extension(&s.uri))
    }
}

fn has_m4s_extension(uri: &str) -> bool {
    let path = uri.split(['?', '#']).next().unwrap_or(uri);
    path.to_ascii_lowercase().ends_with(".m4s")
}

/// One media segment
#[derive(Clone, Debug, PartialEq)]
pub struct Segment {
    /// Absolute URL (or verbatim URI when the playlist had no URL base)
    pub uri: String,
    /// `#EXTINF` duration
    pub duration_seconds: f64,
    /// Sub-range of the resource holding this segment
    pub byte_range: Option<ByteRange>,
    /// Active `#EXT-X-KEY`, absent when unencrypted
    pub key: Option<EncryptionKey>,
    /// Active `#EXT-X-MAP`
    pub init_segment: Option<InitSegment>,
    /// Whether the init segment must be written before this segment
    pub needs_init_segment: bool,
}

/// An `#EXT-X-KEY` other than `METHOD=NONE`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncryptionKey {
    /// Encryption method
    pub method: KeyMethod,
    /// Absolute key URI
    pub uri: Option<String>,
    /// Raw `IV` attribute value
    pub iv_hex: Option<String>,
}

/// `METHOD` attribute of `#EXT-X-KEY`
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum KeyMethod {
    /// Whole-segment AES-128-CBC
    Aes128,
    /// Sample-level encryption (unsupported)
    SampleAes,
    /// Anything else (unsupported)
    Other(String),
}

impl KeyMethod {
    pub(crate) fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "NONE" | "" => None,
            "AES-128" => Some(KeyMethod::Aes128),
            "SAMPLE-AES" => Some(KeyMethod::SampleAes),
            other => Some(KeyMethod::Other(other.to_string())),
        }
    }

    /// Name as it appears in the playlist
    pub fn as_str(&self) -> &str {
        match self {
            KeyMethod::Aes128 => "AES-128",
            KeyMethod::SampleAes => "SAMPLE-AES",
            KeyMethod::Other(name) => name,
        }
    }
}

/// An `#EXT-X-MAP` initialization segment
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct InitSegment {
    /// Absolute URL
    pub uri: String,
    /// Sub-range of the resource holding the init segment
    pub byte_range: Option<ByteRange>,
}
