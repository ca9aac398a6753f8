//! Playlist scanner
//!
//! One pass over the lines. Per-segment tags (`#EXTINF`, `#EXT-X-BYTERANGE`)
//! are held until the next URI line; `#EXT-X-KEY` and `#EXT-X-MAP` stay active
//! until redefined. A second pass marks where the init segment changes.

use super::attributes::AttributeList;
use super::byte_range;
use super::{
    EncryptionKey, InitSegment, KeyMethod, MasterPlaylist, MediaPlaylist, Playlist, Segment,
    Variant,
};
use crate::error::{Error, Result};
use url::Url;

const STREAM_INF: &str = "#EXT-X-STREAM-INF:";
const EXTINF: &str = "#EXTINF:";
const BYTERANGE: &str = "#EXT-X-BYTERANGE:";
const KEY: &str = "#EXT-X-KEY:";
const MAP: &str = "#EXT-X-MAP:";
const MEDIA_SEQUENCE: &str = "#EXT-X-MEDIA-SEQUENCE:";
const TARGET_DURATION: &str = "#EXT-X-TARGETDURATION:";
const ENDLIST: &str = "#EXT-X-ENDLIST";

/// Parse playlist text fetched from `base_url`
///
/// Relative URIs are resolved against `base_url`. When `base_url` is not an
/// absolute URL (an in-memory playlist, for instance) URIs are kept verbatim.
pub fn parse_playlist(text: &str, base_url: &str) -> Result<Playlist> {
    let resolver = UriResolver::new(base_url);
    let lines: Vec<&str> = text
        .trim_start_matches('\u{feff}')
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();

    if !lines.iter().any(|line| line.starts_with("#EXT")) {
        return Err(Error::MalformedPlaylist(
            "no HLS tags found".to_string(),
        ));
    }

    if lines.iter().any(|line| line.starts_with(STREAM_INF)) {
        return parse_master(&lines, &resolver).map(Playlist::Master);
    }

    if lines
        .iter()
        .any(|line| line.starts_with(EXTINF) || line.starts_with(TARGET_DURATION))
    {
        return parse_media(&lines, &resolver).map(Playlist::Media);
    }

    Err(Error::MalformedPlaylist(
        "neither a master nor a media playlist".to_string(),
    ))
}

fn parse_master(lines: &[&str], resolver: &UriResolver) -> Result<MasterPlaylist> {
    let mut variants = Vec::new();
    let mut pending: Option<AttributeList> = None;

    for line in lines {
        if let Some(rest) = line.strip_prefix(STREAM_INF) {
            pending = Some(AttributeList::parse(rest));
        } else if line.starts_with('#') {
            continue;
        } else if let Some(attrs) = pending.take() {
            variants.push(Variant {
                url: resolver.resolve(line)?,
                bandwidth_peak: attrs.get_u64("BANDWIDTH")?,
                bandwidth_average: attrs.get_u64("AVERAGE-BANDWIDTH")?,
                resolution: attrs.get_resolution("RESOLUTION")?,
                codecs: attrs.get("CODECS").map(str::to_string),
            });
        }
    }

    if variants.is_empty() {
        return Err(Error::NoVariants);
    }
    Ok(MasterPlaylist { variants })
}

fn parse_media(lines: &[&str], resolver: &UriResolver) -> Result<MediaPlaylist> {
    let mut segments = Vec::new();
    let mut media_sequence = 0;
    let mut end_list = false;
    let mut target_duration = None;

    let mut pending_duration: Option<f64> = None;
    let mut pending_range = None;
    let mut active_key: Option<EncryptionKey> = None;
    let mut active_map: Option<InitSegment> = None;

    // media ranges and init-map ranges address different resources
    let mut media_next = 0;
    let mut map_next = 0;

    for line in lines {
        if let Some(rest) = line.strip_prefix(EXTINF) {
            let duration = rest.split(',').next().unwrap_or_default().trim();
            pending_duration = Some(parse_f64(duration, "EXTINF")?);
        } else if let Some(rest) = line.strip_prefix(BYTERANGE) {
            pending_range = Some(byte_range::decode(rest, media_next)?);
        } else if let Some(rest) = line.strip_prefix(KEY) {
            active_key = parse_key(rest, resolver)?;
        } else if let Some(rest) = line.strip_prefix(MAP) {
            let attrs = AttributeList::parse(rest);
            let uri = attrs.get("URI").ok_or_else(|| {
                Error::MalformedPlaylist("EXT-X-MAP without URI".to_string())
            })?;
            let range = match attrs.get("BYTERANGE") {
                Some(value) => {
                    let decoded = byte_range::decode(value, map_next)?;
                    map_next = decoded.next_start;
                    Some(decoded.range())
                }
                None => None,
            };
            active_map = Some(InitSegment {
                uri: resolver.resolve(uri)?,
                byte_range: range,
            });
        } else if let Some(rest) = line.strip_prefix(MEDIA_SEQUENCE) {
            media_sequence = rest.trim().parse().map_err(|_| {
                Error::MalformedPlaylist(format!("invalid EXT-X-MEDIA-SEQUENCE: {rest:?}"))
            })?;
        } else if let Some(rest) = line.strip_prefix(TARGET_DURATION) {
            target_duration = Some(parse_f64(rest.trim(), "EXT-X-TARGETDURATION")?);
        } else if line.starts_with(ENDLIST) {
            end_list = true;
        } else if line.starts_with('#') {
            continue;
        } else {
            let byte_range = match pending_range.take() {
                Some(decoded) => {
                    media_next = decoded.next_start;
                    Some(decoded.range())
                }
                None => {
                    media_next = 0;
                    None
                }
            };
            segments.push(Segment {
                uri: resolver.resolve(line)?,
                duration_seconds: pending_duration.take().unwrap_or(0.0),
                byte_range,
                key: active_key.clone(),
                init_segment: active_map.clone(),
                needs_init_segment: false,
            });
        }
    }

    if segments.is_empty() {
        return Err(Error::EmptyMedia);
    }
    mark_init_changes(&mut segments);

    Ok(MediaPlaylist {
        segments,
        media_sequence,
        end_list,
        target_duration,
    })
}

fn parse_key(rest: &str, resolver: &UriResolver) -> Result<Option<EncryptionKey>> {
    let attrs = AttributeList::parse(rest);
    let method = attrs
        .get("METHOD")
        .ok_or_else(|| Error::MalformedPlaylist("EXT-X-KEY without METHOD".to_string()))?;
    let Some(method) = KeyMethod::parse(method) else {
        return Ok(None);
    };
    Ok(Some(EncryptionKey {
        method,
        uri: attrs.get("URI").map(|uri| resolver.resolve(uri)).transpose()?,
        iv_hex: attrs.get("IV").map(str::to_string),
    }))
}

/// Set `needs_init_segment` where the `(uri, range)` signature differs from
/// the last segment that carried a map
fn mark_init_changes(segments: &mut [Segment]) {
    let mut previous: Option<InitSegment> = None;
    for segment in segments {
        if let Some(init) = &segment.init_segment {
            if previous.as_ref() != Some(init) {
                segment.needs_init_segment = true;
                previous = Some(init.clone());
            }
        }
    }
}

fn parse_f64(value: &str, tag: &str) -> Result<f64> {
    value
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && *v >= 0.0)
        .ok_or_else(|| Error::MalformedPlaylist(format!("invalid {tag} value: {value:?}")))
}

struct UriResolver {
    base: Option<Url>,
}

impl UriResolver {
    fn new(base_url: &str) -> Self {
        Self {
            base: Url::parse(base_url).ok().filter(|url| !url.cannot_be_a_base()),
        }
    }

    fn resolve(&self, uri: &str) -> Result<String> {
        match &self.base {
            Some(base) => base
                .join(uri)
                .map(String::from)
                .map_err(|e| Error::MalformedPlaylist(format!("invalid URI {uri:?}: {e}"))),
            None => Ok(uri.to_string()),
        }
    }
}
