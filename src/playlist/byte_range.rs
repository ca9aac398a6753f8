//! `BYTERANGE` decoding
//!
//! A byte range is written `<length>[@<offset>]`. Without an offset the range
//! starts where the previous range of the same resource chain ended, so callers
//! carry the `next_start` of each decode into the following one.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Inclusive byte range within a resource
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ByteRange {
    /// First byte
    pub start: u64,
    /// Last byte (inclusive)
    pub end_inclusive: u64,
}

impl ByteRange {
    /// Number of bytes covered
    pub fn len(&self) -> u64 {
        self.end_inclusive - self.start + 1
    }

    /// Always false; zero-length ranges are rejected at decode time
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Value for an HTTP `Range` header
    pub fn header_value(&self) -> String {
        format!("bytes={}-{}", self.start, self.end_inclusive)
    }
}

/// Result of decoding one `BYTERANGE` value
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DecodedByteRange {
    /// First byte
    pub start: u64,
    /// Last byte (inclusive)
    pub end_inclusive: u64,
    /// Default start for the next range in the same chain
    pub next_start: u64,
}

impl DecodedByteRange {
    /// The range without chain bookkeeping
    pub fn range(&self) -> ByteRange {
        ByteRange {
            start: self.start,
            end_inclusive: self.end_inclusive,
        }
    }
}

/// Decode `<length>[@<offset>]`, defaulting the offset to `previous_end_exclusive`
pub fn decode(value: &str, previous_end_exclusive: u64) -> Result<DecodedByteRange> {
    let value = value.trim();
    let (length, offset) = match value.split_once('@') {
        Some((length, offset)) => (length, Some(offset)),
        None => (value, None),
    };

    let length = parse_number(length, value)?;
    if length == 0 {
        return Err(Error::MalformedPlaylist(format!(
            "zero-length byte range: {value:?}"
        )));
    }
    let start = match offset {
        Some(offset) => parse_number(offset, value)?,
        None => previous_end_exclusive,
    };

    let next_start = start.checked_add(length).ok_or_else(|| {
        Error::MalformedPlaylist(format!("byte range overflows: {value:?}"))
    })?;

    Ok(DecodedByteRange {
        start,
        end_inclusive: next_start - 1,
        next_start,
    })
}

fn parse_number(part: &str, whole: &str) -> Result<u64> {
    part.trim()
        .parse()
        .map_err(|_| Error::MalformedPlaylist(format!("invalid byte range: {whole:?}")))
}
