//! Attribute-list decoding for tags like `#EXT-X-STREAM-INF` and `#EXT-X-KEY`

use crate::error::{Error, Result};
use crate::playlist::Resolution;
use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;

static ATTRIBUTE: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r#"([A-Z0-9-]+)=(?:"([^"]*)"|([^,]*))"#).expect("attribute pattern is valid")
});

/// Decoded `KEY=value` pairs of one tag; quotes are stripped from quoted values
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AttributeList {
    values: HashMap<String, String>,
}

impl AttributeList {
    /// Parse the text following the tag's colon
    pub fn parse(input: &str) -> Self {
        let values = ATTRIBUTE
            .captures_iter(input)
            .filter_map(|caps| {
                let key = caps.get(1)?.as_str().to_string();
                let value = caps.get(2).or_else(|| caps.get(3))?.as_str().trim();
                Some((key, value.to_string()))
            })
            .collect();
        Self { values }
    }

    /// Raw value
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Decimal integer value; present but unparsable is an error
    pub fn get_u64(&self, key: &str) -> Result<Option<u64>> {
        self.get(key)
            .map(|v| {
                v.parse().map_err(|_| {
                    Error::MalformedPlaylist(format!("{key} is not an integer: {v:?}"))
                })
            })
            .transpose()
    }

    /// `<width>x<height>` value
    pub fn get_resolution(&self, key: &str) -> Result<Option<Resolution>> {
        let Some(value) = self.get(key) else {
            return Ok(None);
        };
        let invalid = || Error::MalformedPlaylist(format!("{key} is not WxH: {value:?}"));
        let (width, height) = value
            .split_once(['x', 'X'])
            .ok_or_else(invalid)?;
        Ok(Some(Resolution {
            width: width.trim().parse().map_err(|_| invalid())?,
            height: height.trim().parse().map_err(|_| invalid())?,
        }))
    }
}
