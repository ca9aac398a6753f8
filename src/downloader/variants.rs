//! Variant picker data: sorted variants with labels and size estimates.

use super::HlsDownloader;
use crate::error::{Error, Result};
use crate::playlist::estimate::format_bytes;
use crate::playlist::{Playlist, SizeEstimate, Variant, parse_playlist};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Variant playlists probed at once while building options
const PROBE_CONCURRENCY: usize = 2;

/// One selectable variant
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VariantOption {
    /// The variant itself, usable with [`VariantChoice::Use`](super::VariantChoice::Use)
    pub variant: Variant,
    /// Display label, e.g. `1920x1080 • 5000k • ~1.2 GB`
    pub label: String,
    /// Size estimate from the variant's media playlist, absent when it could not be read
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<SizeEstimate>,
}

/// Label for `variant`, with `bytes` as the estimated size when known
pub fn variant_label(variant: &Variant, bytes: Option<u64>) -> String {
    let mut parts = Vec::with_capacity(3);
    if let Some(resolution) = variant.resolution {
        parts.push(resolution.to_string());
    }
    if let Some(bandwidth) = variant.bandwidth().filter(|b| *b > 0) {
        parts.push(format!("{}k", (bandwidth as f64 / 1000.0).round() as u64));
    }
    if let Some(bytes) = bytes {
        parts.push(format!("~{}", format_bytes(bytes)));
    }

    if parts.is_empty() {
        "Video Stream".to_string()
    } else {
        parts.join(" • ")
    }
}

impl HlsDownloader {
    /// Variants of the master playlist at `url`, best first, with labels and
    /// size estimates
    ///
    /// Each variant's media playlist is fetched (through the text cache) to
    /// estimate its size; a variant whose playlist cannot be read is still
    /// listed, without a size. A media playlist URL yields a single option.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use hls_dl::*;
    /// # async fn example(downloader: HlsDownloader) -> Result<()> {
    /// let options = downloader.variant_options("https://cdn.example.com/master.m3u8").await?;
    /// for option in &options {
    ///     println!("{}", option.label);
    /// }
    /// let chosen = DownloadRequest::new("https://cdn.example.com/master.m3u8")
    ///     .with_variant(options[0].variant.clone());
    /// # Ok(())
    /// # }
    /// ```
    pub async fn variant_options(&self, url: &str) -> Result<Vec<VariantOption>> {
        let master = match self.probe(url).await? {
            Playlist::Master(master) => master,
            Playlist::Media(media) => {
                let variant = Variant::new(url);
                let size = SizeEstimate::for_media(&media, None);
                return Ok(vec![VariantOption {
                    label: variant_label(&variant, size.bytes),
                    variant,
                    size: Some(size),
                }]);
            }
        };

        let options: Vec<VariantOption> = stream::iter(master.sorted_variants())
            .map(|variant| async move {
                let size = match self.estimate_variant(&variant).await {
                    Ok(size) => Some(size),
                    Err(e) => {
                        debug!(url = %variant.url, error = %e, "variant size unavailable");
                        None
                    }
                };
                VariantOption {
                    label: variant_label(&variant, size.and_then(|s| s.bytes)),
                    variant,
                    size,
                }
            })
            .buffered(PROBE_CONCURRENCY)
            .collect()
            .await;
        Ok(options)
    }

    async fn estimate_variant(&self, variant: &Variant) -> Result<SizeEstimate> {
        let text = self.fetcher.get_text(&variant.url).await?;
        match parse_playlist(&text, &variant.url)? {
            Playlist::Media(media) => Ok(SizeEstimate::for_media(&media, Some(variant))),
            Playlist::Master(_) => Err(Error::MalformedPlaylist(
                "variant URL points to another master playlist".to_string(),
            )),
        }
    }
}
