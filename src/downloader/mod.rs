//! Core downloader implementation split into focused submodules.
//!
//! The `HlsDownloader` struct and its methods are organized by domain:
//! - [`control`] - Session control handles (pause/resume/cancel/wait)
//! - [`variants`] - Variant picker data with labels and size estimates
//! - [`session`] - Segment scheduling, ordered writing and finalization

mod control;
mod reservations;
mod session;
mod variants;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

pub use control::{DownloadHandle, SessionController};
pub use variants::{VariantOption, variant_label};

use crate::config::Config;
use crate::crypto::KeyStore;
use crate::error::{Error, Result};
use crate::fetch::{
    CachingFetcher, Fetcher, HttpFetcher, OnceMap, ResourceMeta, ResourceStore, StoreFetcher,
};
use crate::output::open_sink;
use crate::playlist::{MediaPlaylist, Playlist, Variant, parse_playlist};
use crate::retry::RetryBudget;
use crate::types::{Container, DownloadId, Event, PlaylistKind, SessionState};
use crate::utils::output_file_name;
use reservations::PathReservations;
use session::{SessionContext, run_session};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Event channel capacity; slow subscribers miss events beyond this
const EVENT_CHANNEL_CAPACITY: usize = 1000;

/// Which variant of a master playlist to download
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum VariantChoice {
    /// Highest resolution, then highest bandwidth (default)
    #[default]
    Best,
    /// A variant picked beforehand, e.g. from [`HlsDownloader::variant_options`]
    Use(Variant),
}

/// What to download
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DownloadRequest {
    /// Master or media playlist URL
    pub url: String,
    /// Variant selection, ignored for media playlists
    pub variant: VariantChoice,
    /// Title used for the output file name (default: `video`)
    pub title: Option<String>,
}

impl DownloadRequest {
    /// Download the best variant of `url`
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            variant: VariantChoice::Best,
            title: None,
        }
    }

    /// Download `variant` instead of the best one
    pub fn with_variant(mut self, variant: Variant) -> Self {
        self.variant = VariantChoice::Use(variant);
        self
    }

    /// Name the output file after `title`
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

/// Main downloader instance (cloneable - all fields are Arc-wrapped)
///
/// One downloader can run any number of concurrent sessions; they share the
/// playlist and metadata caches and the event channel.
#[derive(Clone)]
pub struct HlsDownloader {
    /// Configuration (wrapped in Arc for sharing across tasks)
    pub(crate) config: Arc<Config>,
    /// Playlist/segment source, wrapped in the caching layer
    pub(crate) fetcher: Arc<dyn Fetcher>,
    /// Event broadcast channel sender (multiple subscribers supported)
    pub(crate) event_tx: broadcast::Sender<Event>,
    /// Next session ID
    pub(crate) next_id: Arc<AtomicU64>,
    /// In-memory resources served ahead of the fetcher
    pub(crate) resources: ResourceStore,
    /// Output paths owned by running sessions
    pub(crate) reservations: PathReservations,
}

impl HlsDownloader {
    /// Create a downloader that fetches over HTTP
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use hls_dl::*;
    /// # async fn example() -> Result<()> {
    /// let downloader = HlsDownloader::new(Config::default())?;
    /// let handle = downloader
    ///     .start(DownloadRequest::new("https://cdn.example.com/master.m3u8").with_title("Keynote"))
    ///     .await?;
    /// let outcome = handle.wait().await?;
    /// println!("saved {}", outcome.path.display());
    /// # Ok(())
    /// # }
    /// ```
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let http = HttpFetcher::new(&config.http)?;
        Self::with_fetcher(config, http)
    }

    /// Create a downloader on top of a custom [`Fetcher`]
    ///
    /// The fetcher is wrapped in the playlist/metadata caches, behind the
    /// in-memory [`ResourceStore`].
    pub fn with_fetcher(config: Config, fetcher: impl Fetcher + 'static) -> Result<Self> {
        config.validate()?;
        let cached = CachingFetcher::new(fetcher, &config.cache)?;
        let resources = ResourceStore::new();
        let (event_tx, _rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Ok(Self {
            config: Arc::new(config),
            fetcher: Arc::new(StoreFetcher::new(cached, resources.clone())),
            event_tx,
            next_id: Arc::new(AtomicU64::new(1)),
            resources,
            reservations: PathReservations::new(),
        })
    }

    /// Registry of in-memory resources
    ///
    /// Anything registered here (playlist text, segments, keys) is served
    /// from memory under its handle instead of being fetched.
    ///
    /// ```no_run
    /// # use hls_dl::*;
    /// # async fn example(downloader: HlsDownloader) -> Result<()> {
    /// let playlist = downloader.resources().register(
    ///     "#EXTM3U\n#EXT-X-TARGETDURATION:4\n#EXTINF:4,\nhttps://cdn.example.com/0.ts\n#EXT-X-ENDLIST\n",
    /// );
    /// let outcome = downloader.start(DownloadRequest::new(playlist)).await?.wait().await?;
    /// println!("saved {}", outcome.path.display());
    /// # Ok(())
    /// # }
    /// ```
    pub fn resources(&self) -> &ResourceStore {
        &self.resources
    }

    /// Subscribe to events from every session of this downloader
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Active configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Fetch and parse the playlist at `url`
    pub async fn probe(&self, url: &str) -> Result<Playlist> {
        let text = self.fetcher.get_text(url).await?;
        parse_playlist(&text, url)
    }

    /// Size and type of the resource at `url`, without downloading it
    pub async fn resource_meta(&self, url: &str) -> Result<ResourceMeta> {
        self.fetcher.head(url).await
    }

    /// Resolve the request and spawn its session
    ///
    /// Resolution steps, all before any segment is requested:
    /// 1. Fetch and parse the root playlist
    /// 2. For a master playlist, pick the variant and fetch its media playlist
    /// 3. Reject live (non-terminated) playlists
    /// 4. Derive the container and a collision-free output path
    /// 5. Open the output sink
    ///
    /// A failure in any step is returned here (and emitted as
    /// [`Event::Failed`]); failures after that are reported by
    /// [`DownloadHandle::wait`].
    pub async fn start(&self, request: DownloadRequest) -> Result<DownloadHandle> {
        let id = DownloadId(self.next_id.fetch_add(1, Ordering::Relaxed));
        match self.spawn_session(id, request).await {
            Ok(handle) => Ok(handle),
            Err(e) => {
                warn!(download_id = id.0, error = %e, "download could not start");
                self.event_tx
                    .send(Event::Failed {
                        id,
                        category: e.category(),
                        error: e.to_string(),
                    })
                    .ok();
                Err(e)
            }
        }
    }

    async fn spawn_session(
        &self,
        id: DownloadId,
        request: DownloadRequest,
    ) -> Result<DownloadHandle> {
        let (media, variant) = self.resolve_media(id, &request).await?;
        if !media.end_list {
            return Err(Error::LivePlaylist);
        }

        let container = if media.is_fmp4() {
            Container::Mp4
        } else {
            Container::Ts
        };
        let resolution = variant.as_ref().and_then(|v| v.resolution);
        let file_name = output_file_name(request.title.as_deref(), resolution, container);
        let claim = self.reservations.claim(
            &self.config.output.output_dir.join(file_name),
            self.config.output.file_collision,
        )?;
        let path = claim.path().to_path_buf();
        let sink = open_sink(
            self.config.output.sink,
            &path,
            self.config.output.buffer_warn_bytes,
        )
        .await?;

        let segments = media.segments.len();
        let (state_tx, _state_rx) = watch::channel(SessionState::Running);
        let state = Arc::new(state_tx);
        let cancel = CancellationToken::new();
        let ctx = SessionContext {
            id,
            fetcher: Arc::clone(&self.fetcher),
            media,
            container,
            resolution,
            path: path.clone(),
            concurrency: self.config.concurrency,
            budget: RetryBudget::new(self.config.max_retries),
            segment_timeout: self.config.segment_timeout,
            progress_interval: self.config.progress_interval,
            keys: KeyStore::new(),
            inits: OnceMap::new(),
            event_tx: self.event_tx.clone(),
            state: Arc::clone(&state),
            cancel: cancel.clone(),
        };

        let task = tokio::spawn(async move {
            // the path stays reserved until the session reaches a terminal state
            let _claim = claim;
            run_session(ctx, sink).await
        });
        let controller = SessionController::new(id, state, cancel);
        Ok(DownloadHandle::new(controller, path, container, segments, task))
    }

    /// Media playlist for `request`, plus the variant it came from
    async fn resolve_media(
        &self,
        id: DownloadId,
        request: &DownloadRequest,
    ) -> Result<(MediaPlaylist, Option<Variant>)> {
        let root = self.probe(&request.url).await?;
        let (kind, variants) = match &root {
            Playlist::Master(master) => (PlaylistKind::Master, master.variants.len()),
            Playlist::Media(_) => (PlaylistKind::Media, 0),
        };
        self.event_tx
            .send(Event::PlaylistResolved {
                id,
                url: request.url.clone(),
                kind,
                variants,
            })
            .ok();

        let master = match root {
            Playlist::Media(media) => return Ok((media, None)),
            Playlist::Master(master) => master,
        };

        let variant = match &request.variant {
            VariantChoice::Use(variant) => variant.clone(),
            VariantChoice::Best => master.best_variant().cloned().ok_or(Error::NoVariants)?,
        };
        info!(
            download_id = id.0,
            url = %variant.url,
            resolution = ?variant.resolution.map(|r| r.to_string()),
            bandwidth = ?variant.bandwidth(),
            "variant selected"
        );
        self.event_tx
            .send(Event::VariantSelected {
                id,
                variant: variant.clone(),
            })
            .ok();

        match self.probe(&variant.url).await? {
            Playlist::Media(media) => Ok((media, Some(variant))),
            Playlist::Master(_) => Err(Error::MalformedPlaylist(
                "variant URL points to another master playlist".to_string(),
            )),
        }
    }
}
