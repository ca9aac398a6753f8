//! # hls-dl
//!
//! Library for reconstructing HLS video-on-demand streams into a single file.
//!
//! Give it a master or media playlist URL and it resolves a variant, fetches
//! every segment concurrently (decrypting AES-128 segments and prepending
//! fMP4 init segments where needed), and writes the bytes to one `.ts` or
//! `.mp4` file in playlist order.
//!
//! ## Design Philosophy
//!
//! hls-dl is designed to be:
//! - **Sensible defaults** - Works out of the box with zero configuration
//! - **Library-first** - No CLI or UI, purely a Rust crate for embedding
//! - **Event-driven** - Consumers subscribe to events, no polling required
//! - **Controllable** - Every session can be paused, resumed and cancelled
//!
//! ## Quick Start
//!
//! ```no_run
//! use hls_dl::{Config, DownloadRequest, HlsDownloader};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let downloader = HlsDownloader::new(Config::default())?;
//!
//!     // Subscribe to events
//!     let mut events = downloader.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     let handle = downloader
//!         .start(DownloadRequest::new("https://cdn.example.com/master.m3u8").with_title("Keynote"))
//!         .await?;
//!     let outcome = handle.wait().await?;
//!     println!("saved {} bytes to {}", outcome.bytes, outcome.path.display());
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// AES-128 segment decryption
pub mod crypto;
/// Core downloader implementation (decomposed into focused submodules)
pub mod downloader;
/// Error types
pub mod error;
/// Network access, caching and request collapsing
pub mod fetch;
/// Output sinks
pub mod output;
/// Playlist parsing
pub mod playlist;
/// Retry classification
pub mod retry;
/// Core types and events
pub mod types;
/// Utility functions
pub mod utils;

// Re-export commonly used types
pub use config::{CacheConfig, Config, FileCollisionAction, HttpConfig, OutputConfig, SinkStrategy};
pub use downloader::{
    DownloadHandle, DownloadRequest, HlsDownloader, SessionController, VariantChoice,
    VariantOption,
};
pub use error::{Error, ErrorCategory, Result};
pub use fetch::{CachingFetcher, Fetcher, HttpFetcher, ResourceMeta, ResourceStore, StoreFetcher};
pub use playlist::{MasterPlaylist, MediaPlaylist, Playlist, SizeEstimate, Variant};
pub use types::{
    Container, DownloadId, DownloadOutcome, Event, PlaylistKind, SessionState,
};

/// Wait for a download, cancelling it on a termination signal.
///
/// Listens for SIGTERM and SIGINT on unix, and for Ctrl+C elsewhere or when
/// signal registration is refused.
///
/// After a signal the session is cancelled (partial output is removed) and
/// this returns [`Error::Cancelled`].
///
/// # Example
///
/// ```no_run
/// use hls_dl::{Config, DownloadRequest, HlsDownloader, download_with_shutdown};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let downloader = HlsDownloader::new(Config::default())?;
///     let handle = downloader
///         .start(DownloadRequest::new("https://cdn.example.com/index.m3u8"))
///         .await?;
///
///     // Ctrl+C cancels cleanly
///     let outcome = download_with_shutdown(handle).await?;
///     println!("{}", outcome.path.display());
///
///     Ok(())
/// }
/// ```
pub async fn download_with_shutdown(handle: DownloadHandle) -> Result<DownloadOutcome> {
    let controller = handle.controller();
    let wait = handle.wait();
    tokio::pin!(wait);

    tokio::select! {
        result = &mut wait => result,
        _ = wait_for_signal() => {
            controller.cancel();
            wait.await
        }
    }
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            let name = tokio::select! {
                _ = sigterm.recv() => "SIGTERM",
                _ = sigint.recv() => "SIGINT",
            };
            tracing::info!(signal = name, "cancelling download");
        }
        (term, int) => {
            // containers and test harnesses may refuse signal registration
            if let Some(e) = term.err().or(int.err()) {
                tracing::warn!(error = %e, "signal handlers unavailable, falling back to ctrl_c");
            }
            wait_for_ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    wait_for_ctrl_c().await;
}

async fn wait_for_ctrl_c() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!(signal = "ctrl_c", "cancelling download"),
        Err(e) => {
            tracing::error!(error = %e, "cannot listen for ctrl_c");
            // a listener failure must not cancel the download
            std::future::pending::<()>().await;
        }
    }
}
