//! Configuration types for hls-dl

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{num::NonZeroUsize, path::PathBuf, time::Duration};

/// Main configuration for [`HlsDownloader`](crate::HlsDownloader)
///
/// Scheduling knobs live at the top level; everything else is grouped into
/// sub-configs:
/// - [`output`](OutputConfig): destination directory, sink strategy, collisions
/// - [`cache`](CacheConfig): capacities of the playlist/metadata LRU caches
/// - [`http`](HttpConfig): manifest timeout and request headers
///
/// Durations are (de)serialized as integer milliseconds.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Maximum segment requests in flight (default: 6)
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Retries per segment after the first attempt (default: 3)
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Per-request timeout for segment, key and init fetches (default: 60 s)
    #[serde(
        rename = "segment_timeout_ms",
        default = "default_segment_timeout",
        with = "duration_ms_serde"
    )]
    pub segment_timeout: Duration,

    /// Minimum spacing between progress events (default: 16 ms)
    #[serde(
        rename = "progress_interval_ms",
        default = "default_progress_interval",
        with = "duration_ms_serde"
    )]
    pub progress_interval: Duration,

    /// Output destination settings
    #[serde(default)]
    pub output: OutputConfig,

    /// Fetch cache settings
    #[serde(default)]
    pub cache: CacheConfig,

    /// HTTP client settings
    #[serde(default)]
    pub http: HttpConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            max_retries: default_max_retries(),
            segment_timeout: default_segment_timeout(),
            progress_interval: default_progress_interval(),
            output: OutputConfig::default(),
            cache: CacheConfig::default(),
            http: HttpConfig::default(),
        }
    }
}

impl Config {
    /// Check that the configuration can drive a session
    ///
    /// Rejects zero concurrency, zero cache capacities, zero timeouts and a
    /// zero progress interval.
    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            return Err(Error::config("concurrency", "concurrency must be at least 1"));
        }
        if self.segment_timeout.is_zero() {
            return Err(Error::config(
                "segment_timeout_ms",
                "segment timeout must be greater than zero",
            ));
        }
        if self.http.manifest_timeout.is_zero() {
            return Err(Error::config(
                "manifest_timeout_ms",
                "manifest timeout must be greater than zero",
            ));
        }
        if self.progress_interval.is_zero() {
            return Err(Error::config(
                "progress_interval_ms",
                "progress interval must be greater than zero",
            ));
        }
        self.cache.text_capacity()?;
        self.cache.metadata_capacity()?;
        Ok(())
    }
}

/// Where and how the reconstructed file is written
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Destination directory (default: "./downloads")
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Sink selection strategy (default: auto)
    #[serde(default)]
    pub sink: SinkStrategy,

    /// What to do when the target filename already exists (default: rename)
    #[serde(default)]
    pub file_collision: FileCollisionAction,

    /// Buffered sinks log a single warning once they hold this many bytes (default: 1 GiB)
    #[serde(default = "default_buffer_warn_bytes")]
    pub buffer_warn_bytes: u64,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            sink: SinkStrategy::default(),
            file_collision: FileCollisionAction::default(),
            buffer_warn_bytes: default_buffer_warn_bytes(),
        }
    }
}

/// Output sink selection
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkStrategy {
    /// Stream to disk when the part file can be created, otherwise buffer (default)
    #[default]
    Auto,
    /// Always stream ordered bytes to a part file
    Streaming,
    /// Accumulate in memory and write once at the end
    Buffered,
}

/// File collision handling strategy
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileCollisionAction {
    /// Append (1), (2), etc. to filename (default)
    #[default]
    Rename,
    /// Overwrite existing file
    Overwrite,
}

/// Capacities of the fetch layer's LRU caches
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Cached playlist texts (default: 256)
    #[serde(default = "default_cache_capacity")]
    pub text_entries: usize,

    /// Cached HEAD metadata entries (default: 256)
    #[serde(default = "default_cache_capacity")]
    pub metadata_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            text_entries: default_cache_capacity(),
            metadata_entries: default_cache_capacity(),
        }
    }
}

impl CacheConfig {
    pub(crate) fn text_capacity(&self) -> Result<NonZeroUsize> {
        NonZeroUsize::new(self.text_entries)
            .ok_or_else(|| Error::config("cache.text_entries", "cache capacity must be at least 1"))
    }

    pub(crate) fn metadata_capacity(&self) -> Result<NonZeroUsize> {
        NonZeroUsize::new(self.metadata_entries).ok_or_else(|| {
            Error::config(
                "cache.metadata_entries",
                "cache capacity must be at least 1",
            )
        })
    }
}

/// HTTP client settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Timeout for playlist and HEAD requests (default: 30 s)
    #[serde(
        rename = "manifest_timeout_ms",
        default = "default_manifest_timeout",
        with = "duration_ms_serde"
    )]
    pub manifest_timeout: Duration,

    /// User-Agent header sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Optional Referer header (some CDNs refuse requests without one)
    #[serde(default)]
    pub referer: Option<String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            manifest_timeout: default_manifest_timeout(),
            user_agent: default_user_agent(),
            referer: None,
        }
    }
}

// Default value functions
fn default_concurrency() -> usize {
    6
}

fn default_max_retries() -> u32 {
    3
}

fn default_segment_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_manifest_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_progress_interval() -> Duration {
    Duration::from_millis(16)
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("downloads")
}

fn default_buffer_warn_bytes() -> u64 {
    1024 * 1024 * 1024
}

fn default_cache_capacity() -> usize {
    256
}

fn default_user_agent() -> String {
    concat!("hls-dl/", env!("CARGO_PKG_VERSION")).to_string()
}

// Duration serialization helper (integer milliseconds)
mod duration_ms_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
