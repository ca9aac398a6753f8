//! Shared test helpers: a scripted in-memory fetcher and downloader setup.

use crate::config::Config;
use crate::downloader::HlsDownloader;
use crate::error::{Error, Result};
use crate::fetch::{ByteRequest, Fetcher, ResourceMeta};
use crate::output::{OutputSink, SinkSummary};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;
use tempfile::TempDir;

/// Scripted failure for one request
#[derive(Clone, Copy, Debug)]
pub(crate) enum Fault {
    /// Respond with this HTTP status
    Status(u16),
    /// Time out
    Timeout,
}

impl Fault {
    fn into_error(self, url: &str) -> Error {
        match self {
            Fault::Status(status) => Error::Http {
                status,
                url: url.to_string(),
            },
            Fault::Timeout => Error::Timeout {
                url: url.to_string(),
            },
        }
    }
}

/// In-memory [`Fetcher`] with per-URL bodies, delays and failure scripts
///
/// Byte ranges are served by slicing the stored body. Delays honor the
/// request's cancellation token, so pause and cancel behave like real aborts.
#[derive(Default)]
pub(crate) struct ScriptedFetcher {
    texts: Mutex<HashMap<String, String>>,
    bodies: Mutex<HashMap<String, Bytes>>,
    delays: Mutex<HashMap<String, Duration>>,
    faults: Mutex<HashMap<String, VecDeque<Fault>>>,
    permanent: Mutex<HashMap<String, Fault>>,
    calls: Mutex<HashMap<String, usize>>,
    max_concurrent: Mutex<(usize, usize)>,
}

impl ScriptedFetcher {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn text(&self, url: &str, body: &str) {
        self.texts
            .lock()
            .unwrap()
            .insert(url.to_string(), body.to_string());
    }

    pub(crate) fn body(&self, url: &str, body: impl Into<Bytes>) {
        self.bodies
            .lock()
            .unwrap()
            .insert(url.to_string(), body.into());
    }

    pub(crate) fn delay(&self, url: &str, delay: Duration) {
        self.delays.lock().unwrap().insert(url.to_string(), delay);
    }

    /// Fail the next `times` byte requests for `url`
    pub(crate) fn fail(&self, url: &str, fault: Fault, times: usize) {
        self.faults
            .lock()
            .unwrap()
            .entry(url.to_string())
            .or_default()
            .extend(std::iter::repeat_n(fault, times));
    }

    /// Fail every byte request for `url`
    pub(crate) fn fail_always(&self, url: &str, fault: Fault) {
        self.permanent
            .lock()
            .unwrap()
            .insert(url.to_string(), fault);
    }

    /// Requests made for `url` (text and bytes)
    pub(crate) fn calls(&self, url: &str) -> usize {
        self.calls.lock().unwrap().get(url).copied().unwrap_or(0)
    }

    /// Highest number of byte requests observed in flight at once
    pub(crate) fn max_concurrent(&self) -> usize {
        self.max_concurrent.lock().unwrap().1
    }

    fn record_call(&self, url: &str) {
        *self.calls.lock().unwrap().entry(url.to_string()).or_default() += 1;
    }

    fn next_fault(&self, url: &str) -> Option<Fault> {
        if let Some(fault) = self.permanent.lock().unwrap().get(url) {
            return Some(*fault);
        }
        self.faults
            .lock()
            .unwrap()
            .get_mut(url)
            .and_then(VecDeque::pop_front)
    }

    fn enter(&self) {
        let mut guard = self.max_concurrent.lock().unwrap();
        guard.0 += 1;
        guard.1 = guard.1.max(guard.0);
    }

    fn leave(&self) {
        self.max_concurrent.lock().unwrap().0 -= 1;
    }

    async fn serve_bytes(&self, request: &ByteRequest) -> Result<Bytes> {
        let delay = self.delays.lock().unwrap().get(&request.url).copied();
        if let Some(delay) = delay {
            tokio::select! {
                _ = request.cancel.cancelled() => return Err(Error::Aborted),
                _ = tokio::time::sleep(delay) => {}
            }
        }
        if request.cancel.is_cancelled() {
            return Err(Error::Aborted);
        }
        if let Some(fault) = self.next_fault(&request.url) {
            return Err(fault.into_error(&request.url));
        }

        let body = self
            .bodies
            .lock()
            .unwrap()
            .get(&request.url)
            .cloned()
            .ok_or_else(|| Error::Http {
                status: 404,
                url: request.url.clone(),
            })?;
        let body = match request.range {
            Some(range) => body.slice(range.start as usize..=range.end_inclusive as usize),
            None => body,
        };
        if let Some(progress) = &request.progress {
            progress.set_total(body.len() as u64);
            progress.add_loaded(body.len() as u64);
        }
        Ok(body)
    }
}

#[async_trait]
impl Fetcher for ScriptedFetcher {
    async fn get_text(&self, url: &str) -> Result<String> {
        self.record_call(url);
        self.texts
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| Error::Http {
                status: 404,
                url: url.to_string(),
            })
    }

    async fn get_bytes(&self, request: ByteRequest) -> Result<Bytes> {
        self.record_call(&request.url);
        self.enter();
        let result = self.serve_bytes(&request).await;
        self.leave();
        result
    }

    async fn head(&self, url: &str) -> Result<ResourceMeta> {
        self.record_call(url);
        let length = self
            .bodies
            .lock()
            .unwrap()
            .get(url)
            .map(|body| body.len() as u64);
        Ok(ResourceMeta {
            content_length: length,
            content_type: None,
        })
    }
}

/// Config writing into `dir` with fast retries and progress ticks
pub(crate) fn test_config(dir: &TempDir) -> Config {
    let mut config = Config::default();
    config.output.output_dir = dir.path().join("downloads");
    config.segment_timeout = Duration::from_secs(5);
    config.progress_interval = Duration::from_millis(1);
    config
}

/// Downloader on top of `fetcher`, writing into a fresh temp dir
///
/// Returns the downloader and the tempdir (which must be kept alive).
pub(crate) fn create_test_downloader(
    fetcher: Arc<ScriptedFetcher>,
    configure: impl FnOnce(&mut Config),
) -> (HlsDownloader, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let mut config = test_config(&temp_dir);
    configure(&mut config);
    let downloader = HlsDownloader::with_fetcher(config, fetcher).unwrap();
    (downloader, temp_dir)
}

/// Media playlist text for `segments` TS segments under `base`
pub(crate) fn ts_playlist(base: &str, segments: usize) -> String {
    let mut text = String::from("#EXTM3U\n#EXT-X-VERSION:3\n#EXT-X-TARGETDURATION:4\n");
    for i in 0..segments {
        text.push_str(&format!("#EXTINF:4.0,\n{base}/seg{i}.ts\n"));
    }
    text.push_str("#EXT-X-ENDLIST\n");
    text
}

/// Payload stored for segment `index`
pub(crate) fn segment_body(index: usize) -> Bytes {
    Bytes::from(format!("<segment {index:03}>"))
}

/// Register `segments` TS segments plus their playlist at `{base}/index.m3u8`
pub(crate) fn serve_ts(fetcher: &ScriptedFetcher, base: &str, segments: usize) -> String {
    let url = format!("{base}/index.m3u8");
    fetcher.text(&url, &ts_playlist(base, segments));
    for i in 0..segments {
        fetcher.body(&format!("{base}/seg{i}.ts"), segment_body(i));
    }
    url
}

/// Expected output for segments `0..segments`
pub(crate) fn expected_ts(segments: usize) -> Vec<u8> {
    (0..segments).flat_map(|i| segment_body(i).to_vec()).collect()
}

/// What a [`CaptureSink`] received
#[derive(Debug, Default)]
pub(crate) struct Captured {
    pub(crate) chunks: Vec<Bytes>,
    pub(crate) closed: bool,
    pub(crate) aborted: bool,
}

/// [`OutputSink`] that records writes for inspection
#[derive(Clone, Default)]
pub(crate) struct CaptureSink {
    captured: Arc<Mutex<Captured>>,
}

impl CaptureSink {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Concatenation of every chunk written
    pub(crate) fn bytes(&self) -> Vec<u8> {
        self.captured
            .lock()
            .unwrap()
            .chunks
            .iter()
            .flat_map(|chunk| chunk.to_vec())
            .collect()
    }

    pub(crate) fn chunk_count(&self) -> usize {
        self.captured.lock().unwrap().chunks.len()
    }

    pub(crate) fn closed(&self) -> bool {
        self.captured.lock().unwrap().closed
    }

    pub(crate) fn aborted(&self) -> bool {
        self.captured.lock().unwrap().aborted
    }
}

#[async_trait]
impl OutputSink for CaptureSink {
    async fn write(&mut self, chunk: Bytes) -> Result<()> {
        self.captured.lock().unwrap().chunks.push(chunk);
        Ok(())
    }

    async fn close(self: Box<Self>) -> Result<SinkSummary> {
        let mut captured = self.captured.lock().unwrap();
        captured.closed = true;
        Ok(SinkSummary {
            path: PathBuf::from("capture.bin"),
            bytes: captured.chunks.iter().map(|c| c.len() as u64).sum(),
        })
    }

    async fn abort(self: Box<Self>) {
        self.captured.lock().unwrap().aborted = true;
    }
}
