//! Downloader-level tests: request resolution, naming and session startup.

use super::*;
use crate::config::{FileCollisionAction, SinkStrategy};
use crate::downloader::test_helpers::{
    ScriptedFetcher, create_test_downloader, expected_ts, segment_body, serve_ts, ts_playlist,
};
use crate::playlist::Resolution;


const MASTER: &str = "https://cdn.test/show/master.m3u8";

/// Master playlist with a 720p and a 1080p rendition, each with 2 segments
fn serve_master(fetcher: &ScriptedFetcher) {
    fetcher.text(
        MASTER,
        "#EXTM3U\n\
         #EXT-X-STREAM-INF:BANDWIDTH=2800000,RESOLUTION=1280x720,CODECS=\"avc1.4d401f,mp4a.40.2\"\n\
         720/index.m3u8\n\
         #EXT-X-STREAM-INF:BANDWIDTH=5000000,AVERAGE-BANDWIDTH=4500000,RESOLUTION=1920x1080\n\
         1080/index.m3u8\n",
    );
    serve_ts(fetcher, "https://cdn.test/show/720", 2);
    serve_ts(fetcher, "https://cdn.test/show/1080", 2);
}
