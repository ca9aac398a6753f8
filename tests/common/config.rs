//! Test configuration helpers

use std::time::Duration;

use hls_dl::{Config, HlsDownloader};
use tempfile::TempDir;

/// Config writing into `dir/downloads` with short timeouts and fast progress ticks
pub fn test_config(dir: &TempDir) -> Config {
    let mut config = Config::default();
    config.output.output_dir = dir.path().join("downloads");
    config.segment_timeout = Duration::from_secs(5);
    config.http.manifest_timeout = Duration::from_secs(5);
    config.progress_interval = Duration::from_millis(5);
    config
}

/// Real HTTP downloader writing into a fresh temp directory
pub fn create_downloader(configure: impl FnOnce(&mut Config)) -> (HlsDownloader, TempDir) {
    init_tracing();
    let temp_dir = tempfile::tempdir().unwrap();
    let mut config = test_config(&temp_dir);
    configure(&mut config);
    let downloader = HlsDownloader::new(config).unwrap();
    (downloader, temp_dir)
}

/// Route library logs to the test writer, honouring `RUST_LOG`
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
