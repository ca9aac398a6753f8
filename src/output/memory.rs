//! Buffered sink

use super::{OutputSink, SinkSummary};
use crate::error::{Error, Result};
use crate::playlist::estimate::format_bytes;
use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Path, PathBuf};
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

/// Keeps every chunk in memory and writes the file once on close
pub struct MemorySink {
    chunks: Vec<Bytes>,
    bytes: u64,
    path: PathBuf,
    warn_bytes: u64,
    warned: bool,
}

impl MemorySink {
    /// Buffer for `path`; logs one warning once `warn_bytes` are held
    pub fn new(path: &Path, warn_bytes: u64) -> Self {
        Self {
            chunks: Vec::new(),
            bytes: 0,
            path: path.to_path_buf(),
            warn_bytes,
            warned: false,
        }
    }

    /// Bytes buffered so far
    pub fn buffered(&self) -> u64 {
        self.bytes
    }
}

#[async_trait]
impl OutputSink for MemorySink {
    async fn write(&mut self, chunk: Bytes) -> Result<()> {
        self.bytes += chunk.len() as u64;
        self.chunks.push(chunk);

        if !self.warned && self.bytes >= self.warn_bytes {
            self.warned = true;
            warn!(
                path = %self.path.display(),
                buffered = %format_bytes(self.bytes),
                "large download held in memory"
            );
        }
        Ok(())
    }

    async fn close(self: Box<Self>) -> Result<SinkSummary> {
        if self.bytes == 0 {
            return Err(Error::Other("no data to save".to_string()));
        }
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }

        let mut file = File::create(&self.path).await?;
        for chunk in &self.chunks {
            file.write_all(chunk).await?;
        }
        file.flush().await?;
        info!(path = %self.path.display(), bytes = self.bytes, "output file written");

        Ok(SinkSummary {
            path: self.path,
            bytes: self.bytes,
        })
    }

    async fn abort(self: Box<Self>) {}
}
