//! Streaming sink

use super::{OutputSink, SinkSummary};
use crate::error::Result;
use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Path, PathBuf};
use tokio::fs::{self, File};
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, info};

/// Writes into `<path>.part` and renames it to `path` on close
pub struct FileSink {
    writer: BufWriter<File>,
    part_path: PathBuf,
    final_path: PathBuf,
    bytes: u64,
}

impl FileSink {
    /// Create the part file, and its directory if missing
    pub async fn create(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }
        let part_path = part_path(path);
        let file = File::create(&part_path).await?;
        debug!(path = %part_path.display(), "opened part file");

        Ok(Self {
            writer: BufWriter::new(file),
            part_path,
            final_path: path.to_path_buf(),
            bytes: 0,
        })
    }
}

fn part_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}

#[async_trait]
impl OutputSink for FileSink {
    async fn write(&mut self, chunk: Bytes) -> Result<()> {
        self.writer.write_all(&chunk).await?;
        self.bytes += chunk.len() as u64;
        Ok(())
    }

    async fn close(mut self: Box<Self>) -> Result<SinkSummary> {
        self.writer.flush().await?;
        self.writer.get_ref().sync_all().await?;
        fs::rename(&self.part_path, &self.final_path).await?;
        info!(path = %self.final_path.display(), bytes = self.bytes, "output file written");

        Ok(SinkSummary {
            path: self.final_path,
            bytes: self.bytes,
        })
    }

    async fn abort(self: Box<Self>) {
        let Self {
            writer, part_path, ..
        } = *self;
        drop(writer);
        if let Err(e) = fs::remove_file(&part_path).await {
            debug!(path = %part_path.display(), error = %e, "failed to remove part file");
        }
    }
}
