//! Output sinks
//!
//! The scheduler hands ordered segment bytes to one [`OutputSink`], chosen once
//! when the session starts:
//! - [`FileSink`] streams into `<name>.part` and renames on close
//! - [`MemorySink`] accumulates everything and writes the file once on close
//!
//! Sinks enforce no ordering of their own; callers write in playlist order.

mod file;
mod memory;

pub use file::FileSink;
pub use memory::MemorySink;

use crate::config::SinkStrategy;
use crate::error::Result;
use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Destination for reconstructed bytes
///
/// `close` and `abort` consume the sink, so each is valid at most once.
#[async_trait]
pub trait OutputSink: Send {
    /// Append `chunk`
    async fn write(&mut self, chunk: Bytes) -> Result<()>;

    /// Finalize and deliver the artifact
    async fn close(self: Box<Self>) -> Result<SinkSummary>;

    /// Discard partial output
    async fn abort(self: Box<Self>);
}

/// What a closed sink delivered
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SinkSummary {
    /// Final path
    pub path: PathBuf,
    /// Bytes written
    pub bytes: u64,
}

/// Open the sink selected by `strategy` for `path`
///
/// `Auto` streams when the part file can be created and buffers otherwise.
pub async fn open_sink(
    strategy: SinkStrategy,
    path: &Path,
    buffer_warn_bytes: u64,
) -> Result<Box<dyn OutputSink>> {
    match strategy {
        SinkStrategy::Streaming => Ok(Box::new(FileSink::create(path).await?)),
        SinkStrategy::Buffered => Ok(Box::new(MemorySink::new(path, buffer_warn_bytes))),
        SinkStrategy::Auto => match FileSink::create(path).await {
            Ok(sink) => Ok(Box::new(sink)),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "cannot stream to disk, buffering in memory");
                Ok(Box::new(MemorySink::new(path, buffer_warn_bytes)))
            }
        },
    }
}
