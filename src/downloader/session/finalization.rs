//! Terminal transitions: completed, failed, cancelled

use super::context::SessionContext;
use crate::error::{Error, Result};
use crate::output::OutputSink;
use crate::types::{DownloadOutcome, Event, SessionState};
use tracing::{error, info};

/// Close the sink and report the finished artifact
pub(super) async fn complete_session(
    ctx: &SessionContext,
    sink: Box<dyn OutputSink>,
) -> Result<DownloadOutcome> {
    let summary = match sink.close().await {
        Ok(summary) => summary,
        Err(e) => return Err(fail_session(ctx, e)),
    };

    ctx.set_state(SessionState::Completed);
    let total = ctx.total_segments();
    ctx.emit(Event::Progress {
        id: ctx.id,
        percent: 100.0,
        status: SessionState::Completed,
        done: total,
        total,
    });
    ctx.emit(Event::Completed {
        id: ctx.id,
        path: summary.path.clone(),
        bytes: summary.bytes,
    });
    info!(
        download_id = ctx.id.0,
        path = %summary.path.display(),
        bytes = summary.bytes,
        segments = total,
        "download complete"
    );

    Ok(DownloadOutcome {
        id: ctx.id,
        path: summary.path,
        bytes: summary.bytes,
        segments: total,
        container: ctx.container,
        resolution: ctx.resolution,
    })
}

/// Mark the session failed and hand back `error` for the caller
pub(super) fn fail_session(ctx: &SessionContext, error: Error) -> Error {
    ctx.set_state(SessionState::Failed);
    error!(download_id = ctx.id.0, error = %error, "download failed");
    ctx.emit(Event::Failed {
        id: ctx.id,
        category: error.category(),
        error: error.to_string(),
    });
    error
}

/// Discard partial output after a blocking failure
pub(super) async fn abort_with_failure(
    ctx: &SessionContext,
    sink: Box<dyn OutputSink>,
    error: Error,
) -> Error {
    sink.abort().await;
    fail_session(ctx, error)
}

/// Discard partial output after the caller cancelled
pub(super) async fn cancel_session(ctx: &SessionContext, sink: Box<dyn OutputSink>) -> Error {
    sink.abort().await;
    ctx.set_state(SessionState::Cancelled);
    info!(download_id = ctx.id.0, "download cancelled");
    ctx.emit(Event::Cancelled { id: ctx.id });
    Error::Cancelled
}
