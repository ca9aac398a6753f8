//! Session loop: dispatch, collect, reorder, write

use super::context::SessionContext;
use super::dispatch::fetch_segment;
use super::finalization::{abort_with_failure, cancel_session, complete_session};
use super::progress::ProgressTracker;
use super::state::{FailureOutcome, SegmentTable};
use crate::error::{Error, Result};
use crate::fetch::TransferProgress;
use crate::output::OutputSink;
use crate::retry::IsRetryable;
use crate::types::{DownloadOutcome, Event, SessionState};
use bytes::Bytes;
use futures::FutureExt;
use futures::future::BoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

type Dispatch<'a> = BoxFuture<'a, (usize, Result<Bytes>)>;

/// Handles the loop keeps for one outstanding request
struct ActiveDispatch {
    cancel: CancellationToken,
    transfer: Arc<TransferProgress>,
}

/// Run one download session to a terminal state
///
/// All scheduling state lives in this task. Up to `concurrency` segment
/// requests run concurrently inside it; their results land in a reorder buffer
/// and reach the sink strictly in playlist order.
///
/// Phases:
/// 1. Flush every buffered segment at the write cursor
/// 2. Finish when the cursor has passed the last segment
/// 3. Fail when the cursor sits on a permanently failed segment
/// 4. Fill free request slots (unless paused)
/// 5. Wait for cancellation, a pause/resume, a completion, or the progress tick
pub(crate) async fn run_session(
    ctx: SessionContext,
    mut sink: Box<dyn OutputSink>,
) -> Result<DownloadOutcome> {
    let total = ctx.total_segments();
    let mut table = SegmentTable::new(total);
    let mut progress = ProgressTracker::new(total);
    let mut active: HashMap<usize, ActiveDispatch> = HashMap::new();
    let mut inflight: FuturesUnordered<Dispatch<'_>> = FuturesUnordered::new();

    let mut state_rx = ctx.state.subscribe();
    let mut paused = *state_rx.borrow_and_update() == SessionState::Paused;

    let mut ticker = tokio::time::interval(ctx.progress_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    info!(
        download_id = ctx.id.0,
        segments = total,
        concurrency = ctx.concurrency,
        container = ctx.container.extension(),
        "download started"
    );
    ctx.emit(Event::Started {
        id: ctx.id,
        segments: total,
        container: ctx.container,
        path: ctx.path.clone(),
    });

    loop {
        while let Some((index, bytes)) = table.pop_ready() {
            if let Err(e) = sink.write(bytes).await {
                error!(segment = index, error = %e, "failed to write segment");
                abort_active(&active);
                return Err(abort_with_failure(&ctx, sink, e).await);
            }
        }

        if table.is_complete() {
            return complete_session(&ctx, sink).await;
        }

        if let Some((index, attempts, source)) = table.blocking_failure() {
            error!(
                segment = index,
                attempts,
                error = %source,
                "segment failed permanently"
            );
            abort_active(&active);
            drop(inflight);
            let failure = Error::SegmentFailed {
                index,
                attempts,
                source: Box::new(source),
            };
            return Err(abort_with_failure(&ctx, sink, failure).await);
        }

        if !paused {
            while table.inflight() < ctx.concurrency {
                let Some(index) = table.next_schedulable() else {
                    break;
                };
                let cancel = ctx.cancel.child_token();
                let transfer = Arc::new(TransferProgress::new());
                debug!(segment = index, attempt = table.failures(index) + 1, "dispatching segment");
                inflight.push(fetch_segment(&ctx, index, cancel.clone(), transfer.clone()).boxed());
                active.insert(index, ActiveDispatch { cancel, transfer });
            }
        }

        tokio::select! {
            biased;

            _ = ctx.cancel.cancelled() => {
                abort_active(&active);
                drop(inflight);
                return Err(cancel_session(&ctx, sink).await);
            }

            changed = state_rx.changed() => {
                if changed.is_err() {
                    continue;
                }
                let state = *state_rx.borrow_and_update();
                match state {
                    SessionState::Paused if !paused => {
                        paused = true;
                        abort_active(&active);
                        info!(download_id = ctx.id.0, inflight = active.len(), "download paused");
                        ctx.emit(Event::Paused { id: ctx.id });
                    }
                    SessionState::Running if paused => {
                        paused = false;
                        info!(download_id = ctx.id.0, "download resumed");
                        ctx.emit(Event::Resumed { id: ctx.id });
                    }
                    _ => {}
                }
            }

            Some((index, result)) = inflight.next(), if !inflight.is_empty() => {
                let dispatch = active.remove(&index);
                handle_completion(&ctx, &mut table, &mut progress, dispatch, index, result);
            }

            _ = ticker.tick(), if !paused => {
                let status = *ctx.state.borrow();
                let percent = progress.percent(
                    table.done(),
                    active.values().map(|dispatch| dispatch.transfer.as_ref()),
                );
                if let Some(percent) = progress.changed(percent) {
                    ctx.emit(Event::Progress {
                        id: ctx.id,
                        percent,
                        status,
                        done: table.done(),
                        total,
                    });
                }
            }
        }
    }
}

fn handle_completion(
    ctx: &SessionContext,
    table: &mut SegmentTable,
    progress: &mut ProgressTracker,
    dispatch: Option<ActiveDispatch>,
    index: usize,
    result: Result<Bytes>,
) {
    match result {
        Ok(bytes) => {
            progress.record_segment(bytes.len());
            table.record_success(index, bytes);
        }
        // interrupted by a pause, not a content failure
        Err(Error::Aborted)
            if !ctx.cancel.is_cancelled()
                && dispatch.as_ref().is_some_and(|d| d.cancel.is_cancelled()) =>
        {
            debug!(segment = index, "segment aborted, requeued");
            table.revert_aborted(index);
        }
        Err(e) if e.is_retryable() => {
            let message = e.to_string();
            match table.record_failure(index, e, ctx.budget) {
                FailureOutcome::Requeued => warn!(
                    segment = index,
                    attempt = table.failures(index),
                    max_retries = ctx.budget.max_retries(),
                    error = %message,
                    "segment failed, retrying"
                ),
                FailureOutcome::Exhausted => warn!(
                    segment = index,
                    attempts = table.failures(index),
                    error = %message,
                    "segment retries exhausted"
                ),
            }
        }
        Err(e) => {
            warn!(segment = index, error = %e, "segment failed, not retryable");
            table.record_permanent(index, e);
        }
    }
}

fn abort_active(active: &HashMap<usize, ActiveDispatch>) {
    for dispatch in active.values() {
        dispatch.cancel.cancel();
    }
}
