//! Fetching a single segment: request, decrypt, prepend init

use super::context::SessionContext;
use crate::crypto::{ensure_supported, segment_iv};
use crate::error::{Error, Result};
use crate::fetch::{ByteRequest, TransferProgress};
use crate::playlist::InitSegment;
use bytes::{Bytes, BytesMut};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Produce the bytes to write for segment `index`
///
/// Returns the index alongside the result so completions can arrive in any
/// order.
pub(super) async fn fetch_segment(
    ctx: &SessionContext,
    index: usize,
    cancel: CancellationToken,
    transfer: Arc<TransferProgress>,
) -> (usize, Result<Bytes>) {
    (index, fetch_segment_bytes(ctx, index, &cancel, transfer).await)
}

async fn fetch_segment_bytes(
    ctx: &SessionContext,
    index: usize,
    cancel: &CancellationToken,
    transfer: Arc<TransferProgress>,
) -> Result<Bytes> {
    let segment = ctx
        .media
        .segments
        .get(index)
        .ok_or_else(|| Error::Other(format!("segment index {index} out of range")))?;

    if let Some(key) = &segment.key {
        ensure_supported(key)?;
    }

    let request = ByteRequest::new(&segment.uri, ctx.segment_timeout, cancel.clone())
        .with_range(segment.byte_range)
        .with_progress(transfer);
    let mut bytes = ctx.fetcher.get_bytes(request).await?;
    ensure_live(cancel)?;

    if let Some(key) = &segment.key {
        let iv = segment_iv(key, ctx.media.media_sequence, index)?;
        bytes = ctx
            .keys
            .decrypt_segment(
                ctx.fetcher.as_ref(),
                key,
                &iv,
                &bytes,
                ctx.segment_timeout,
                cancel,
            )
            .await?;
        ensure_live(cancel)?;
    }

    if segment.needs_init_segment
        && let Some(init) = &segment.init_segment
    {
        let init_bytes = init_segment_bytes(ctx, init, cancel).await?;
        ensure_live(cancel)?;

        let mut joined = BytesMut::with_capacity(init_bytes.len() + bytes.len());
        joined.extend_from_slice(&init_bytes);
        joined.extend_from_slice(&bytes);
        bytes = joined.freeze();
    }

    debug!(segment = index, bytes = bytes.len(), "segment ready");
    Ok(bytes)
}

/// Init segment bytes, fetched once per session; never decrypted
async fn init_segment_bytes(
    ctx: &SessionContext,
    init: &InitSegment,
    cancel: &CancellationToken,
) -> Result<Bytes> {
    ctx.inits
        .get_or_try_init(init.clone(), || async {
            debug!(url = %init.uri, "fetching init segment");
            let request = ByteRequest::new(&init.uri, ctx.segment_timeout, cancel.clone())
                .with_range(init.byte_range);
            ctx.fetcher.get_bytes(request).await
        })
        .await
}

fn ensure_live(cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        Err(Error::Aborted)
    } else {
        Ok(())
    }
}
