//! Download lifecycle control: pause, resume, cancel, wait.

use crate::error::{Error, Result};
use crate::types::{Container, DownloadId, DownloadOutcome, SessionState};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Cloneable control surface for one running session
///
/// Pause and resume are requests: the session task observes them between
/// segment completions. Both are no-ops when the session is already in the
/// requested state and fail with [`Error::InvalidState`] once it has finished.
#[derive(Clone, Debug)]
pub struct SessionController {
    id: DownloadId,
    state: Arc<watch::Sender<SessionState>>,
    cancel: CancellationToken,
}

impl SessionController {
    pub(crate) fn new(
        id: DownloadId,
        state: Arc<watch::Sender<SessionState>>,
        cancel: CancellationToken,
    ) -> Self {
        Self { id, state, cancel }
    }

    /// Session ID
    pub fn id(&self) -> DownloadId {
        self.id
    }

    /// Current lifecycle state
    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Stop dispatching and abort in-flight requests
    ///
    /// Aborted segments go back to the queue without using their retry budget.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use hls_dl::*;
    /// # async fn example(handle: DownloadHandle) -> Result<()> {
    /// handle.pause()?;
    /// assert_eq!(handle.state(), SessionState::Paused);
    /// handle.resume()?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn pause(&self) -> Result<()> {
        self.transition("pause", SessionState::Paused)
    }

    /// Continue a paused session
    pub fn resume(&self) -> Result<()> {
        self.transition("resume", SessionState::Running)
    }

    /// Abort everything and discard partial output
    ///
    /// Idempotent; has no effect on a session that already finished.
    pub fn cancel(&self) {
        if !self.cancel.is_cancelled() {
            debug!(download_id = self.id.0, "cancel requested");
        }
        self.cancel.cancel();
    }

    fn transition(&self, operation: &str, target: SessionState) -> Result<()> {
        let mut rejected = None;
        self.state.send_if_modified(|current| {
            if current.is_terminal() {
                rejected = Some(*current);
                return false;
            }
            if *current == target {
                return false;
            }
            *current = target;
            true
        });

        match rejected {
            Some(current) => Err(Error::InvalidState {
                operation: operation.to_string(),
                current_state: current.to_string(),
            }),
            None => Ok(()),
        }
    }
}

/// A started download
///
/// Dropping the handle does not stop the session; use [`cancel`](Self::cancel).
#[derive(Debug)]
pub struct DownloadHandle {
    controller: SessionController,
    path: PathBuf,
    container: Container,
    segments: usize,
    task: JoinHandle<Result<DownloadOutcome>>,
}

impl DownloadHandle {
    pub(crate) fn new(
        controller: SessionController,
        path: PathBuf,
        container: Container,
        segments: usize,
        task: JoinHandle<Result<DownloadOutcome>>,
    ) -> Self {
        Self {
            controller,
            path,
            container,
            segments,
            task,
        }
    }

    /// Session ID
    pub fn id(&self) -> DownloadId {
        self.controller.id()
    }

    /// Where the output file will be written
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Output container
    pub fn container(&self) -> Container {
        self.container
    }

    /// Number of media segments
    pub fn segments(&self) -> usize {
        self.segments
    }

    /// Current lifecycle state
    pub fn state(&self) -> SessionState {
        self.controller.state()
    }

    /// See [`SessionController::pause`]
    pub fn pause(&self) -> Result<()> {
        self.controller.pause()
    }

    /// See [`SessionController::resume`]
    pub fn resume(&self) -> Result<()> {
        self.controller.resume()
    }

    /// See [`SessionController::cancel`]
    pub fn cancel(&self) {
        self.controller.cancel()
    }

    /// A controller that outlives [`wait`](Self::wait)
    pub fn controller(&self) -> SessionController {
        self.controller.clone()
    }

    /// Wait for the session to reach a terminal state
    ///
    /// Returns the outcome on completion, [`Error::Cancelled`] after a cancel,
    /// or the failure that ended the session.
    pub async fn wait(self) -> Result<DownloadOutcome> {
        match self.task.await {
            Ok(result) => result,
            Err(e) => Err(Error::Other(format!("download task ended abnormally: {e}"))),
        }
    }
}
