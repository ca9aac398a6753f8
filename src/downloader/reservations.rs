//! Output paths claimed by the running sessions of one downloader

use crate::config::FileCollisionAction;
use crate::error::{Error, Result};
use crate::utils::get_unique_path_with;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::debug;

type Claimed = Arc<Mutex<HashSet<PathBuf>>>;

/// Set of output paths owned by live sessions
///
/// Resolution and claiming happen under one lock, so two sessions started
/// at the same moment with the same title never share an output path.
#[derive(Clone, Default)]
pub(crate) struct PathReservations {
    claimed: Claimed,
}

impl PathReservations {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Resolve a free path for `desired` and hold it until the claim drops
    pub(crate) fn claim(&self, desired: &Path, action: FileCollisionAction) -> Result<PathClaim> {
        let mut claimed = self
            .claimed
            .lock()
            .map_err(|_| Error::Other("output path reservations poisoned".to_string()))?;
        let path = get_unique_path_with(desired, action, |candidate| claimed.contains(candidate))?;
        claimed.insert(path.clone());
        debug!(path = %path.display(), "output path claimed");

        Ok(PathClaim {
            path,
            claimed: Arc::clone(&self.claimed),
        })
    }
}

/// A claimed output path, released on drop
pub(crate) struct PathClaim {
    path: PathBuf,
    claimed: Claimed,
}

impl PathClaim {
    pub(crate) fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for PathClaim {
    fn drop(&mut self) {
        if let Ok(mut claimed) = self.claimed.lock() {
            claimed.remove(&self.path);
        }
    }
}
