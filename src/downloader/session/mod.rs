//! Download session execution -- segment scheduling and ordered output.
//!
//! Split into focused submodules:
//! - [`context`] - Shared state and per-session key/init caches
//! - [`state`] - Segment arena, retry queue, reorder buffer and write cursor
//! - [`dispatch`] - Fetch, decrypt and init-prepend for one segment
//! - [`progress`] - Fractional progress across in-flight transfers
//! - [`orchestration`] - The session loop
//! - [`finalization`] - Terminal transitions and their events

mod context;
mod dispatch;
mod finalization;
mod orchestration;
mod progress;
mod state;


pub(crate) use context::SessionContext;
pub(crate) use orchestration::run_session;
