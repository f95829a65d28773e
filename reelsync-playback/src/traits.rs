//! Seams to the external collaborators.
//!
//! The session controller never talks to the network itself; hosts wire
//! these traits to an implementation (see `reelsync-client`) and forward
//! the controller's effects to them.

use async_trait::async_trait;
use reelsync_model::{ProgressUpdate, ResumeInfo};
use uuid::Uuid;

/// Destination for periodic watch-activity reports
///
/// `save` is idempotent on the server side; `play_counted` must be called at
/// most once per playback session. Both are retryable by the implementation.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ActivitySink: Send + Sync {
    async fn save(&self, update: ProgressUpdate) -> anyhow::Result<()>;

    async fn play_counted(&self, item_id: Uuid) -> anyhow::Result<()>;
}

/// Lookup of the saved resume state for an item
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ResumeLookup: Send + Sync {
    async fn resume_info(&self, item_id: Uuid) -> anyhow::Result<Option<ResumeInfo>>;
}
