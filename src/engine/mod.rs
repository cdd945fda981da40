pub mod clone;
pub mod feed;
pub mod status;

pub use feed::{FeedMode, LoadOutcome, PaginatedFeed};
pub use status::{classify, Status};

use thiserror::Error;

/// Failure classes surfaced by the feed engine.
#[derive(Debug, Error)]
pub enum FeedError {
    /// A remote fetch failed. Loaded items are retained and the scroll
    /// trigger stays enabled so the same page can be retried.
    #[error("transient service error: {0}")]
    Transient(anyhow::Error),
    /// A clone batch failed. No partial merge occurred; the caller may
    /// retry the whole batch.
    #[error("mutation failed: {0}")]
    Mutation(anyhow::Error),
}
