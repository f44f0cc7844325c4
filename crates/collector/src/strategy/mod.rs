use async_trait::async_trait;
use common::CollectionMode;
use gh_client::FetchError;
use normalizer::{RepoRef, TabularRecord};

mod commits;
mod weekly;

pub use commits::CommitStrategy;
pub use weekly::{StatsPolling, WeeklyStatsStrategy};

/// Per-repository collection. Implementations must be safe to re-run from scratch:
/// the dispatcher retries a whole repository after a recoverable failure.
#[async_trait]
pub trait CollectionStrategy: Send + Sync + 'static {
    type Record: TabularRecord + Send + Sync + 'static;

    fn mode(&self) -> CollectionMode;

    async fn collect(&self, chain: &str, repo: &RepoRef) -> Result<Vec<Self::Record>, FetchError>;
}
