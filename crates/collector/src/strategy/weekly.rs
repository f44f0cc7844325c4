use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::config::CollectorConfig;
use common::CollectionMode;
use gh_client::FetchError;
use normalizer::{normalize_contributor_weeks, ContributorWeekRecord, RepoRef};
use tokio::time::sleep;
use tracing::{debug, warn};

use super::CollectionStrategy;
use crate::client::GithubClient;

/// How long to wait for GitHub to finish computing contributor statistics.
#[derive(Debug, Clone, Copy)]
pub struct StatsPolling {
    pub attempts: u32,
    pub interval: Duration,
}

impl StatsPolling {
    pub fn from_config(config: &CollectorConfig) -> Self {
        Self {
            attempts: config.stats_poll_attempts.max(1),
            interval: Duration::from_secs(config.stats_poll_interval_secs),
        }
    }
}

pub struct WeeklyStatsStrategy {
    client: Arc<dyn GithubClient>,
    polling: StatsPolling,
}

impl WeeklyStatsStrategy {
    pub fn new(client: Arc<dyn GithubClient>, polling: StatsPolling) -> Self {
        Self { client, polling }
    }
}

#[async_trait]
impl CollectionStrategy for WeeklyStatsStrategy {
    type Record = ContributorWeekRecord;

    fn mode(&self) -> CollectionMode {
        CollectionMode::WeeklyStats
    }

    async fn collect(
        &self,
        chain: &str,
        repo: &RepoRef,
    ) -> Result<Vec<ContributorWeekRecord>, FetchError> {
        for poll in 1..=self.polling.attempts {
            if let Some(contributors) = self.client.contributor_stats(&repo.org, &repo.repo).await? {
                return Ok(contributors
                    .iter()
                    .flat_map(|contributor| normalize_contributor_weeks(contributor, chain, repo))
                    .collect());
            }
            debug!(repo = %repo, poll, "contributor statistics still computing");
            if poll < self.polling.attempts {
                sleep(self.polling.interval).await;
            }
        }
        warn!(
            repo = %repo,
            attempts = self.polling.attempts,
            "contributor statistics never became available, treating as empty"
        );
        Ok(Vec::new())
    }
}
