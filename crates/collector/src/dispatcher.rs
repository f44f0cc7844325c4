use std::sync::Arc;
use std::time::Instant;

use futures::stream::{self, StreamExt};
use normalizer::RepoRef;
use tracing::{info, warn};

use crate::metrics::{self, ActiveRepoGuard};
use crate::strategy::CollectionStrategy;

/// Fans repository collection out over at most `workers` concurrent tasks.
pub struct Dispatcher<S: CollectionStrategy> {
    strategy: Arc<S>,
    workers: usize,
    repo_retries: u32,
}

impl<S: CollectionStrategy> Dispatcher<S> {
    pub fn new(strategy: Arc<S>, workers: usize, repo_retries: u32) -> Self {
        Self {
            strategy,
            workers: workers.max(1),
            repo_retries,
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// One batch per input repository, in input order. Failed repositories yield empty batches.
    pub async fn run(&self, chain: &str, repos: &[RepoRef]) -> Vec<Vec<S::Record>> {
        let tasks = repos.iter().cloned().enumerate().map(|(index, repo)| {
            let strategy = Arc::clone(&self.strategy);
            let chain = chain.to_string();
            let retries = self.repo_retries;
            let label = repo.full_name();
            let handle = tokio::spawn(async move {
                collect_repo(strategy.as_ref(), &chain, &repo, retries).await
            });
            async move {
                let batch = match handle.await {
                    Ok(batch) => batch,
                    Err(err) => {
                        warn!(repo = %label, error = %err, "collection task aborted");
                        metrics::REPOS_PROCESSED_TOTAL
                            .with_label_values(&["panicked"])
                            .inc();
                        Vec::new()
                    }
                };
                (index, batch)
            }
        });

        // Batches arrive in completion order.
        let mut batches: Vec<(usize, Vec<S::Record>)> = stream::iter(tasks)
            .buffer_unordered(self.workers)
            .collect()
            .await;
        batches.sort_by_key(|(index, _)| *index);
        batches.into_iter().map(|(_, batch)| batch).collect()
    }
}

/// Collects one repository, re-running it from scratch after transient failures.
/// An exhausted credential rotation is final for the repository.
pub async fn collect_repo<S: CollectionStrategy + ?Sized>(
    strategy: &S,
    chain: &str,
    repo: &RepoRef,
    retries: u32,
) -> Vec<S::Record> {
    let _active = ActiveRepoGuard::new();
    let started = Instant::now();
    let attempts = retries.saturating_add(1);
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        match strategy.collect(chain, repo).await {
            Ok(records) => {
                info!(
                    chain,
                    repo = %repo,
                    records = records.len(),
                    attempt,
                    "collected repository"
                );
                observe(&started, "success");
                metrics::RECORDS_TOTAL
                    .with_label_values(&[strategy.mode().as_str()])
                    .inc_by(records.len() as u64);
                return records;
            }
            Err(err) if err.is_retryable() && attempt < attempts => {
                warn!(
                    chain,
                    repo = %repo,
                    attempt,
                    error = %err,
                    "repository collection failed, starting over"
                );
            }
            Err(err) => {
                warn!(
                    chain,
                    repo = %repo,
                    attempt,
                    reason = err.reason(),
                    error = %err,
                    "giving up on repository"
                );
                observe(&started, "error");
                return Vec::new();
            }
        }
    }
}

fn observe(started: &Instant, outcome: &str) {
    metrics::REPOS_PROCESSED_TOTAL
        .with_label_values(&[outcome])
        .inc();
    metrics::REPO_DURATION
        .with_label_values(&[outcome])
        .observe(started.elapsed().as_secs_f64());
}
