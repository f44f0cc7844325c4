use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use common::config::CollectorConfig;
use common::{CollectionMode, Result};
use normalizer::RepoRef;
use tracing::{info, instrument, warn};

use crate::client::GithubClient;
use crate::dispatcher::Dispatcher;
use crate::ecosystem::{load_ecosystem, Ecosystem};
use crate::resolver::Resolver;
use crate::sink::CsvSink;
use crate::strategy::{CollectionStrategy, CommitStrategy, StatsPolling, WeeklyStatsStrategy};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChainSummary {
    pub chain: String,
    pub organizations: usize,
    pub unresolved: Vec<String>,
    pub repositories: usize,
    pub records: usize,
    pub output: PathBuf,
}

#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub chains: Vec<ChainSummary>,
    /// Chains with an unreadable ecosystem file or a failed collection.
    pub failed_chains: Vec<String>,
}

impl RunSummary {
    pub fn total_records(&self) -> usize {
        self.chains.iter().map(|chain| chain.records).sum()
    }
}

pub struct Pipeline {
    config: CollectorConfig,
    client: Arc<dyn GithubClient>,
    sink: CsvSink,
}

impl Pipeline {
    pub fn new(config: CollectorConfig, client: Arc<dyn GithubClient>) -> Self {
        let sink = CsvSink::new(config.output_dir.clone());
        Self {
            config,
            client,
            sink,
        }
    }

    /// Runs every configured chain with the strategy selected by `collector.mode`.
    pub async fn run(&self) -> Result<RunSummary> {
        match self.config.mode {
            CollectionMode::Commits => {
                self.run_with(Arc::new(CommitStrategy::new(self.client.clone())))
                    .await
            }
            CollectionMode::WeeklyStats => {
                let polling = StatsPolling::from_config(&self.config);
                self.run_with(Arc::new(WeeklyStatsStrategy::new(
                    self.client.clone(),
                    polling,
                )))
                .await
            }
        }
    }

    /// Every ecosystem file is read before any network call. A missing or malformed
    /// file aborts the run. Any other read failure only drops that chain.
    pub async fn run_with<S: CollectionStrategy>(&self, strategy: Arc<S>) -> Result<RunSummary> {
        let mut summary = RunSummary::default();
        let mut ecosystems = Vec::with_capacity(self.config.chains.len());
        for chain in &self.config.chains {
            match load_ecosystem(&self.config.ecosystems_dir, chain).await {
                Ok(ecosystem) => ecosystems.push(ecosystem),
                Err(err) if err.is_fatal() => return Err(err),
                Err(err) => {
                    warn!(chain = %chain, error = %err, "could not read ecosystem file, skipping chain");
                    summary.failed_chains.push(chain.clone());
                }
            }
        }

        let mode = strategy.mode();
        let dispatcher = Dispatcher::new(
            strategy,
            self.config.worker_count(),
            self.config.repo_retries,
        );
        info!(
            chains = ecosystems.len(),
            mode = mode.as_str(),
            workers = dispatcher.workers(),
            "collection started"
        );

        for ecosystem in &ecosystems {
            match self.run_chain(ecosystem, mode, &dispatcher).await {
                Ok(chain) => summary.chains.push(chain),
                Err(err) => {
                    warn!(chain = %ecosystem.chain, error = %err, "chain failed, continuing");
                    summary.failed_chains.push(ecosystem.chain.clone());
                }
            }
        }
        Ok(summary)
    }

    #[instrument(skip_all, fields(chain = %ecosystem.chain))]
    async fn run_chain<S: CollectionStrategy>(
        &self,
        ecosystem: &Ecosystem,
        mode: CollectionMode,
        dispatcher: &Dispatcher<S>,
    ) -> Result<ChainSummary> {
        let chain = ecosystem.chain.as_str();
        let resolver = Resolver::new(self.client.clone());
        let mut seen = HashSet::new();
        let mut records = Vec::new();
        let mut summary = ChainSummary {
            chain: chain.to_string(),
            ..ChainSummary::default()
        };

        for org in &ecosystem.organizations {
            let resolution = match resolver.resolve(org).await {
                Ok(resolution) => resolution,
                Err(err) => {
                    warn!(chain, org = %org, error = %err, "could not list repositories, skipping");
                    continue;
                }
            };
            if !resolution.is_resolved() {
                summary.unresolved.push(org.clone());
                continue;
            }
            let repos = unseen(&mut seen, resolution.repos);
            info!(chain, org = %org, repos = repos.len(), "collecting organization");
            let batches = dispatcher.run(chain, &repos).await;
            records.extend(batches.into_iter().flatten());
            summary.organizations += 1;
            summary.repositories += repos.len();
        }

        let direct = unseen(&mut seen, ecosystem.repos.clone());
        if !direct.is_empty() {
            info!(chain, repos = direct.len(), "collecting standalone repositories");
            let batches = dispatcher.run(chain, &direct).await;
            records.extend(batches.into_iter().flatten());
            summary.repositories += direct.len();
        }

        summary.records = records.len();
        summary.output = self.sink.write(chain, mode, &records)?;
        info!(
            chain,
            organizations = summary.organizations,
            repositories = summary.repositories,
            records = summary.records,
            "chain complete"
        );
        Ok(summary)
    }
}

/// Drops repositories already collected for this chain, keeping order.
fn unseen(seen: &mut HashSet<String>, repos: Vec<RepoRef>) -> Vec<RepoRef> {
    repos
        .into_iter()
        .filter(|repo| seen.insert(repo.full_name().to_ascii_lowercase()))
        .collect()
}
