use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use collector::{metrics, Pipeline, RestGithubClient};
use common::{config::AppConfig, logging};
use gh_client::{FetcherSettings, GithubToken, PaginatedFetcher, ReqwestExecutor, TokenPool};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    logging::init_logging("info");
    let config = AppConfig::load()?;
    if config.collector.chains.is_empty() {
        return Err(anyhow!(
            "no chains configured (set COLLECTOR__CHAINS or collector.chains)"
        ));
    }

    let tokens: Vec<GithubToken> = config
        .github
        .resolved_tokens()
        .into_iter()
        .map(|token| GithubToken {
            id: token.id,
            secret: token.secret,
        })
        .collect();
    let pool = TokenPool::new(tokens)?;
    info!(tokens = pool.len(), "credential pool ready");

    let exec = ReqwestExecutor::new(
        &config.github.user_agent,
        Duration::from_secs(config.github.request_timeout_secs),
    )?;
    let settings = FetcherSettings {
        user_agent: config.github.user_agent.clone(),
        per_page: config.github.per_page,
        max_retries: config.github.max_retries,
        forbidden_cooldown: Duration::from_secs(config.github.forbidden_cooldown_secs),
    };
    let fetcher = PaginatedFetcher::new(Arc::new(exec), pool, &config.github.api_base, settings)?;
    let client = Arc::new(RestGithubClient::new(fetcher));

    let pipeline = Pipeline::new(config.collector.clone(), client);
    let summary = pipeline.run().await?;
    for chain in &summary.chains {
        info!(
            chain = %chain.chain,
            organizations = chain.organizations,
            unresolved = chain.unresolved.len(),
            repositories = chain.repositories,
            records = chain.records,
            output = %chain.output.display(),
            "chain summary"
        );
    }
    if !summary.failed_chains.is_empty() {
        warn!(failed = ?summary.failed_chains, "some chains produced no output");
    }
    info!(records = summary.total_records(), "collection finished");

    if let Some(path) = &config.observability.metrics_file {
        metrics::write_snapshot(path)?;
        info!(path = %path.display(), "wrote metrics snapshot");
    }
    Ok(())
}
