use std::sync::Arc;

use async_trait::async_trait;
use common::CollectionMode;
use futures::TryStreamExt;
use gh_client::FetchError;
use http::StatusCode;
use normalizer::{normalize_commit, CommitRecord, RepoRef};
use tracing::debug;

use super::CollectionStrategy;
use crate::client::GithubClient;

pub struct CommitStrategy {
    client: Arc<dyn GithubClient>,
}

impl CommitStrategy {
    pub fn new(client: Arc<dyn GithubClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl CollectionStrategy for CommitStrategy {
    type Record = CommitRecord;

    fn mode(&self) -> CollectionMode {
        CollectionMode::Commits
    }

    async fn collect(&self, chain: &str, repo: &RepoRef) -> Result<Vec<CommitRecord>, FetchError> {
        let mut pages = self.client.list_commits(&repo.org, &repo.repo);
        let mut records = Vec::new();
        loop {
            match pages.try_next().await {
                Ok(Some(page)) => {
                    records.extend(page.iter().map(|payload| normalize_commit(payload, chain, repo)))
                }
                Ok(None) => break,
                // GitHub answers 409 for a repository without any commits.
                Err(err) if err.status_code() == Some(StatusCode::CONFLICT) => {
                    debug!(repo = %repo, "repository is empty");
                    break;
                }
                Err(err) => return Err(err),
            }
        }
        Ok(records)
    }
}
