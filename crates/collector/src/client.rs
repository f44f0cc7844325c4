use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use gh_client::{FetchError, PageStream, PaginatedFetcher};
use normalizer::{CommitPayload, ContributorStatsPayload, OwnerPayload, RepoPayload};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

pub type TypedPageStream<T> = BoxStream<'static, Result<Vec<T>, FetchError>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OwnerKind {
    Organization,
    User,
}

impl OwnerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OwnerKind::Organization => "organization",
            OwnerKind::User => "user",
        }
    }
}

#[async_trait]
pub trait GithubClient: Send + Sync {
    async fn get_org(&self, org: &str) -> Result<OwnerPayload, FetchError>;
    async fn get_user(&self, login: &str) -> Result<OwnerPayload, FetchError>;
    /// Every repository owned by `owner`, forks included.
    fn list_owner_repos(&self, owner: &str, kind: OwnerKind) -> TypedPageStream<RepoPayload>;
    /// The organization's repositories that are forks.
    fn list_org_forks(&self, org: &str) -> TypedPageStream<RepoPayload>;
    fn list_commits(&self, owner: &str, repo: &str) -> TypedPageStream<CommitPayload>;
    /// `None` while GitHub is still computing the statistics.
    async fn contributor_stats(
        &self,
        owner: &str,
        repo: &str,
    ) -> Result<Option<Vec<ContributorStatsPayload>>, FetchError>;
}

pub struct RestGithubClient {
    fetcher: PaginatedFetcher,
}

impl RestGithubClient {
    pub fn new(fetcher: PaginatedFetcher) -> Self {
        Self { fetcher }
    }

    async fn get_one<T: DeserializeOwned>(&self, path: &str) -> Result<T, FetchError> {
        let url = self.fetcher.endpoint(path, &[])?;
        let value = self.fetcher.fetch_json(url).await?;
        serde_json::from_value(value).map_err(|err| FetchError::decode(path, err))
    }

    fn pages<T>(&self, path: &str, params: &[(&str, &str)]) -> TypedPageStream<T>
    where
        T: DeserializeOwned + Send + 'static,
    {
        match self.fetcher.endpoint(path, params) {
            Ok(url) => {
                debug!(url = %url, "listing pages");
                typed_pages(self.fetcher.fetch_all(url), path.to_string())
            }
            Err(err) => stream::once(async move { Err(err) }).boxed(),
        }
    }
}

fn typed_pages<T>(pages: PageStream, endpoint: String) -> TypedPageStream<T>
where
    T: DeserializeOwned + Send + 'static,
{
    pages
        .map(move |page| -> Result<Vec<T>, FetchError> {
            let items = page?;
            items
                .into_iter()
                .map(|item| {
                    serde_json::from_value::<T>(item)
                        .map_err(|err| FetchError::decode(endpoint.as_str(), err))
                })
                .collect()
        })
        .boxed()
}

#[async_trait]
impl GithubClient for RestGithubClient {
    async fn get_org(&self, org: &str) -> Result<OwnerPayload, FetchError> {
        self.get_one(&format!("orgs/{org}")).await
    }

    async fn get_user(&self, login: &str) -> Result<OwnerPayload, FetchError> {
        self.get_one(&format!("users/{login}")).await
    }

    fn list_owner_repos(&self, owner: &str, kind: OwnerKind) -> TypedPageStream<RepoPayload> {
        match kind {
            OwnerKind::Organization => self.pages(&format!("orgs/{owner}/repos"), &[("type", "all")]),
            OwnerKind::User => self.pages(&format!("users/{owner}/repos"), &[("type", "owner")]),
        }
    }

    fn list_org_forks(&self, org: &str) -> TypedPageStream<RepoPayload> {
        self.pages(&format!("orgs/{org}/repos"), &[("type", "forks")])
    }

    fn list_commits(&self, owner: &str, repo: &str) -> TypedPageStream<CommitPayload> {
        self.pages(&format!("repos/{owner}/{repo}/commits"), &[])
    }

    async fn contributor_stats(
        &self,
        owner: &str,
        repo: &str,
    ) -> Result<Option<Vec<ContributorStatsPayload>>, FetchError> {
        let path = format!("repos/{owner}/{repo}/stats/contributors");
        let url = self.fetcher.endpoint(&path, &[])?;
        match self.fetcher.fetch_json(url).await? {
            Value::Null => Ok(None),
            value => serde_json::from_value(value)
                .map(Some)
                .map_err(|err| FetchError::decode(path, err)),
        }
    }
}
