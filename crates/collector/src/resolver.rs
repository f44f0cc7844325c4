use std::collections::HashSet;
use std::sync::Arc;

use futures::TryStreamExt;
use gh_client::FetchError;
use normalizer::{RepoPayload, RepoRef};
use tracing::{debug, info, instrument, warn};

use crate::client::{GithubClient, OwnerKind};
use crate::metrics;

/// What an identifier turned out to be and which of its repositories survive fork exclusion.
#[derive(Debug, Clone, Default)]
pub struct Resolution {
    pub identifier: String,
    pub kind: Option<OwnerKind>,
    pub repos: Vec<RepoRef>,
    pub forks_excluded: usize,
}

impl Resolution {
    fn unresolved(identifier: &str) -> Self {
        Self {
            identifier: identifier.to_string(),
            ..Self::default()
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.kind.is_some()
    }
}

pub struct Resolver {
    client: Arc<dyn GithubClient>,
}

impl Resolver {
    pub fn new(client: Arc<dyn GithubClient>) -> Self {
        Self { client }
    }

    /// Owned repositories minus forks, in listing order. An identifier that is neither an
    /// organization nor a user yields an empty resolution; listing failures are returned.
    #[instrument(skip(self))]
    pub async fn resolve(&self, identifier: &str) -> Result<Resolution, FetchError> {
        let Some(kind) = self.lookup(identifier).await else {
            metrics::UNRESOLVED_OWNERS_TOTAL.inc();
            return Ok(Resolution::unresolved(identifier));
        };

        let owned: Vec<RepoPayload> = self
            .client
            .list_owner_repos(identifier, kind)
            .try_concat()
            .await?;

        let mut forks: HashSet<String> = owned
            .iter()
            .filter(|repo| repo.fork)
            .map(|repo| canonical(&repo.full_name))
            .collect();
        if kind == OwnerKind::Organization {
            let listed: Vec<RepoPayload> = self.client.list_org_forks(identifier).try_concat().await?;
            forks.extend(listed.iter().map(|repo| canonical(&repo.full_name)));
        }

        let mut repos = Vec::with_capacity(owned.len());
        let mut forks_excluded = 0usize;
        for repo in &owned {
            if forks.contains(&canonical(&repo.full_name)) {
                debug!(repo = %repo.full_name, "excluding fork");
                forks_excluded += 1;
                continue;
            }
            match RepoRef::from_full_name(&repo.full_name) {
                Some(reference) => repos.push(reference),
                None => warn!(full_name = %repo.full_name, "ignoring repository with malformed name"),
            }
        }

        info!(
            org = identifier,
            kind = kind.as_str(),
            owned = owned.len(),
            forks = forks_excluded,
            repos = repos.len(),
            "resolved repositories"
        );
        Ok(Resolution {
            identifier: identifier.to_string(),
            kind: Some(kind),
            repos,
            forks_excluded,
        })
    }

    async fn lookup(&self, identifier: &str) -> Option<OwnerKind> {
        match self.client.get_org(identifier).await {
            Ok(_) => return Some(OwnerKind::Organization),
            Err(err) if err.is_not_found() => {}
            Err(err) => {
                warn!(org = identifier, error = %err, "organization lookup failed");
                return None;
            }
        }
        match self.client.get_user(identifier).await {
            Ok(_) => Some(OwnerKind::User),
            Err(err) if err.is_not_found() => {
                warn!(
                    org = identifier,
                    "identifier is neither an organization nor a user, skipping"
                );
                None
            }
            Err(err) => {
                warn!(org = identifier, error = %err, "user lookup failed");
                None
            }
        }
    }
}

fn canonical(full_name: &str) -> String {
    full_name.to_ascii_lowercase()
}
