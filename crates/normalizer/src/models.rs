use std::fmt;

use serde::{Deserialize, Serialize};

/// A repository to collect from. `org` is the owner login as GitHub spells it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepoRef {
    pub org: String,
    pub repo: String,
}

impl RepoRef {
    pub fn new(org: impl Into<String>, repo: impl Into<String>) -> Self {
        Self {
            org: org.into(),
            repo: repo.into(),
        }
    }

    /// Splits `owner/name`; anything else is rejected.
    pub fn from_full_name(full_name: &str) -> Option<Self> {
        let (org, repo) = full_name.trim_matches('/').split_once('/')?;
        if org.is_empty() || repo.is_empty() || repo.contains('/') {
            return None;
        }
        Some(Self {
            org: org.to_string(),
            repo: repo.to_string(),
        })
    }

    pub fn full_name(&self) -> String {
        format!("{}/{}", self.org, self.repo)
    }
}

impl fmt::Display for RepoRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.org, self.repo)
    }
}

/// Flat output rows share a fixed column order so a sink can write a header
/// even when there are no rows.
pub trait TabularRecord: Serialize {
    const FIELDS: &'static [&'static str];
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CommitRecord {
    pub chain: String,
    pub org: String,
    pub repo: String,
    pub commit_committer: String,
    pub commit_author: String,
    pub author: String,
    pub committer: String,
}

impl TabularRecord for CommitRecord {
    const FIELDS: &'static [&'static str] = &[
        "chain",
        "org",
        "repo",
        "commit_committer",
        "commit_author",
        "author",
        "committer",
    ];
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContributorWeekRecord {
    pub chain: String,
    pub org: String,
    pub repo: String,
    pub contributor_login: Option<String>,
    pub contributor_id: Option<i64>,
    pub start_date: String,
    pub additions: i64,
    pub deletions: i64,
    pub commits: i64,
}

impl TabularRecord for ContributorWeekRecord {
    const FIELDS: &'static [&'static str] = &[
        "chain",
        "org",
        "repo",
        "contributor_login",
        "contributor_id",
        "start_date",
        "additions",
        "deletions",
        "commits",
    ];
}
