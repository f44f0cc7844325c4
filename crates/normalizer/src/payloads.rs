use serde::Deserialize;
use serde_json::Value;

/// `GET /orgs/{org}` or `GET /users/{login}`.
#[derive(Debug, Clone, Deserialize)]
pub struct OwnerPayload {
    pub login: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RepoPayload {
    pub name: String,
    pub full_name: String,
    #[serde(default)]
    pub fork: bool,
}

/// One element of `GET /repos/{owner}/{repo}/commits`. Identity blocks stay as raw
/// JSON because GitHub omits or nulls them freely (unlinked emails, deleted users).
#[derive(Debug, Clone, Deserialize)]
pub struct CommitPayload {
    #[serde(default)]
    pub sha: Option<String>,
    #[serde(default)]
    pub commit: CommitDetail,
    #[serde(default)]
    pub author: Value,
    #[serde(default)]
    pub committer: Value,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CommitDetail {
    #[serde(default)]
    pub author: Value,
    #[serde(default)]
    pub committer: Value,
}

/// One element of `GET /repos/{owner}/{repo}/stats/contributors`.
#[derive(Debug, Clone, Deserialize)]
pub struct ContributorStatsPayload {
    #[serde(default)]
    pub author: Option<UserRef>,
    #[serde(default)]
    pub total: i64,
    #[serde(default)]
    pub weeks: Vec<WeekPayload>,
}

/// `w` is the unix timestamp of the week start; `a`/`d`/`c` are additions,
/// deletions and commits.
#[derive(Debug, Clone, Deserialize)]
pub struct WeekPayload {
    pub w: i64,
    #[serde(default)]
    pub a: i64,
    #[serde(default)]
    pub d: i64,
    #[serde(default)]
    pub c: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserRef {
    pub id: i64,
    pub login: String,
}
