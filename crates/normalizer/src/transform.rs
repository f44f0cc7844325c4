use chrono::{DateTime, SecondsFormat};
use serde_json::Value;
use tracing::debug;

use crate::models::{CommitRecord, ContributorWeekRecord, RepoRef};
use crate::payloads::{CommitPayload, ContributorStatsPayload};

/// Serializes an identity block verbatim; a missing block becomes `null`.
fn identity_snapshot(value: &Value) -> String {
    value.to_string()
}

pub fn normalize_commit(payload: &CommitPayload, chain: &str, repo: &RepoRef) -> CommitRecord {
    CommitRecord {
        chain: chain.to_string(),
        org: repo.org.clone(),
        repo: repo.repo.clone(),
        commit_committer: identity_snapshot(&payload.commit.committer),
        commit_author: identity_snapshot(&payload.commit.author),
        author: identity_snapshot(&payload.author),
        committer: identity_snapshot(&payload.committer),
    }
}

/// One row per week with at least one commit.
pub fn normalize_contributor_weeks(
    payload: &ContributorStatsPayload,
    chain: &str,
    repo: &RepoRef,
) -> Vec<ContributorWeekRecord> {
    let login = payload.author.as_ref().map(|author| author.login.clone());
    let id = payload.author.as_ref().map(|author| author.id);

    payload
        .weeks
        .iter()
        .filter(|week| week.c > 0)
        .filter_map(|week| {
            let Some(start) = DateTime::from_timestamp(week.w, 0) else {
                debug!(repo = %repo, week = week.w, "skipping week with invalid timestamp");
                return None;
            };
            Some(ContributorWeekRecord {
                chain: chain.to_string(),
                org: repo.org.clone(),
                repo: repo.repo.clone(),
                contributor_login: login.clone(),
                contributor_id: id,
                start_date: start.to_rfc3339_opts(SecondsFormat::Secs, true),
                additions: week.a,
                deletions: week.d,
                commits: week.c,
            })
        })
        .collect()
}
