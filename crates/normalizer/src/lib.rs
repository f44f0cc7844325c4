pub mod models;
pub mod payloads;
pub mod transform;

pub use models::{CommitRecord, ContributorWeekRecord, RepoRef, TabularRecord};
pub use payloads::{
    CommitPayload, ContributorStatsPayload, OwnerPayload, RepoPayload, UserRef, WeekPayload,
};
pub use transform::{normalize_commit, normalize_contributor_weeks};
