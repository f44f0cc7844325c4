pub mod client;
pub mod dispatcher;
pub mod ecosystem;
pub mod metrics;
pub mod resolver;
pub mod service;
pub mod sink;
pub mod strategy;

pub use client::{GithubClient, OwnerKind, RestGithubClient, TypedPageStream};
pub use dispatcher::Dispatcher;
pub use ecosystem::{load_ecosystem, Ecosystem};
pub use resolver::{Resolution, Resolver};
pub use service::{ChainSummary, Pipeline, RunSummary};
pub use sink::CsvSink;
pub use strategy::{CollectionStrategy, CommitStrategy, StatsPolling, WeeklyStatsStrategy};
