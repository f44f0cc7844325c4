pub mod error;
pub mod exec;
pub mod fetcher;
pub mod metrics;
pub mod model;
pub mod token;

pub use error::FetchError;
pub use exec::{HttpExec, ReqwestExecutor};
pub use fetcher::{FetcherSettings, PageStream, PaginatedFetcher};
pub use model::RateLimitUpdate;
pub use token::{GithubToken, RateLimitState, TokenPool, TokenSelection};
