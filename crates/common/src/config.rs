use std::path::{Path, PathBuf};

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub github: GithubConfig,
    #[serde(default)]
    pub collector: CollectorConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_path(".")
    }

    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        Config::builder()
            .add_source(
                File::with_name(
                    path.as_ref()
                        .join("config/default")
                        .to_string_lossy()
                        .as_ref(),
                )
                .required(false),
            )
            .add_source(
                File::with_name(
                    path.as_ref()
                        .join("config/local")
                        .to_string_lossy()
                        .as_ref(),
                )
                .required(false),
            )
            .add_source(
                Environment::default()
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(" ")
                    .with_list_parse_key("github.pats")
                    .with_list_parse_key("collector.chains"),
            )
            .build()?
            .try_deserialize()
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct GithubToken {
    pub id: String,
    pub secret: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GithubConfig {
    #[serde(default)]
    pub tokens: Vec<GithubToken>,
    /// Bare personal access tokens, typically supplied as `GITHUB__PATS="a b c"`.
    #[serde(default)]
    pub pats: Vec<String>,
    #[serde(default = "GithubConfig::default_user_agent")]
    pub user_agent: String,
    #[serde(default = "GithubConfig::default_api_base")]
    pub api_base: String,
    #[serde(default = "GithubConfig::default_per_page")]
    pub per_page: u32,
    #[serde(default = "GithubConfig::default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "GithubConfig::default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "GithubConfig::default_forbidden_cooldown_secs")]
    pub forbidden_cooldown_secs: u64,
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            tokens: Vec::new(),
            pats: Vec::new(),
            user_agent: Self::default_user_agent(),
            api_base: Self::default_api_base(),
            per_page: Self::default_per_page(),
            request_timeout_secs: Self::default_request_timeout_secs(),
            max_retries: Self::default_max_retries(),
            forbidden_cooldown_secs: Self::default_forbidden_cooldown_secs(),
        }
    }
}

impl GithubConfig {
    fn default_user_agent() -> String {
        "crypto-ecosystem-collector".to_string()
    }

    fn default_api_base() -> String {
        "https://api.github.com/".to_string()
    }

    const fn default_per_page() -> u32 {
        100
    }

    const fn default_request_timeout_secs() -> u64 {
        30
    }

    const fn default_max_retries() -> u32 {
        1
    }

    const fn default_forbidden_cooldown_secs() -> u64 {
        60
    }

    /// Explicit tokens first, then bare PATs as `pat-N`. A secret listed twice is kept once.
    pub fn resolved_tokens(&self) -> Vec<GithubToken> {
        let mut resolved: Vec<GithubToken> = Vec::new();
        let bare = self
            .pats
            .iter()
            .flat_map(|value| value.split_whitespace())
            .enumerate()
            .map(|(idx, secret)| GithubToken {
                id: format!("pat-{}", idx + 1),
                secret: secret.to_string(),
            });

        for token in self.tokens.iter().cloned().chain(bare) {
            if token.secret.trim().is_empty() {
                continue;
            }
            if resolved.iter().any(|existing| existing.secret == token.secret) {
                continue;
            }
            resolved.push(token);
        }
        resolved
    }
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum CollectionMode {
    #[default]
    Commits,
    WeeklyStats,
}

impl CollectionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            CollectionMode::Commits => "commits",
            CollectionMode::WeeklyStats => "weekly_stats",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CollectorConfig {
    #[serde(default)]
    pub chains: Vec<String>,
    #[serde(default = "CollectorConfig::default_ecosystems_dir")]
    pub ecosystems_dir: PathBuf,
    #[serde(default = "CollectorConfig::default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default)]
    pub mode: CollectionMode,
    #[serde(default = "CollectorConfig::default_max_concurrent_repos")]
    pub max_concurrent_repos: usize,
    #[serde(default = "CollectorConfig::default_repo_retries")]
    pub repo_retries: u32,
    #[serde(default = "CollectorConfig::default_stats_poll_attempts")]
    pub stats_poll_attempts: u32,
    #[serde(default = "CollectorConfig::default_stats_poll_interval_secs")]
    pub stats_poll_interval_secs: u64,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            chains: Vec::new(),
            ecosystems_dir: Self::default_ecosystems_dir(),
            output_dir: Self::default_output_dir(),
            mode: CollectionMode::default(),
            max_concurrent_repos: Self::default_max_concurrent_repos(),
            repo_retries: Self::default_repo_retries(),
            stats_poll_attempts: Self::default_stats_poll_attempts(),
            stats_poll_interval_secs: Self::default_stats_poll_interval_secs(),
        }
    }
}

impl CollectorConfig {
    fn default_ecosystems_dir() -> PathBuf {
        PathBuf::from("crypto-ecosystems/data/ecosystems")
    }

    fn default_output_dir() -> PathBuf {
        PathBuf::from("output")
    }

    const fn default_max_concurrent_repos() -> usize {
        2
    }

    const fn default_repo_retries() -> u32 {
        1
    }

    const fn default_stats_poll_attempts() -> u32 {
        3
    }

    const fn default_stats_poll_interval_secs() -> u64 {
        2
    }

    /// Worker count actually used by the dispatcher.
    pub fn worker_count(&self) -> usize {
        self.max_concurrent_repos.max(1)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(default)]
    pub metrics_file: Option<PathBuf>,
}
