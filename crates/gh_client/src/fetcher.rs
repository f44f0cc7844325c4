use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use futures::stream::{self, BoxStream, StreamExt};
use http::{header, Request, StatusCode};
use serde_json::Value;
use tracing::{debug, instrument, warn};
use url::Url;

use crate::error::FetchError;
use crate::exec::HttpExec;
use crate::metrics;
use crate::model::{forbidden_until, parse_rate_limit};
use crate::token::{GithubToken, TokenPool};

pub type PageStream = BoxStream<'static, Result<Vec<Value>, FetchError>>;

#[derive(Debug, Clone)]
pub struct FetcherSettings {
    pub user_agent: String,
    pub per_page: u32,
    /// Extra attempts after the first one, each with a freshly acquired credential.
    pub max_retries: u32,
    pub forbidden_cooldown: Duration,
}

impl Default for FetcherSettings {
    fn default() -> Self {
        Self {
            user_agent: "crypto-ecosystem-collector".to_string(),
            per_page: 100,
            max_retries: 1,
            forbidden_cooldown: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Expect {
    Array,
    Any,
}

struct Inner {
    exec: Arc<dyn HttpExec>,
    pool: TokenPool,
    base: Url,
    settings: FetcherSettings,
}

/// Authenticated GET access to the REST API with credential rotation.
#[derive(Clone)]
pub struct PaginatedFetcher {
    inner: Arc<Inner>,
}

impl PaginatedFetcher {
    pub fn new(
        exec: Arc<dyn HttpExec>,
        pool: TokenPool,
        base: &str,
        settings: FetcherSettings,
    ) -> Result<Self, FetchError> {
        let base = if base.ends_with('/') {
            base.to_string()
        } else {
            format!("{base}/")
        };
        let base = Url::parse(&base).map_err(|err| FetchError::Request(err.into()))?;
        Ok(Self {
            inner: Arc::new(Inner {
                exec,
                pool,
                base,
                settings,
            }),
        })
    }

    pub fn pool(&self) -> &TokenPool {
        &self.inner.pool
    }

    /// Resolves `path` against the API base and appends `params` as query pairs.
    pub fn endpoint(&self, path: &str, params: &[(&str, &str)]) -> Result<Url, FetchError> {
        let mut url = self
            .inner
            .base
            .join(path)
            .map_err(|err| FetchError::Request(err.into()))?;
        if !params.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in params {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }

    /// Single, non-paginated resource. 202 and 204 come back as `Value::Null`.
    pub async fn fetch_json(&self, url: Url) -> Result<Value, FetchError> {
        self.get_with_retry(&url, Expect::Any).await
    }

    /// Lazily walks `page=1,2,...` until the first empty page. The stream yields only
    /// non-empty pages and stops after the first error.
    pub fn fetch_all(&self, url: Url) -> PageStream {
        let fetcher = self.clone();
        stream::try_unfold(1u32, move |page| {
            let fetcher = fetcher.clone();
            let url = url.clone();
            async move {
                let items = fetcher.fetch_page(&url, page).await?;
                if items.is_empty() {
                    debug!(url = %url, page, "pagination finished");
                    Ok(None)
                } else {
                    metrics::PAGES_TOTAL.inc();
                    Ok(Some((items, page + 1)))
                }
            }
        })
        .boxed()
    }

    async fn fetch_page(&self, url: &Url, page: u32) -> Result<Vec<Value>, FetchError> {
        let mut paged = url.clone();
        paged
            .query_pairs_mut()
            .append_pair("page", &page.to_string())
            .append_pair("per_page", &self.inner.settings.per_page.to_string());
        match self.get_with_retry(&paged, Expect::Array).await? {
            Value::Array(items) => Ok(items),
            _ => Ok(Vec::new()),
        }
    }

    #[instrument(skip_all, fields(url = %url))]
    async fn get_with_retry(&self, url: &Url, expect: Expect) -> Result<Value, FetchError> {
        let endpoint = endpoint_label(url);
        let attempts = self.inner.settings.max_retries.saturating_add(1);
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let token = self.inner.pool.acquire().await;
            match self.execute_once(&token, url, &endpoint, expect).await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && attempt < attempts => {
                    warn!(
                        attempt,
                        endpoint = %endpoint,
                        token = %token.id,
                        error = %err,
                        "GitHub request failed, retrying with a fresh credential"
                    );
                    metrics::RETRIES_TOTAL
                        .with_label_values(&[err.reason()])
                        .inc();
                }
                Err(FetchError::RateLimited { .. }) => {
                    return Err(FetchError::RateLimitExhausted {
                        endpoint,
                        attempts: attempt,
                    });
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn execute_once(
        &self,
        token: &GithubToken,
        url: &Url,
        endpoint: &str,
        expect: Expect,
    ) -> Result<Value, FetchError> {
        let request = Request::builder()
            .method("GET")
            .uri(url.as_str())
            .header(header::USER_AGENT, self.inner.settings.user_agent.as_str())
            .header(header::ACCEPT, "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28")
            .header(header::AUTHORIZATION, format!("Bearer {}", token.secret))
            .body(Vec::new())
            .map_err(|err| FetchError::Request(err.into()))?;

        let start = Instant::now();
        let response = self
            .inner
            .exec
            .execute(request)
            .await
            .map_err(|err| FetchError::transient(endpoint, err))?;
        metrics::LATENCY.observe(start.elapsed().as_secs_f64());

        let status = response.status();
        metrics::REQUESTS_TOTAL
            .with_label_values(&[metrics::status_class(status)])
            .inc();

        if let Some(update) = parse_rate_limit(response.headers()) {
            self.inner.pool.update(&token.id, update).await;
        }

        match status {
            StatusCode::ACCEPTED | StatusCode::NO_CONTENT => Ok(Value::Null),
            StatusCode::FORBIDDEN | StatusCode::TOO_MANY_REQUESTS => {
                let until = forbidden_until(
                    response.headers(),
                    Utc::now(),
                    self.inner.settings.forbidden_cooldown,
                );
                warn!(
                    status = %status,
                    endpoint = %endpoint,
                    token = %token.id,
                    parked_until = %until,
                    github_request_id = response
                        .headers()
                        .get("x-github-request-id")
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or("-"),
                    "GitHub refused the credential"
                );
                self.inner.pool.park(&token.id, until).await;
                Err(FetchError::RateLimited {
                    status,
                    endpoint: endpoint.to_string(),
                })
            }
            StatusCode::NOT_FOUND => Err(FetchError::NotFound {
                endpoint: endpoint.to_string(),
            }),
            status if status.is_success() => {
                let value: Value = serde_json::from_slice(response.body())
                    .map_err(|err| FetchError::transient(endpoint, err))?;
                let acceptable =
                    expect == Expect::Any || matches!(value, Value::Array(_) | Value::Null);
                if acceptable {
                    Ok(value)
                } else {
                    Err(FetchError::transient(
                        endpoint,
                        anyhow::anyhow!("expected a JSON array"),
                    ))
                }
            }
            status if status.is_server_error() => {
                warn!(
                    status = %status,
                    endpoint = %endpoint,
                    body_preview = %body_preview(response.body()),
                    "GitHub server error"
                );
                Err(FetchError::transient(
                    endpoint,
                    anyhow::anyhow!("server error {status}"),
                ))
            }
            status => {
                warn!(
                    status = %status,
                    endpoint = %endpoint,
                    body_preview = %body_preview(response.body()),
                    "GitHub returned error response"
                );
                Err(FetchError::Status {
                    status,
                    endpoint: endpoint.to_string(),
                })
            }
        }
    }
}

fn endpoint_label(url: &Url) -> String {
    url.path().trim_start_matches('/').to_string()
}

fn body_preview(body: &[u8]) -> String {
    let text = String::from_utf8_lossy(body);
    let mut truncated: String = text.chars().take(256).collect();
    if truncated.len() < text.len() {
        truncated.push('…');
    }
    truncated
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_preview_truncates_long_bodies() {
        let body = "x".repeat(300);
        let preview = body_preview(body.as_bytes());
        assert_eq!(preview.chars().count(), 257);
        assert!(preview.ends_with('…'));
    }

    #[test]
    fn endpoint_label_drops_leading_slash_and_query() {
        let url = Url::parse("https://api.github.com/orgs/acme/repos?page=2").unwrap();
        assert_eq!(endpoint_label(&url), "orgs/acme/repos");
    }
}
