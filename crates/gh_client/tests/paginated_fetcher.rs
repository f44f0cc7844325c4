use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use futures::StreamExt;
use gh_client::{FetchError, FetcherSettings, GithubToken, HttpExec, PaginatedFetcher, TokenPool};
use http::{Request, Response, StatusCode};
use serde_json::{json, Value};

#[derive(Default)]
struct ScriptedExec {
    responses: Mutex<VecDeque<Result<Response<Vec<u8>>>>>,
    seen: Mutex<Vec<(String, String)>>,
}

impl ScriptedExec {
    fn new(responses: Vec<Result<Response<Vec<u8>>>>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into()),
            seen: Mutex::new(Vec::new()),
        })
    }

    fn requests(&self) -> Vec<(String, String)> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl HttpExec for ScriptedExec {
    async fn execute(&self, req: Request<Vec<u8>>) -> Result<Response<Vec<u8>>> {
        let auth = req
            .headers()
            .get(http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        self.seen.lock().unwrap().push((req.uri().to_string(), auth));
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(anyhow::anyhow!("script exhausted")))
    }
}

fn json_response(status: StatusCode, body: Value) -> Result<Response<Vec<u8>>> {
    Ok(Response::builder()
        .status(status)
        .header("content-type", "application/json")
        .body(body.to_string().into_bytes())
        .unwrap())
}

fn raw_response(status: StatusCode, body: &str) -> Result<Response<Vec<u8>>> {
    Ok(Response::builder()
        .status(status)
        .body(body.as_bytes().to_vec())
        .unwrap())
}

fn fetcher(exec: Arc<ScriptedExec>, token_ids: &[&str]) -> PaginatedFetcher {
    let tokens = token_ids
        .iter()
        .map(|id| GithubToken {
            id: id.to_string(),
            secret: format!("secret-{id}"),
        })
        .collect();
    let pool = TokenPool::new(tokens).expect("pool");
    PaginatedFetcher::new(exec, pool, "http://stub.local", FetcherSettings::default())
        .expect("fetcher")
}

fn page_param(uri: &str) -> Option<String> {
    url::Url::parse(uri)
        .ok()?
        .query_pairs()
        .find(|(k, _)| k == "page")
        .map(|(_, v)| v.into_owned())
}

#[tokio::test]
async fn stops_at_first_empty_page() -> Result<()> {
    let exec = ScriptedExec::new(vec![
        json_response(StatusCode::OK, json!([{"n": 1}, {"n": 2}])),
        json_response(StatusCode::OK, json!([{"n": 3}])),
        json_response(StatusCode::OK, json!([])),
        json_response(StatusCode::OK, json!([{"n": 99}])),
    ]);
    let fetcher = fetcher(exec.clone(), &["a"]);
    let url = fetcher.endpoint("repos/acme/core/commits", &[])?;

    let pages: Vec<Vec<Value>> = fetcher
        .fetch_all(url)
        .collect::<Vec<_>>()
        .await
        .into_iter()
        .collect::<Result<_, _>>()?;

    assert_eq!(pages.len(), 2);
    assert_eq!(pages[0].len(), 2);
    assert_eq!(pages[1][0]["n"], 3);

    let requested: Vec<_> = exec
        .requests()
        .iter()
        .map(|(uri, _)| page_param(uri))
        .collect();
    assert_eq!(
        requested,
        vec![Some("1".into()), Some("2".into()), Some("3".into())]
    );
    assert!(exec.requests()[0].0.contains("per_page=100"));
    Ok(())
}

#[tokio::test]
async fn single_forbidden_rotates_credential_and_succeeds() -> Result<()> {
    let exec = ScriptedExec::new(vec![
        raw_response(StatusCode::FORBIDDEN, "{\"message\":\"Bad credentials\"}"),
        json_response(StatusCode::OK, json!([{"n": 1}])),
        json_response(StatusCode::OK, json!([])),
    ]);
    let fetcher = fetcher(exec.clone(), &["a", "b"]);
    let url = fetcher.endpoint("orgs/acme/repos", &[("type", "forks")])?;

    let pages: Vec<_> = fetcher.fetch_all(url).collect().await;
    assert_eq!(pages.len(), 1);
    assert!(pages[0].is_ok());

    let requests = exec.requests();
    assert_eq!(requests.len(), 3);
    assert_eq!(page_param(&requests[0].0), page_param(&requests[1].0));
    assert_ne!(requests[0].1, requests[1].1, "retry must use another credential");
    assert!(requests[0].1.starts_with("Bearer "));
    Ok(())
}

#[tokio::test]
async fn second_consecutive_forbidden_surfaces_exhaustion() -> Result<()> {
    let exec = ScriptedExec::new(vec![
        raw_response(StatusCode::FORBIDDEN, ""),
        raw_response(StatusCode::FORBIDDEN, ""),
        json_response(StatusCode::OK, json!([{"n": 1}])),
    ]);
    let fetcher = fetcher(exec.clone(), &["a", "b"]);
    let url = fetcher.endpoint("repos/acme/core/commits", &[])?;

    let results: Vec<_> = fetcher.fetch_all(url).collect().await;
    assert_eq!(results.len(), 1, "stream ends after the error");
    assert!(matches!(
        results[0],
        Err(FetchError::RateLimitExhausted { attempts: 2, .. })
    ));
    assert_eq!(exec.requests().len(), 2);
    Ok(())
}

#[tokio::test]
async fn malformed_body_is_retried_once() -> Result<()> {
    let exec = ScriptedExec::new(vec![
        raw_response(StatusCode::OK, "<html>unicorn</html>"),
        json_response(StatusCode::OK, json!({"login": "acme"})),
    ]);
    let fetcher = fetcher(exec.clone(), &["a"]);
    let value = fetcher
        .fetch_json(fetcher.endpoint("orgs/acme", &[])?)
        .await?;
    assert_eq!(value["login"], "acme");
    assert_eq!(exec.requests().len(), 2);
    Ok(())
}

#[tokio::test]
async fn non_array_page_counts_as_transient() -> Result<()> {
    let exec = ScriptedExec::new(vec![
        json_response(StatusCode::OK, json!({"message": "oops"})),
        json_response(StatusCode::OK, json!({"message": "oops"})),
    ]);
    let fetcher = fetcher(exec.clone(), &["a"]);
    let url = fetcher.endpoint("orgs/acme/repos", &[])?;
    let results: Vec<_> = fetcher.fetch_all(url).collect().await;
    assert!(matches!(results[0], Err(FetchError::Transient { .. })));
    assert_eq!(exec.requests().len(), 2);
    Ok(())
}

#[tokio::test]
async fn not_found_is_not_retried() -> Result<()> {
    let exec = ScriptedExec::new(vec![raw_response(StatusCode::NOT_FOUND, "{}")]);
    let fetcher = fetcher(exec.clone(), &["a", "b"]);
    let err = fetcher
        .fetch_json(fetcher.endpoint("orgs/nobody", &[])?)
        .await
        .unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(exec.requests().len(), 1);
    Ok(())
}

#[tokio::test]
async fn repeated_network_failures_escalate_as_transient() -> Result<()> {
    let exec = ScriptedExec::new(vec![
        Err(anyhow::anyhow!("connection reset")),
        Err(anyhow::anyhow!("connection reset")),
    ]);
    let fetcher = fetcher(exec.clone(), &["a"]);
    let err = fetcher
        .fetch_json(fetcher.endpoint("users/someone", &[])?)
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::Transient { .. }));
    assert_eq!(exec.requests().len(), 2);
    Ok(())
}

#[tokio::test]
async fn repeated_server_errors_escalate_as_transient() -> Result<()> {
    let exec = ScriptedExec::new(vec![
        raw_response(StatusCode::BAD_GATEWAY, "<html>bad gateway</html>"),
        raw_response(StatusCode::BAD_GATEWAY, "<html>bad gateway</html>"),
    ]);
    let fetcher = fetcher(exec.clone(), &["a"]);
    let err = fetcher
        .fetch_json(fetcher.endpoint("orgs/acme", &[])?)
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::Transient { .. }));
    assert!(err.is_retryable());
    assert_eq!(exec.requests().len(), 2);
    Ok(())
}

#[tokio::test]
async fn server_error_recovers_on_the_next_attempt() -> Result<()> {
    let exec = ScriptedExec::new(vec![
        raw_response(StatusCode::BAD_GATEWAY, "<html>bad gateway</html>"),
        json_response(StatusCode::OK, json!([{"id": 1}])),
        json_response(StatusCode::OK, json!([])),
    ]);
    let fetcher = fetcher(exec.clone(), &["a", "b"]);
    let url = fetcher.endpoint("orgs/acme/repos", &[])?;
    let items: Vec<Value> = fetcher
        .fetch_all(url)
        .collect::<Vec<_>>()
        .await
        .into_iter()
        .collect::<Result<Vec<_>, _>>()?
        .into_iter()
        .flatten()
        .collect();
    assert_eq!(items, vec![json!({"id": 1})]);
    assert_eq!(exec.requests().len(), 3);
    Ok(())
}

#[tokio::test]
async fn client_errors_other_than_refusals_are_not_retried() -> Result<()> {
    let exec = ScriptedExec::new(vec![raw_response(
        StatusCode::UNPROCESSABLE_ENTITY,
        r#"{"message":"Validation Failed"}"#,
    )]);
    let fetcher = fetcher(exec.clone(), &["a"]);
    let err = fetcher
        .fetch_json(fetcher.endpoint("orgs/acme", &[])?)
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), Some(StatusCode::UNPROCESSABLE_ENTITY));
    assert_eq!(exec.requests().len(), 1);
    Ok(())
}

#[tokio::test]
async fn accepted_statistics_come_back_as_null() -> Result<()> {
    let exec = ScriptedExec::new(vec![raw_response(StatusCode::ACCEPTED, "")]);
    let fetcher = fetcher(exec, &["a"]);
    let value = fetcher
        .fetch_json(fetcher.endpoint("repos/acme/core/stats/contributors", &[])?)
        .await?;
    assert!(value.is_null());
    Ok(())
}

#[tokio::test]
async fn rate_limit_headers_feed_the_pool() -> Result<()> {
    let response = Response::builder()
        .status(StatusCode::OK)
        .header("x-ratelimit-limit", "5000")
        .header("x-ratelimit-remaining", "42")
        .header("x-ratelimit-reset", "4000000000")
        .body(b"{}".to_vec())
        .unwrap();
    let exec = ScriptedExec::new(vec![Ok(response)]);
    let fetcher = fetcher(exec, &["a"]);
    fetcher
        .fetch_json(fetcher.endpoint("orgs/acme", &[])?)
        .await?;
    let state = fetcher.pool().state_of("a").await.expect("state");
    assert_eq!(state.remaining, 42);
    Ok(())
}
