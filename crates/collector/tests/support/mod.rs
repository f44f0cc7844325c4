#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use collector::{GithubClient, RestGithubClient};
use common::config::CollectorConfig;
use common::CollectionMode;
use gh_client::{FetcherSettings, GithubToken, HttpExec, PaginatedFetcher, TokenPool};
use http::{Request, Response, StatusCode};
use serde_json::{json, Value};

/// One request as the stub saw it. `nth` counts earlier requests to the same path and page.
pub struct Call {
    pub path: String,
    pub query: HashMap<String, String>,
    pub nth: usize,
}

impl Call {
    pub fn page(&self) -> u32 {
        self.query
            .get("page")
            .and_then(|page| page.parse().ok())
            .unwrap_or(1)
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.query.get(key).map(String::as_str)
    }
}

type Handler = dyn Fn(&Call) -> Response<Vec<u8>> + Send + Sync;

/// Transport stub that answers through a routing closure and records every URI.
pub struct RoutedExec {
    handler: Box<Handler>,
    counts: Mutex<HashMap<String, usize>>,
    seen: Mutex<Vec<String>>,
}

impl RoutedExec {
    pub fn new(handler: impl Fn(&Call) -> Response<Vec<u8>> + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(Self {
            handler: Box::new(handler),
            counts: Mutex::new(HashMap::new()),
            seen: Mutex::new(Vec::new()),
        })
    }

    pub fn requests(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }

    pub fn requested(&self, fragment: &str) -> bool {
        self.requests().iter().any(|uri| uri.contains(fragment))
    }
}

#[async_trait]
impl HttpExec for RoutedExec {
    async fn execute(&self, req: Request<Vec<u8>>) -> Result<Response<Vec<u8>>> {
        let uri = req.uri().to_string();
        self.seen.lock().unwrap().push(uri.clone());
        let url = url::Url::parse(&uri)?;
        let query: HashMap<String, String> = url.query_pairs().into_owned().collect();
        let key = format!("{}?page={}", url.path(), query.get("page").map_or("1", String::as_str));
        let nth = {
            let mut counts = self.counts.lock().unwrap();
            let count = counts.entry(key).or_insert(0);
            *count += 1;
            *count - 1
        };
        let call = Call {
            path: url.path().trim_start_matches('/').to_string(),
            query,
            nth,
        };
        Ok((self.handler)(&call))
    }
}

pub fn json_response(status: StatusCode, body: Value) -> Response<Vec<u8>> {
    Response::builder()
        .status(status)
        .header("content-type", "application/json")
        .body(body.to_string().into_bytes())
        .unwrap()
}

pub fn ok(body: Value) -> Response<Vec<u8>> {
    json_response(StatusCode::OK, body)
}

pub fn not_found() -> Response<Vec<u8>> {
    json_response(StatusCode::NOT_FOUND, json!({"message": "Not Found"}))
}

/// Serves `items` as the first page and an empty array afterwards.
pub fn single_page(call: &Call, items: Value) -> Response<Vec<u8>> {
    if call.page() == 1 {
        ok(items)
    } else {
        ok(json!([]))
    }
}

pub fn repo(full_name: &str, fork: bool) -> Value {
    let name = full_name.split('/').nth(1).unwrap_or_default();
    json!({"name": name, "full_name": full_name, "fork": fork})
}

pub fn commit(sha: &str, login: &str) -> Value {
    json!({
        "sha": sha,
        "commit": {
            "author": {"name": login, "email": format!("{login}@example.com"), "date": "2021-01-12T10:00:00Z"},
            "committer": {"name": login, "email": format!("{login}@example.com"), "date": "2021-01-12T10:00:00Z"}
        },
        "author": {"login": login, "id": 1},
        "committer": {"login": login, "id": 1}
    })
}

pub fn client(exec: Arc<RoutedExec>) -> Arc<dyn GithubClient> {
    let tokens = vec![
        GithubToken {
            id: "a".into(),
            secret: "secret-a".into(),
        },
        GithubToken {
            id: "b".into(),
            secret: "secret-b".into(),
        },
    ];
    let pool = TokenPool::new(tokens).expect("pool");
    let settings = FetcherSettings {
        forbidden_cooldown: Duration::ZERO,
        ..FetcherSettings::default()
    };
    let fetcher =
        PaginatedFetcher::new(exec, pool, "http://stub.local", settings).expect("fetcher");
    Arc::new(RestGithubClient::new(fetcher))
}

pub fn write_ecosystem(dir: &Path, chain: &str, content: &str) {
    let letter = chain.chars().next().unwrap().to_lowercase().to_string();
    let folder = dir.join(letter);
    std::fs::create_dir_all(&folder).unwrap();
    std::fs::write(folder.join(format!("{chain}.toml")), content).unwrap();
}

pub fn collector_config(root: &Path, chains: &[&str], mode: CollectionMode) -> CollectorConfig {
    CollectorConfig {
        chains: chains.iter().map(|chain| chain.to_string()).collect(),
        ecosystems_dir: root.join("ecosystems"),
        output_dir: root.join("output"),
        mode,
        max_concurrent_repos: 2,
        repo_retries: 1,
        stats_poll_attempts: 3,
        stats_poll_interval_secs: 0,
    }
}

pub fn read_rows<T: serde::de::DeserializeOwned>(path: &Path) -> Vec<T> {
    let mut reader = csv::Reader::from_path(path).unwrap();
    reader.deserialize().collect::<Result<_, _>>().unwrap()
}
