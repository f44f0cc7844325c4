use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use common::AppError;
use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::{debug, info};

use crate::metrics;
use crate::model::RateLimitUpdate;

#[derive(Clone, PartialEq, Eq)]
pub struct GithubToken {
    pub id: String,
    pub secret: String,
}

impl fmt::Debug for GithubToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GithubToken")
            .field("id", &self.id)
            .field("secret", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct RateLimitState {
    pub limit: i64,
    pub remaining: i64,
    pub reset_at: DateTime<Utc>,
}

impl Default for RateLimitState {
    fn default() -> Self {
        Self::new()
    }
}

impl RateLimitState {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            limit: 5000,
            remaining: 5000,
            reset_at: now,
        }
    }

    pub fn update(&mut self, update: RateLimitUpdate) {
        self.limit = update.limit;
        self.remaining = update.remaining;
        self.reset_at = update.reset;
    }

    pub fn consume(&mut self, cost: i64) {
        self.remaining = (self.remaining - cost).max(0);
    }

    /// An exhausted budget whose window has closed gets its full limit back.
    fn refresh(&mut self, now: DateTime<Utc>) {
        if self.remaining <= 0 && self.reset_at <= now {
            self.remaining = self.limit.max(1);
        }
    }
}

#[derive(Debug)]
struct TokenState {
    token: GithubToken,
    rate: RateLimitState,
    /// Set after a refusal. Rate-limit headers from other in-flight calls never lift it.
    parked_until: Option<DateTime<Utc>>,
}

/// Shared credential pool. Selection and budget accounting happen under one lock,
/// so concurrent acquirers never both spend the last call of a credential.
#[derive(Clone)]
pub struct TokenPool {
    inner: Arc<Mutex<Vec<TokenState>>>,
    size: usize,
}

#[derive(Debug)]
pub enum TokenSelection {
    Token(GithubToken),
    Wait(Duration),
}

impl TokenPool {
    pub fn new(tokens: Vec<GithubToken>) -> Result<Self, AppError> {
        if tokens.is_empty() {
            return Err(AppError::configuration("no GitHub tokens configured"));
        }
        let size = tokens.len();
        let states = tokens
            .into_iter()
            .map(|token| TokenState {
                token,
                rate: RateLimitState::new(),
                parked_until: None,
            })
            .collect();
        Ok(Self {
            inner: Arc::new(Mutex::new(states)),
            size,
        })
    }

    pub fn len(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Hands out the credential with the largest remaining share of its budget and
    /// charges it one call, or reports how long until the earliest window resets.
    pub async fn pick_token(&self) -> TokenSelection {
        let mut guard = self.inner.lock().await;
        let now = Utc::now();
        let mut best: Option<(f64, usize)> = None;
        let mut next_reset: Option<Duration> = None;

        for (idx, state) in guard.iter_mut().enumerate() {
            match state.parked_until {
                Some(until) if until > now => {
                    let wait = (until - now).to_std().unwrap_or_default();
                    next_reset = Some(next_reset.map_or(wait, |existing| existing.min(wait)));
                    continue;
                }
                Some(_) => state.parked_until = None,
                None => {}
            }
            let rl = &mut state.rate;
            rl.refresh(now);
            if rl.remaining > 0 {
                let score = rl.remaining as f64 / rl.limit.max(1) as f64;
                match best {
                    None => best = Some((score, idx)),
                    Some((best_score, _)) if score > best_score => best = Some((score, idx)),
                    _ => {}
                }
            } else {
                let wait = (rl.reset_at - now).to_std().unwrap_or_default();
                next_reset = Some(next_reset.map_or(wait, |existing| existing.min(wait)));
            }
        }

        match best {
            Some((_, idx)) => {
                let state = &mut guard[idx];
                state.rate.consume(1);
                metrics::RATE_REMAINING
                    .with_label_values(&[state.token.id.as_str()])
                    .set(state.rate.remaining);
                TokenSelection::Token(state.token.clone())
            }
            None => TokenSelection::Wait(next_reset.unwrap_or(Duration::from_secs(1))),
        }
    }

    /// Waits out exhausted windows until some credential has budget again.
    pub async fn acquire(&self) -> GithubToken {
        loop {
            match self.pick_token().await {
                TokenSelection::Token(token) => {
                    debug!(token = %token.id, "acquired credential");
                    return token;
                }
                TokenSelection::Wait(wait) => {
                    info!(
                        wait_secs = wait.as_secs_f64(),
                        "no credential with usable rate limit, sleeping"
                    );
                    metrics::SLEEP_SECONDS.inc_by(wait.as_secs());
                    sleep(wait).await;
                }
            }
        }
    }

    pub async fn update(&self, token_id: &str, update: RateLimitUpdate) {
        let mut guard = self.inner.lock().await;
        if let Some(state) = guard.iter_mut().find(|state| state.token.id == token_id) {
            state.rate.update(update);
            metrics::RATE_REMAINING
                .with_label_values(&[token_id])
                .set(state.rate.remaining);
        }
    }

    /// Takes a credential out of rotation until `until`.
    pub async fn park(&self, token_id: &str, until: DateTime<Utc>) {
        let mut guard = self.inner.lock().await;
        if let Some(state) = guard.iter_mut().find(|state| state.token.id == token_id) {
            let until = state.parked_until.map_or(until, |existing| existing.max(until));
            state.parked_until = Some(until);
            metrics::RATE_REMAINING.with_label_values(&[token_id]).set(0);
        }
    }

    pub async fn state_of(&self, token_id: &str) -> Option<RateLimitState> {
        let guard = self.inner.lock().await;
        guard
            .iter()
            .find(|state| state.token.id == token_id)
            .map(|state| state.rate.clone())
    }
}
