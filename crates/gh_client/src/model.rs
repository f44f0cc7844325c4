use chrono::{DateTime, Utc};
use http::{header, HeaderMap};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct RateLimitUpdate {
    pub limit: i64,
    pub remaining: i64,
    pub reset: DateTime<Utc>,
}

pub fn parse_rate_limit(headers: &HeaderMap) -> Option<RateLimitUpdate> {
    let limit = header_i64(headers, "x-ratelimit-limit")?;
    let remaining = header_i64(headers, "x-ratelimit-remaining")?;
    let reset_ts = header_i64(headers, "x-ratelimit-reset")?;
    let reset = DateTime::from_timestamp(reset_ts, 0)?;
    Some(RateLimitUpdate {
        limit,
        remaining,
        reset,
    })
}

fn header_i64(headers: &HeaderMap, name: &str) -> Option<i64> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<i64>().ok())
}

pub fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    let value = headers.get(header::RETRY_AFTER)?.to_str().ok()?;
    if let Ok(seconds) = value.trim().parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }
    let date = httpdate::parse_http_date(value).ok()?;
    date.duration_since(std::time::SystemTime::now()).ok()
}

/// How long a credential that just received a 403/429 stays out of rotation:
/// `Retry-After` wins, then the primary window reset when the budget is spent,
/// otherwise a fixed cooldown.
pub fn forbidden_until(headers: &HeaderMap, now: DateTime<Utc>, cooldown: Duration) -> DateTime<Utc> {
    if let Some(wait) = parse_retry_after(headers) {
        return now + chrono::Duration::from_std(wait).unwrap_or_else(|_| chrono::Duration::zero());
    }
    if let Some(rate) = parse_rate_limit(headers) {
        if rate.remaining <= 0 && rate.reset > now {
            return rate.reset;
        }
    }
    now + chrono::Duration::from_std(cooldown).unwrap_or_else(|_| chrono::Duration::seconds(60))
}
