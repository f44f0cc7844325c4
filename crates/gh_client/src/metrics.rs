use once_cell::sync::Lazy;
use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, register_int_gauge_vec,
    Histogram, IntCounter, IntCounterVec, IntGaugeVec,
};

pub static REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "gh_client_requests_total",
        "GitHub requests by status class",
        &["status"]
    )
    .expect("requests total")
});

pub static RETRIES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "gh_client_retries_total",
        "Credential rotations followed by a retry, by reason",
        &["reason"]
    )
    .expect("retries")
});

pub static PAGES_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "gh_client_pages_total",
        "Non-empty pages yielded by the paginated fetcher"
    )
    .expect("pages total")
});

pub static SLEEP_SECONDS: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "gh_client_sleep_seconds_total",
        "Seconds spent waiting for an exhausted credential pool to reset"
    )
    .expect("sleep seconds")
});

pub static RATE_REMAINING: Lazy<IntGaugeVec> = Lazy::new(|| {
    register_int_gauge_vec!(
        "gh_client_rate_remaining",
        "Rate limit remaining per credential",
        &["token"]
    )
    .expect("rate remaining")
});

pub static LATENCY: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!("gh_client_latency_seconds", "GitHub request latency")
        .expect("latency")
});

pub fn status_class(status: http::StatusCode) -> &'static str {
    match status.as_u16() {
        100..=199 => "1xx",
        200..=299 => "2xx",
        300..=399 => "3xx",
        400..=499 => "4xx",
        _ => "5xx",
    }
}
