//! HTTP fetching: retrying, throttled, UA/proxy-rotating GET requests that
//! return decoded HTML text, backed by a small pool of clients picked
//! uniformly at random per attempt, one client per configured proxy.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::Rng;
use tracing::{debug, warn};
use url::Url;

use harvester_core::HarvestError;

/// HTTP statuses worth retrying; everything else in the 4xx range is treated
/// as permanent.
const RETRYABLE_STATUSES: &[u16] = &[429, 500, 502, 503, 504];

#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub timeout_seconds: u64,
    pub max_retries: u32,
    pub base_throttle_seconds: f64,
    pub jitter_seconds: f64,
    pub user_agents: Vec<String>,
    pub proxies: Vec<String>,
    /// Extra headers attached to every request, beyond the rotated
    /// User-Agent. Keyed by header name; `BTreeMap` keeps emission order
    /// stable for logging and tests.
    pub headers: BTreeMap<String, String>,
    pub render_js: bool,
    pub max_body_size: usize,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            timeout_seconds: 20,
            max_retries: 2,
            base_throttle_seconds: 0.7,
            jitter_seconds: 0.3,
            user_agents: vec!["harvester/0.1".to_string()],
            proxies: Vec::new(),
            headers: BTreeMap::new(),
            render_js: false,
            max_body_size: 16 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FetchResponse {
    pub url: Url,
    pub final_url: Url,
    pub status: u16,
    pub body: String,
    pub content_type: Option<String>,
    pub fetched_at: DateTime<Utc>,
    pub response_time_ms: u64,
}

/// Pluggable JS-rendering fetch path. The default implementation is always
/// `NotConfigured`; a real browser-backed implementation (e.g. driving a
/// headless Chrome instance) can be supplied by a caller that needs it.
#[async_trait]
pub trait BrowserFetcher: Send + Sync {
    async fn fetch(&self, url: &Url, options: &FetchOptions) -> Result<FetchResponse, HarvestError> {
        let _ = (url, options);
        Err(HarvestError::NotConfigured)
    }
}

pub struct NullBrowserFetcher;

impl BrowserFetcher for NullBrowserFetcher {}

/// A small pool of `reqwest::Client`s, one per configured proxy (or a single
/// proxy-less client when none are configured), picked uniformly at random
/// per attempt — matching the same "pick one per attempt uniformly at
/// random" rotation rule §4.3 specifies for the User-Agent list.
pub struct HttpFetcher {
    clients: Vec<reqwest::Client>,
}

impl HttpFetcher {
    pub fn new(options: &FetchOptions) -> Result<Self, HarvestError> {
        let timeout = Duration::from_secs(options.timeout_seconds);
        let mut clients = Vec::new();

        if options.proxies.is_empty() {
            let client = reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .map_err(|e| HarvestError::Config(e.to_string()))?;
            clients.push(client);
        } else {
            for proxy_url in &options.proxies {
                let proxy = reqwest::Proxy::all(proxy_url)
                    .map_err(|e| HarvestError::Proxy(format!("{proxy_url}: {e}")))?;
                let client = reqwest::Client::builder()
                    .timeout(timeout)
                    .proxy(proxy)
                    .build()
                    .map_err(|e| HarvestError::Proxy(format!("{proxy_url}: {e}")))?;
                clients.push(client);
            }
        }

        Ok(Self { clients })
    }

    fn next_client(&self) -> &reqwest::Client {
        let idx = rand::thread_rng().gen_range(0..self.clients.len());
        &self.clients[idx]
    }
}

fn pick_uniform<'a>(items: &'a [String]) -> Option<&'a str> {
    if items.is_empty() {
        return None;
    }
    let idx = rand::thread_rng().gen_range(0..items.len());
    Some(items[idx].as_str())
}

fn jittered_throttle(base: f64, jitter: f64) -> Duration {
    let extra = if jitter > 0.0 { rand::thread_rng().gen_range(0.0..jitter) } else { 0.0 };
    Duration::from_secs_f64((base + extra).max(0.0))
}

fn backoff_delay(base: f64, attempt: u32, jitter: f64) -> Duration {
    let scaled = base * 1.5f64.powi(attempt as i32);
    let extra = if jitter > 0.0 { rand::thread_rng().gen_range(0.0..jitter) } else { 0.0 };
    Duration::from_secs_f64((scaled + extra).max(0.0))
}

/// Fetch `url` as HTML text, retrying transient failures with exponential
/// backoff and throttling after success. Delegates to `browser` when
/// `options.render_js` is set.
pub async fn fetch(
    url: &Url,
    options: &FetchOptions,
    http: &HttpFetcher,
    browser: &dyn BrowserFetcher,
) -> Result<FetchResponse, HarvestError> {
    if options.render_js {
        return browser.fetch(url, options).await;
    }

    let mut last_status: Option<u16> = None;
    let mut last_error: Option<String> = None;

    for attempt in 0..=options.max_retries {
        let client = http.next_client();
        let ua = pick_uniform(&options.user_agents);
        let start = Instant::now();

        debug!(url = %url, attempt, proxy_count = options.proxies.len(), "fetch: pre-request");

        let mut request = client.get(url.clone());
        if let Some(ua) = ua {
            request = request.header(reqwest::header::USER_AGENT, ua);
        }
        for (name, value) in &options.headers {
            request = request.header(name, value);
        }

        let response = match request.send().await {
            Ok(resp) => resp,
            Err(e) => {
                last_error = Some(e.to_string());
                warn!(url = %url, attempt, error = %e, "fetch: transport error");
                if attempt < options.max_retries {
                    tokio::time::sleep(backoff_delay(options.base_throttle_seconds, attempt, options.jitter_seconds)).await;
                    continue;
                }
                return Err(HarvestError::Network(e.to_string()));
            }
        };

        let status = response.status().as_u16();
        last_status = Some(status);
        let final_url = response.url().clone();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        debug!(url = %url, attempt, status, "fetch: post-response");

        if RETRYABLE_STATUSES.contains(&status) {
            if attempt < options.max_retries {
                tokio::time::sleep(backoff_delay(options.base_throttle_seconds, attempt, options.jitter_seconds)).await;
                continue;
            }
            return Err(HarvestError::Network(format!("exhausted retries, last status {status}")));
        }

        if status >= 400 {
            return Err(HarvestError::Network(format!("http status {status}")));
        }

        let body = response.bytes().await.map_err(|e| HarvestError::Network(e.to_string()))?;
        if body.len() > options.max_body_size {
            return Err(HarvestError::BodyTooLarge { size: body.len(), max: options.max_body_size });
        }

        let html = String::from_utf8_lossy(&body).into_owned();
        let elapsed = start.elapsed();

        tokio::time::sleep(jittered_throttle(options.base_throttle_seconds, options.jitter_seconds)).await;

        return Ok(FetchResponse {
            url: url.clone(),
            final_url: Url::parse(final_url.as_str()).unwrap_or_else(|_| url.clone()),
            status,
            body: html,
            content_type,
            fetched_at: Utc::now(),
            response_time_ms: elapsed.as_millis() as u64,
        });
    }

    Err(HarvestError::Network(
        last_error.unwrap_or_else(|| format!("exhausted retries, last status {last_status:?}")),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_grows_geometrically_with_attempt() {
        let d0 = backoff_delay(1.0, 0, 0.0);
        let d1 = backoff_delay(1.0, 1, 0.0);
        let d2 = backoff_delay(1.0, 2, 0.0);
        assert_eq!(d0.as_secs_f64(), 1.0);
        assert!((d1.as_secs_f64() - 1.5).abs() < 1e-9);
        assert!((d2.as_secs_f64() - 2.25).abs() < 1e-9);
    }

    #[test]
    fn retryable_statuses_match_spec_set() {
        for s in [429, 500, 502, 503, 504] {
            assert!(RETRYABLE_STATUSES.contains(&s));
        }
        for s in [400, 401, 403, 404, 410] {
            assert!(!RETRYABLE_STATUSES.contains(&s));
        }
    }

    #[test]
    fn pick_uniform_returns_none_for_empty_list() {
        assert_eq!(pick_uniform(&[]), None);
    }

    #[tokio::test]
    async fn default_browser_fetcher_is_not_configured() {
        let f = NullBrowserFetcher;
        let url = Url::parse("https://example.com").unwrap();
        let err = f.fetch(&url, &FetchOptions::default()).await.unwrap_err();
        assert!(matches!(err, HarvestError::NotConfigured));
    }
}
