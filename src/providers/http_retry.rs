//! Retry for backend calls that were answered, but answered "busy".
//!
//! Only 429 and the gateway statuses 502/503/504 are retried, and only when the
//! request body is buffered so it can be sent again. A request that never got a
//! response returns its transport error at once.

use std::time::Duration;

use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Client, Method, Request, RequestBuilder, Response, StatusCode, Url};

/// Longest server-requested wait we honour
const MAX_RETRY_AFTER: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct HttpRetryConfig {
    pub max_retries: u32,
    /// First backoff step; doubled per attempt
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for HttpRetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
        }
    }
}

impl HttpRetryConfig {
    /// Send once, never retry
    pub fn none() -> Self {
        Self { max_retries: 0, ..Self::default() }
    }

    /// Capped exponential backoff plus 10-30% jitter
    fn backoff(&self, attempt: u32) -> Duration {
        let step = self.base_delay.saturating_mul(1u32 << attempt.min(16));
        let capped = step.min(self.max_delay);
        capped + capped.mul_f64(0.1 + rand::random::<f64>() * 0.2)
    }
}

fn wants_retry(status: StatusCode) -> bool {
    matches!(status.as_u16(), 429 | 502 | 503 | 504)
}

/// Numeric `Retry-After` only; HTTP-date values fall back to backoff
fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    let secs = headers.get(RETRY_AFTER)?.to_str().ok()?.trim().parse::<u64>().ok()?;
    Some(Duration::from_secs(secs).min(MAX_RETRY_AFTER))
}

/// A copy of a request that can be sent again
struct Replay {
    method: Method,
    url: Url,
    headers: HeaderMap,
    body: Option<Vec<u8>>,
}

impl Replay {
    /// `None` for streaming bodies, which can only be sent once
    fn capture(request: &Request) -> Option<Self> {
        let body = match request.body() {
            None => None,
            Some(body) => Some(body.as_bytes()?.to_vec()),
        };
        Some(Self {
            method: request.method().clone(),
            url: request.url().clone(),
            headers: request.headers().clone(),
            body,
        })
    }

    fn build(&self, client: &Client) -> RequestBuilder {
        let builder = client
            .request(self.method.clone(), self.url.clone())
            .headers(self.headers.clone());
        match &self.body {
            Some(body) => builder.body(body.clone()),
            None => builder,
        }
    }
}

/// Execute `request`, re-sending it while the backend answers busy.
pub async fn send_with_retry(
    client: &Client,
    request: Request,
    config: &HttpRetryConfig,
) -> Result<Response, reqwest::Error> {
    let replay = Replay::capture(&request);
    let mut response = client.execute(request).await?;
    let Some(replay) = replay else {
        return Ok(response);
    };

    for attempt in 0..config.max_retries {
        if !wants_retry(response.status()) {
            break;
        }
        let delay = retry_after(response.headers()).unwrap_or_else(|| config.backoff(attempt));
        tracing::debug!(
            "[HTTP] {} {} answered {}, retry {}/{} in {:?}",
            replay.method,
            replay.url.path(),
            response.status(),
            attempt + 1,
            config.max_retries,
            delay
        );
        tokio::time::sleep(delay).await;
        response = replay.build(client).send().await?;
    }
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn test_only_busy_statuses_retry() {
        for code in [429, 502, 503, 504] {
            assert!(wants_retry(StatusCode::from_u16(code).unwrap()), "{}", code);
        }
        for code in [200, 401, 403, 404, 500] {
            assert!(!wants_retry(StatusCode::from_u16(code).unwrap()), "{}", code);
        }
    }

    #[test]
    fn test_retry_after_header() {
        let mut headers = HeaderMap::new();
        assert_eq!(retry_after(&headers), None);

        headers.insert(RETRY_AFTER, HeaderValue::from_static("7"));
        assert_eq!(retry_after(&headers), Some(Duration::from_secs(7)));

        headers.insert(RETRY_AFTER, HeaderValue::from_static("86400"));
        assert_eq!(retry_after(&headers), Some(MAX_RETRY_AFTER));

        headers.insert(RETRY_AFTER, HeaderValue::from_static("Wed, 21 Oct 2026 07:28:00 GMT"));
        assert_eq!(retry_after(&headers), None);
    }

    #[test]
    fn test_backoff_grows_and_stays_capped() {
        let config = HttpRetryConfig::default();
        let first = config.backoff(0);
        assert!(first >= Duration::from_millis(540) && first <= Duration::from_millis(660));
        for attempt in 0..40 {
            assert!(config.backoff(attempt) <= config.max_delay.mul_f64(1.31));
        }
        assert_eq!(HttpRetryConfig::none().max_retries, 0);
    }

    #[test]
    fn test_replay_keeps_buffered_body() {
        let client = Client::new();
        let url = Url::parse("https://files.example.com/api/fs/mkdir").unwrap();

        let mut request = Request::new(Method::POST, url.clone());
        *request.body_mut() = Some(br#"{"path":"/a"}"#.to_vec().into());
        let replay = Replay::capture(&request).unwrap();
        let again = replay.build(&client).build().unwrap();
        assert_eq!(again.method(), &Method::POST);
        assert_eq!(again.body().and_then(|b| b.as_bytes()), Some(&br#"{"path":"/a"}"#[..]));

        let bodiless = Request::new(Method::GET, url);
        assert!(Replay::capture(&bodiless).unwrap().body.is_none());
    }
}
