//! Retrying HTTP fetcher.
//!
//! One [`Fetcher`] holds one pooled `reqwest::Client` for the whole run, so the
//! three condition requests per item share connections and the same retry
//! policy.

use std::time::Duration;

use reqwest::{Client, Response, StatusCode};
use tracing::{debug, instrument, warn};

use pricescrape_shared::{FetchConfig, PriceScrapeError, Result};

/// Upper bound on a server-requested `Retry-After` wait.
const MAX_RETRY_AFTER: Duration = Duration::from_secs(120);

/// A successfully fetched page.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// URL as requested (fragment included).
    pub url: String,
    pub status: u16,
    pub body: String,
    /// Requests issued, including the successful one.
    pub attempts: u32,
}

/// HTTP GET with bounded retries and exponential backoff.
pub struct Fetcher {
    config: FetchConfig,
    client: Client,
}

impl Fetcher {
    /// Create a fetcher with its own connection pool.
    pub fn new(config: FetchConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .redirect(reqwest::redirect::Policy::limited(5))
            .timeout(config.timeout)
            .build()
            .map_err(|e| PriceScrapeError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { config, client })
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    /// GET `url`, retrying retryable statuses and transient connection failures.
    ///
    /// After `retries` retries the last failure is returned as a `Network` error.
    /// Non-retryable error statuses fail immediately.
    #[instrument(skip(self), fields(url = %url))]
    pub async fn fetch(&self, url: &str) -> Result<FetchedPage> {
        let max_attempts = self.config.retries.saturating_add(1);
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            debug!(attempt, "sending request");

            match self.client.get(url).send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        let body = response.text().await.map_err(|e| {
                            PriceScrapeError::Network(format!("{url}: body read failed: {e}"))
                        })?;
                        return Ok(FetchedPage {
                            url: url.to_string(),
                            status: status.as_u16(),
                            body,
                            attempts: attempt,
                        });
                    }

                    if !self.config.is_retryable(status.as_u16()) {
                        return Err(PriceScrapeError::Network(format!("{url}: HTTP {status}")));
                    }
                    if attempt >= max_attempts {
                        return Err(PriceScrapeError::Network(format!(
                            "{url}: HTTP {status} after {attempt} attempts"
                        )));
                    }

                    let delay = self.retry_delay(attempt, &response, status);
                    warn!(
                        attempt,
                        status = status.as_u16(),
                        delay_ms = delay.as_millis() as u64,
                        "retryable status, backing off"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) if is_transient(&e) && attempt < max_attempts => {
                    let delay = self.config.backoff_delay(attempt);
                    warn!(
                        attempt,
                        error = %e,
                        delay_ms = delay.as_millis() as u64,
                        "transient request failure, backing off"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    return Err(PriceScrapeError::Network(format!(
                        "{url}: {e} (attempt {attempt} of {max_attempts})"
                    )));
                }
            }
        }
    }

    /// Backoff for the given attempt, stretched to honor `Retry-After` on 429/503.
    fn retry_delay(&self, attempt: u32, response: &Response, status: StatusCode) -> Duration {
        let backoff = self.config.backoff_delay(attempt);
        if status != StatusCode::TOO_MANY_REQUESTS && status != StatusCode::SERVICE_UNAVAILABLE {
            return backoff;
        }
        honor_retry_after(backoff, retry_after(response))
    }
}

/// The longer of our backoff and the server's requested wait, the latter capped.
fn honor_retry_after(backoff: Duration, requested: Option<Duration>) -> Duration {
    match requested {
        Some(wait) if wait > backoff => wait.min(MAX_RETRY_AFTER),
        _ => backoff,
    }
}

/// Parse a `Retry-After` header given in seconds.
fn retry_after(response: &Response) -> Option<Duration> {
    response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

fn is_transient(e: &reqwest::Error) -> bool {
    e.is_connect() || e.is_timeout()
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fast_config(retries: u32) -> FetchConfig {
        FetchConfig {
            retries,
            backoff_factor: 0.0,
            ..FetchConfig::default()
        }
    }

    #[tokio::test]
    async fn retries_503_then_succeeds() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/game/nes/super-game"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/game/nes/super-game"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>ok</html>"))
            .mount(&server)
            .await;

        let fetcher = Fetcher::new(fast_config(4)).unwrap();
        let url = format!("{}/game/nes/super-game", server.uri());
        let page = fetcher.fetch(&url).await.expect("fetch succeeds after retries");

        assert_eq!(page.status, 200);
        assert_eq!(page.body, "<html>ok</html>");
        assert_eq!(page.attempts, 3);

        let received = server.received_requests().await.unwrap();
        assert_eq!(received.len(), 3);
    }

    #[tokio::test]
    async fn exhaustion_surfaces_last_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let fetcher = Fetcher::new(fast_config(2)).unwrap();
        let err = fetcher
            .fetch(&format!("{}/game/nes/gone", server.uri()))
            .await
            .unwrap_err();

        assert!(matches!(err, PriceScrapeError::Network(_)));
        assert!(err.to_string().contains("502"));
        assert!(err.to_string().contains("after 3 attempts"));
        assert_eq!(server.received_requests().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn non_retryable_status_fails_fast() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let fetcher = Fetcher::new(fast_config(4)).unwrap();
        let err = fetcher
            .fetch(&format!("{}/game/nes/missing", server.uri()))
            .await
            .unwrap_err();

        assert!(err.to_string().contains("404"));
        assert_eq!(server.received_requests().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn fragment_is_not_sent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/game/nes/super-game"))
            .respond_with(ResponseTemplate::new(200).set_body_string("body"))
            .mount(&server)
            .await;

        let fetcher = Fetcher::new(fast_config(0)).unwrap();
        let url = format!("{}/game/nes/super-game#completed-auctions-cib", server.uri());
        let page = fetcher.fetch(&url).await.unwrap();
        assert_eq!(page.url, url);
        assert_eq!(page.attempts, 1);
    }

    #[tokio::test]
    async fn retry_after_outweighs_backoff() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/game/nes/busy"))
            .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "1"))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/game/nes/busy"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .mount(&server)
            .await;

        let fetcher = Fetcher::new(fast_config(2)).unwrap();
        let start = std::time::Instant::now();
        let page = fetcher
            .fetch(&format!("{}/game/nes/busy", server.uri()))
            .await
            .unwrap();

        assert!(start.elapsed() >= Duration::from_secs(1), "{:?}", start.elapsed());
        assert_eq!(page.attempts, 2);
    }

    #[tokio::test]
    async fn retry_after_ignored_for_other_statuses() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(502).insert_header("Retry-After", "30"))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .mount(&server)
            .await;

        let fetcher = Fetcher::new(fast_config(1)).unwrap();
        let start = std::time::Instant::now();
        let page = fetcher
            .fetch(&format!("{}/game/nes/flaky", server.uri()))
            .await
            .unwrap();
        assert!(start.elapsed() < Duration::from_secs(5));
        assert_eq!(page.attempts, 2);
    }

    #[test]
    fn retry_after_is_capped() {
        let backoff = Duration::from_secs(2);
        assert_eq!(honor_retry_after(backoff, None), backoff);
        assert_eq!(honor_retry_after(backoff, Some(Duration::from_secs(1))), backoff);
        assert_eq!(
            honor_retry_after(backoff, Some(Duration::from_secs(10))),
            Duration::from_secs(10)
        );
        assert_eq!(
            honor_retry_after(backoff, Some(Duration::from_secs(3600))),
            MAX_RETRY_AFTER
        );
    }

    #[tokio::test]
    async fn max_retries_does_not_overflow() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .mount(&server)
            .await;

        let fetcher = Fetcher::new(fast_config(u32::MAX)).unwrap();
        let page = fetcher
            .fetch(&format!("{}/game/nes/x", server.uri()))
            .await
            .unwrap();
        assert_eq!(page.attempts, 1);
    }

    #[tokio::test]
    async fn connection_refused_is_retried_then_reported() {
        // Bind and drop a listener to get a port with nothing behind it.
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let fetcher = Fetcher::new(fast_config(1)).unwrap();
        let err = fetcher
            .fetch(&format!("http://127.0.0.1:{port}/game/nes/x"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("attempt 2 of 2"));
    }
}
