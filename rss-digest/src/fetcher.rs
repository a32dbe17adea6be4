use crate::types::{FeedError, FetchConfig};
use backoff::{backoff::Backoff, exponential::ExponentialBackoff};
use reqwest::{Client, Response};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

fn http_error(e: reqwest::Error) -> FeedError {
    if e.is_timeout() {
        FeedError::Http(format!("request timed out: {}", e))
    } else {
        FeedError::Http(e.to_string())
    }
}

/// Downloads feed documents. One request at a time; retries transient
/// failures with exponential backoff.
pub struct Fetcher {
    client: Client,
    config: FetchConfig,
}

impl Fetcher {
    pub fn new(config: FetchConfig) -> Result<Self, FeedError> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_seconds))
            .gzip(true)
            .deflate(true)
            .brotli(true)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .build()
            .map_err(http_error)?;

        Ok(Self { client, config })
    }

    /// Returns the body of `url`, or the last error seen once retries are
    /// exhausted.
    pub async fn fetch_document(&self, url: &str) -> Result<String, FeedError> {
        url::Url::parse(url).map_err(|e| FeedError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        let start_time = Instant::now();
        debug!("Fetching feed: {}", url);

        let mut backoff: ExponentialBackoff<backoff::SystemClock> = ExponentialBackoff {
            current_interval: Duration::from_secs(self.config.retry_delay_seconds),
            initial_interval: Duration::from_secs(self.config.retry_delay_seconds),
            max_interval: Duration::from_secs(self.config.retry_delay_seconds * 8),
            multiplier: 2.0,
            // attempts are bounded by max_retries instead
            max_elapsed_time: None,
            ..Default::default()
        };

        let mut last_error = None;

        for attempt in 0..=self.config.max_retries {
            match self.client.get(url).send().await {
                Ok(response) => {
                    let status = response.status();
                    if !status.is_success() {
                        last_error = Some(FeedError::Status {
                            status: status.as_u16(),
                            reason: status.canonical_reason().unwrap_or("Unknown").to_string(),
                        });
                        // 4xx will not get better by asking again
                        if status.is_client_error() {
                            break;
                        }
                    } else {
                        match self.read_body(response).await {
                            Ok(content) => {
                                info!(
                                    "Fetched feed: {} ({} bytes in {}ms)",
                                    url,
                                    content.len(),
                                    start_time.elapsed().as_millis()
                                );
                                return Ok(content);
                            }
                            Err(e @ FeedError::TooLarge { .. }) => return Err(e),
                            Err(e) => last_error = Some(e),
                        }
                    }
                }
                Err(e) => last_error = Some(http_error(e)),
            }

            if attempt < self.config.max_retries {
                if let Some(delay) = backoff.next_backoff() {
                    warn!("Attempt {} failed for {}, retrying in {:?}", attempt + 1, url, delay);
                    tokio::time::sleep(delay).await;
                    continue;
                }
            }
            break;
        }

        Err(last_error.unwrap_or_else(|| FeedError::Http("Unknown error".to_string())))
    }

    async fn read_body(&self, response: Response) -> Result<String, FeedError> {
        let limit = self.config.max_feed_size_mb * 1024 * 1024;
        if let Some(content_length) = response.content_length() {
            if content_length as usize > limit {
                return Err(FeedError::TooLarge {
                    size_mb: content_length as usize / (1024 * 1024),
                });
            }
        }

        let content = response.text().await.map_err(http_error)?;
        if content.len() > limit {
            return Err(FeedError::TooLarge {
                size_mb: content.len() / (1024 * 1024),
            });
        }
        Ok(content)
    }
}
