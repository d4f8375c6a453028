//! Overpass API client
//!
//! Posts QL queries, retries overloaded-server responses after a pause
//! discovered from the status endpoint, and decodes the JSON payload.

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use once_cell::sync::Lazy;
use reqwest::{Client, ClientBuilder, StatusCode};

use crate::core::config::OverpassConfig;
use crate::core::elements::OverpassResponse;
use crate::core::error::{Error, Result};

/// Maximum number of retry attempts for transport errors
const MAX_RETRY_ATTEMPTS: u32 = 3;

/// Base delay for exponential backoff (in milliseconds)
const BASE_RETRY_DELAY_MS: u64 = 1000;

/// Shared HTTP client; per-request timeouts are set on each request
static GLOBAL_CLIENT: Lazy<Client> = Lazy::new(|| {
    ClientBuilder::new()
        .tcp_keepalive(Duration::from_secs(60))
        .pool_idle_timeout(Duration::from_secs(90))
        .connect_timeout(Duration::from_secs(10))
        .user_agent(format!("butterfly-net/{}", env!("BUTTERFLY_VERSION")))
        .build()
        .expect("Failed to create HTTP client")
});

/// Execute an operation with retry logic for network errors
async fn retry_on_network_error<F, Fut, T>(operation: F) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let mut attempt = 0;

    loop {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(Error::NetworkError(msg)) if attempt < MAX_RETRY_ATTEMPTS => {
                attempt += 1;
                let delay = BASE_RETRY_DELAY_MS * (1 << (attempt - 1));
                warn!("Network error (attempt {attempt}): {msg}. Retrying in {delay}ms...");
                tokio::time::sleep(Duration::from_millis(delay)).await;
            }
            Err(e) => return Err(e),
        }
    }
}

/// What the status endpoint says about the next free query slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotStatus {
    /// At least one slot is free right now
    Available,
    /// A slot frees up after this long (at least one second)
    AvailableIn(Duration),
    /// All slots are taken by running queries
    Busy,
    /// The status text could not be interpreted
    Unknown,
}

/// Interpret the fourth line of the status endpoint's plain-text reply
pub fn parse_status(text: &str, now: DateTime<Utc>) -> SlotStatus {
    let Some(line) = text.split('\n').nth(3) else {
        return SlotStatus::Unknown;
    };
    let tokens: Vec<&str> = line.split(' ').collect();
    let first = tokens.first().copied().unwrap_or_default();

    if first.parse::<i64>().is_ok() {
        return SlotStatus::Available;
    }

    match first {
        "Slot" => {
            let Some(stamp) = tokens.get(3) else {
                return SlotStatus::Unknown;
            };
            match DateTime::parse_from_rfc3339(stamp.trim_end_matches(',')) {
                Ok(slot) => {
                    let millis = (slot.with_timezone(&Utc) - now).num_milliseconds();
                    let secs = (millis as f64 / 1000.0).ceil().max(1.0);
                    SlotStatus::AvailableIn(Duration::from_secs(secs as u64))
                }
                Err(_) => SlotStatus::Unknown,
            }
        }
        "Currently" => SlotStatus::Busy,
        _ => SlotStatus::Unknown,
    }
}

/// Client for one Overpass API instance
#[derive(Debug, Clone, Default)]
pub struct OverpassClient {
    config: OverpassConfig,
}

impl OverpassClient {
    pub fn new(config: OverpassConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &OverpassConfig {
        &self.config
    }

    /// POST a query and return its decoded response
    ///
    /// A reply that is not JSON with status 429 or 504 is retried. The first
    /// retry waits `error_pause` when given; every other wait comes from the
    /// status endpoint. Any other reply without JSON is a
    /// [`Error::ServerError`].
    pub async fn request(
        &self,
        query: &str,
        timeout: u64,
        error_pause: Option<Duration>,
    ) -> Result<OverpassResponse> {
        let client = &*GLOBAL_CLIENT;
        let url = self.config.interpreter_url.as_str();
        let mut error_pause = error_pause;

        loop {
            let start_time = Instant::now();
            debug!("Posting to {url} with timeout={timeout}, \"{query}\"");

            let (status, host, body) = retry_on_network_error(|| async {
                let response = client
                    .post(url)
                    .form(&[("data", query)])
                    .timeout(Duration::from_secs(timeout))
                    .send()
                    .await?;
                let status = response.status();
                let host = response.url().host_str().unwrap_or_default().to_string();
                let body = response.text().await?;
                Ok((status, host, body))
            })
            .await?;

            info!(
                "Downloaded {:.1}KB from {host} in {:.2} seconds",
                body.len() as f64 / 1000.0,
                start_time.elapsed().as_secs_f64()
            );

            match serde_json::from_str::<OverpassResponse>(&body) {
                Ok(response) => {
                    if let Some(remark) = &response.remark {
                        warn!("Server remark: \"{remark}\"");
                    }
                    return Ok(response);
                }
                Err(_) if is_overloaded(status) => {
                    let pause = match error_pause.take() {
                        Some(pause) => pause,
                        None => self.get_pause_duration().await,
                    };
                    warn!(
                        "Server at {host} returned status code {} and no JSON data. Re-trying request in {:.2} seconds.",
                        status.as_u16(),
                        pause.as_secs_f64()
                    );
                    tokio::time::sleep(pause).await;
                }
                Err(_) => {
                    error!(
                        "Server at {host} returned status code {} and no JSON data",
                        status.as_u16()
                    );
                    return Err(Error::ServerError {
                        status: status.as_u16(),
                        body,
                    })
                }
            }
        }
    }

    /// Ask the status endpoint how long to wait for the next free slot
    ///
    /// Never fails: an unreachable endpoint or unrecognized reply yields the
    /// configured default pause. While the server reports running queries the
    /// endpoint is polled again after the configured retry delay.
    pub async fn get_pause_duration(&self) -> Duration {
        let client = &*GLOBAL_CLIENT;
        let url = self.config.status_url.as_str();

        loop {
            let text = match fetch_status(client, url).await {
                Ok(text) => text,
                Err(e) => {
                    error!("Unable to query {url}: {e}");
                    return self.config.default_pause();
                }
            };

            match parse_status(&text, Utc::now()) {
                SlotStatus::Available => return Duration::ZERO,
                SlotStatus::AvailableIn(pause) => return pause,
                SlotStatus::Busy => {
                    debug!("Overpass is running queries, polling status again");
                    tokio::time::sleep(self.config.status_retry_delay()).await;
                }
                SlotStatus::Unknown => {
                    error!("Unrecognized server status: \"{}\"", text.trim());
                    return self.config.default_pause();
                }
            }
        }
    }
}

async fn fetch_status(client: &Client, url: &str) -> Result<String> {
    let response = client.get(url).timeout(Duration::from_secs(30)).send().await?;
    Ok(response.text().await?)
}

fn is_overloaded(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status == StatusCode::GATEWAY_TIMEOUT
}
