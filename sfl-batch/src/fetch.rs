//! Fetch source
//!
//! One day of records is collected with a series of searches, each ending at
//! one of sixteen fixed intra-day time points (denser around peak posting
//! hours). Searches run latest-first; every window end is capped at the
//! earliest `created_at` seen so far, so consecutive pages overlap at most at
//! their boundary. The remaining overlap is removed by the deduplicator.

use crate::error::FetchError;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::Deserialize;
use sfl_common::config::{FetchConfig, SearchFilters};
use sfl_common::normalize::normalize;
use sfl_common::time::LocalTime;
use sfl_common::Record;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Environment variable holding the search API bearer token
pub const BEARER_TOKEN_ENV_VAR: &str = "SFL_FETCH_BEARER_TOKEN";

/// Local fetch points as fractional hours; 23.99 stands for 23:59
pub const FETCH_POINTS: [f64; 16] = [
    6.80, 8.86, 9.61, 10.69, 11.50, 12.46, 13.59, 14.67, 15.74, 16.65, 17.59, 18.52, 19.61, 20.87, 22.50, 23.99,
];

/// A search result as delivered by the fetch source
#[derive(Debug, Clone, PartialEq)]
pub struct RawTweet {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub text: String,
    pub truncated: bool,
    pub full_text: Option<String>,
    pub favorite_count: u64,
    pub reply_count: u64,
    pub retweet_count: u64,
    pub quote_count: u64,
    pub user_followers: Option<u64>,
}

impl RawTweet {
    /// Full text for truncated tweets, the short text otherwise
    pub fn body(&self) -> &str {
        match (&self.full_text, self.truncated) {
            (Some(full), true) => full,
            _ => &self.text,
        }
    }

    /// Convert to a record in local time with normalized text
    pub fn into_record(self, local: &LocalTime) -> Record {
        let raw_text = self.body().to_string();
        Record {
            id: self.id,
            created_at: local.to_local(self.created_at),
            text: normalize(&raw_text),
            raw_text,
            favorite_count: self.favorite_count,
            reply_count: self.reply_count,
            retweet_count: self.retweet_count,
            user_followers: self.user_followers,
        }
    }
}

#[async_trait]
pub trait FetchSource: Send + Sync {
    /// Up to `max_results` records created before `window_end`, newest first
    async fn fetch(
        &self,
        window_end: DateTime<Utc>,
        filters: &SearchFilters,
        max_results: u32,
    ) -> Result<Vec<RawTweet>, FetchError>;
}

/// Window ends (UTC) for every fetch point of local `day`
///
/// Returned in fetch-point order (earliest first).
pub fn fetch_points(day: NaiveDate, local: &LocalTime) -> Vec<DateTime<Utc>> {
    FETCH_POINTS
        .iter()
        .filter_map(|point| {
            let hour = point.trunc() as u32;
            let minute = (((point - point.trunc()) * 60.0).round() as u32).min(59);
            NaiveTime::from_hms_opt(hour, minute, 0).map(|time| local.to_utc(day.and_time(time)))
        })
        .collect()
}

/// Enforces a minimum interval between consecutive calls
struct RateLimiter {
    last_request: Mutex<Option<Instant>>,
    min_interval: Duration,
}

impl RateLimiter {
    fn new(min_interval: Duration) -> Self {
        Self {
            last_request: Mutex::new(None),
            min_interval,
        }
    }

    async fn wait(&self) {
        let mut last = self.last_request.lock().await;

        if let Some(last_time) = *last {
            let elapsed = last_time.elapsed();
            if elapsed < self.min_interval {
                let wait_time = self.min_interval - elapsed;
                debug!("Rate limiting: waiting {:?}", wait_time);
                tokio::time::sleep(wait_time).await;
            }
        }

        *last = Some(Instant::now());
    }
}

/// Collects one local day from a [`FetchSource`]
pub struct DayFetcher {
    source: Arc<dyn FetchSource>,
    filters: SearchFilters,
    page_size: u32,
    local: LocalTime,
    rate_limiter: RateLimiter,
}

impl DayFetcher {
    pub fn new(source: Arc<dyn FetchSource>, filters: SearchFilters, page_size: u32, local: LocalTime, pause: Duration) -> Self {
        Self {
            source,
            filters,
            page_size,
            local,
            rate_limiter: RateLimiter::new(pause),
        }
    }

    pub fn from_config(source: Arc<dyn FetchSource>, config: &FetchConfig) -> sfl_common::Result<Self> {
        Ok(Self::new(
            source,
            config.filters.clone(),
            config.page_size,
            LocalTime::from_offset_minutes(config.utc_offset_minutes)?,
            Duration::from_millis(config.fetch_pause_ms),
        ))
    }

    pub fn local_time(&self) -> &LocalTime {
        &self.local
    }

    /// Fetch every window of `day` and convert the results to records
    ///
    /// Records may still contain duplicates and records from the previous
    /// day; both are the deduplicator's job.
    pub async fn fetch_day(&self, day: NaiveDate) -> Result<Vec<Record>, FetchError> {
        self.filters
            .validate()
            .map_err(|e| FetchError::InvalidQuery(e.to_string()))?;

        let mut points = fetch_points(day, &self.local);
        points.sort_unstable_by(|a, b| b.cmp(a));

        let mut tweets: Vec<RawTweet> = Vec::new();
        let mut earliest_seen: Option<DateTime<Utc>> = None;

        for point in points {
            let window_end = match earliest_seen {
                Some(earliest) => point.min(earliest),
                None => point,
            };

            self.rate_limiter.wait().await;
            debug!(window_end = %window_end, "Fetching window");
            let page = self.source.fetch(window_end, &self.filters, self.page_size).await?;

            if let Some(page_min) = page.iter().map(|t| t.created_at).min() {
                earliest_seen = Some(earliest_seen.map_or(page_min, |e| e.min(page_min)));
            }
            tweets.extend(page);
        }

        info!(day = %day, fetched = tweets.len(), "Finished fetch");

        Ok(tweets.into_iter().map(|t| t.into_record(&self.local)).collect())
    }
}

// Search API wire format

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<ApiTweet>,
    next: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiTweet {
    id_str: String,
    created_at: String,
    text: String,
    #[serde(default)]
    truncated: bool,
    extended_tweet: Option<ApiExtendedTweet>,
    #[serde(default)]
    favorite_count: u64,
    #[serde(default)]
    reply_count: u64,
    #[serde(default)]
    retweet_count: u64,
    #[serde(default)]
    quote_count: u64,
    user: Option<ApiUser>,
}

#[derive(Debug, Deserialize)]
struct ApiExtendedTweet {
    full_text: String,
}

#[derive(Debug, Deserialize)]
struct ApiUser {
    followers_count: Option<u64>,
}

const API_TIMESTAMP_FORMAT: &str = "%a %b %d %H:%M:%S %z %Y";

impl TryFrom<ApiTweet> for RawTweet {
    type Error = FetchError;

    fn try_from(tweet: ApiTweet) -> Result<Self, FetchError> {
        let created_at = DateTime::parse_from_str(&tweet.created_at, API_TIMESTAMP_FORMAT)
            .map_err(|e| FetchError::Parse(format!("created_at '{}': {}", tweet.created_at, e)))?
            .with_timezone(&Utc);

        Ok(RawTweet {
            id: tweet.id_str,
            created_at,
            text: tweet.text,
            truncated: tweet.truncated,
            full_text: tweet.extended_tweet.map(|e| e.full_text),
            favorite_count: tweet.favorite_count,
            reply_count: tweet.reply_count,
            retweet_count: tweet.retweet_count,
            quote_count: tweet.quote_count,
            user_followers: tweet.user.and_then(|u| u.followers_count),
        })
    }
}

/// Premium search API client
pub struct HttpFetchSource {
    http_client: reqwest::Client,
    endpoint: String,
    bearer_token: String,
}

impl HttpFetchSource {
    pub fn new(endpoint: &str, bearer_token: &str, timeout: Duration) -> Result<Self, FetchError> {
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("sfl-batch/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|e| FetchError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            endpoint: endpoint.to_string(),
            bearer_token: bearer_token.to_string(),
        })
    }

    /// Build from config, reading the bearer token from the environment
    pub fn from_env(config: &FetchConfig) -> Result<Self, FetchError> {
        let token = std::env::var(BEARER_TOKEN_ENV_VAR)
            .map_err(|_| FetchError::MissingCredentials(format!("{} is not set", BEARER_TOKEN_ENV_VAR)))?;
        Self::new(&config.endpoint, &token, Duration::from_secs(config.timeout_secs))
    }

    async fn fetch_page(
        &self,
        query: &str,
        to_date: &str,
        max_results: u32,
        next: Option<&str>,
    ) -> Result<SearchResponse, FetchError> {
        let mut body = serde_json::json!({
            "query": query,
            "maxResults": max_results,
            "toDate": to_date,
        });
        if let Some(next) = next {
            body["next"] = serde_json::Value::String(next.to_string());
        }

        let response = self
            .http_client
            .post(&self.endpoint)
            .bearer_auth(&self.bearer_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        let status = response.status();

        if status.as_u16() == 429 {
            return Err(FetchError::RateLimited);
        }

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(FetchError::Api(status.as_u16(), error_text));
        }

        response
            .json()
            .await
            .map_err(|e| FetchError::Parse(e.to_string()))
    }
}

#[async_trait]
impl FetchSource for HttpFetchSource {
    async fn fetch(
        &self,
        window_end: DateTime<Utc>,
        filters: &SearchFilters,
        max_results: u32,
    ) -> Result<Vec<RawTweet>, FetchError> {
        let query = filters
            .to_query()
            .map_err(|e| FetchError::InvalidQuery(e.to_string()))?;
        let to_date = window_end.format("%Y%m%d%H%M").to_string();

        let mut tweets = Vec::new();
        let mut next: Option<String> = None;

        // Follow pagination until max_results are collected
        loop {
            let remaining = max_results.saturating_sub(tweets.len() as u32);
            if remaining == 0 {
                break;
            }

            let page = self.fetch_page(&query, &to_date, remaining, next.as_deref()).await?;
            if page.results.is_empty() {
                // An empty page ends pagination even when a cursor is returned
                break;
            }
            for tweet in page.results {
                tweets.push(RawTweet::try_from(tweet)?);
            }

            match page.next {
                Some(token) => next = Some(token),
                None => break,
            }
        }

        tweets.truncate(max_results as usize);
        debug!(query = %query, to_date = %to_date, count = tweets.len(), "Search page complete");
        Ok(tweets)
    }
}
