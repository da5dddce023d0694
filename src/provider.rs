//! External daily stats provider
//!
//! The daily run asks the provider for one application's player count on a
//! given day. [`HttpStatsProvider`] talks to a JSON endpoint:
//!
//! ```text
//! GET {base_url}/{domain}/{domain_id}/daily?date=YYYY-MM-DD
//! → {"player_count": 12345}
//! ```

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveTime, Utc};
use serde::Deserialize;
use tracing::{instrument, trace};

use crate::DailySample;

#[async_trait]
pub trait StatsProvider: Send + Sync {
    /// Player count of one application on `date`.
    async fn fetch_daily(&self, date: DateTime<Utc>, domain: &str, domain_id: u64)
    -> Result<DailySample>;
}

#[derive(Debug, Deserialize)]
struct DailyResponse {
    player_count: u64,
}

/// Provider backed by an HTTP JSON API
pub struct HttpStatsProvider {
    /// HTTP client (reused across requests)
    client: reqwest::Client,
    base_url: String,
}

impl HttpStatsProvider {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl StatsProvider for HttpStatsProvider {
    #[instrument(skip(self))]
    async fn fetch_daily(
        &self,
        date: DateTime<Utc>,
        domain: &str,
        domain_id: u64,
    ) -> Result<DailySample> {
        let url = format!("{}/{domain}/{domain_id}/daily", self.base_url);
        let day = date.date_naive();

        trace!("requesting daily stats from {url}");

        let response = self
            .client
            .get(&url)
            .query(&[("date", day.format("%Y-%m-%d").to_string())])
            .send()
            .await
            .context("failed to send HTTP request")?;

        if !response.status().is_success() {
            anyhow::bail!("HTTP error: {}", response.status());
        }

        let body = response
            .text()
            .await
            .context("failed to read response body")?;

        let parsed: DailyResponse =
            serde_json::from_str(&body).context("failed to parse daily stats JSON")?;

        Ok(DailySample {
            date: day.and_time(NaiveTime::MIN).and_utc(),
            player_count: parsed.player_count,
        })
    }
}
