use reqwest::Client;
use thiserror::Error;

use super::types::LeaderboardEntry;

const LEADERBOARD_API_BASE: &str = "https://lb-api.polymarket.com";

#[derive(Debug, Error)]
pub enum LeaderboardClientError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
}

/// Client for the leaderboard API (all-time realized profit ranking).
#[derive(Debug, Clone)]
pub struct LeaderboardClient {
    http: Client,
    base_url: String,
}

impl LeaderboardClient {
    pub fn new(http: Client) -> Self {
        Self {
            http,
            base_url: LEADERBOARD_API_BASE.into(),
        }
    }

    /// Fetch the top `limit` traders by all-time profit.
    pub async fn top(&self, limit: usize) -> Result<Vec<LeaderboardEntry>, LeaderboardClientError> {
        let url = format!("{}/leaderboard", self.base_url);
        let resp = self
            .http
            .get(&url)
            .query(&[("limit", &limit.to_string())])
            .send()
            .await?
            .error_for_status()?;

        let entries: Vec<LeaderboardEntry> = resp.json().await?;
        Ok(entries)
    }
}
