use reqwest::Client;
use std::collections::BTreeSet;
use thiserror::Error;

use super::types::{GammaMarket, GammaSport};

const GAMMA_API_BASE: &str = "https://gamma-api.polymarket.com";

#[derive(Debug, Error)]
pub enum GammaClientError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
}

/// Client for the Gamma API: market metadata and the sports tag registry.
#[derive(Debug, Clone)]
pub struct GammaClient {
    http: Client,
    base_url: String,
}

impl GammaClient {
    pub fn new(http: Client) -> Self {
        Self {
            http,
            base_url: GAMMA_API_BASE.into(),
        }
    }

    /// Fetch active markets with pagination.
    pub async fn get_active_markets(
        &self,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<GammaMarket>, GammaClientError> {
        let url = format!("{}/markets", self.base_url);
        let resp = self
            .http
            .get(&url)
            .query(&[
                ("active", "true"),
                ("closed", "false"),
                ("limit", &limit.to_string()),
                ("offset", &offset.to_string()),
            ])
            .send()
            .await?
            .error_for_status()?;

        let markets: Vec<GammaMarket> = resp.json().await?;
        Ok(markets)
    }

    /// Fetch the set of tag IDs the venue classifies as sports.
    pub async fn get_sports_tag_ids(&self) -> Result<BTreeSet<String>, GammaClientError> {
        let url = format!("{}/sports", self.base_url);
        let resp = self
            .http
            .get(&url)
            .send()
            .await?
            .error_for_status()?;

        let sports: Vec<GammaSport> = resp.json().await?;
        let mut tag_ids = BTreeSet::new();
        for sport in &sports {
            if let Some(tags) = sport.tags.as_deref() {
                for tag_id in tags.split(',') {
                    let tag_id = tag_id.trim();
                    if !tag_id.is_empty() {
                        tag_ids.insert(tag_id.to_string());
                    }
                }
            }
        }
        Ok(tag_ids)
    }
}
