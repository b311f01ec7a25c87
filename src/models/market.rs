use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Cached market metadata used for sports/bond classification.
///
/// Absence of metadata is treated as "unknown, assume non-sports" so a
/// lookup failure can never suppress a legitimate whale alert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketMeta {
    pub market_id: String,
    pub is_sports: bool,
    pub category_tags: BTreeSet<String>,
    pub group_slug: Option<String>,
}

impl MarketMeta {
    /// Conservative default for unknown markets.
    pub fn unknown(market_id: &str) -> Self {
        Self {
            market_id: market_id.to_string(),
            is_sports: false,
            category_tags: BTreeSet::new(),
            group_slug: None,
        }
    }
}

/// One price/volume observation for the volatility pipeline, derived from a
/// trade. Tags are carried along so the blacklist check does not need a
/// second metadata lookup.
#[derive(Debug, Clone)]
pub struct PriceSample {
    pub market_id: String,
    pub title: String,
    pub price: Decimal,
    pub volume: Decimal,
    pub timestamp: DateTime<Utc>,
    pub tags: BTreeSet<String>,
}
