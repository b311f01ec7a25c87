use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::{RankInfo, TradeEvent};
use crate::volatility::Timeframe;

/// Opaque reference to a downstream destination channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChannelId(pub u64);

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Alert categories. A trade yields at most one of the first five, plus
/// optionally `Tracked`; `Volatility` comes from the market-keyed pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertCategory {
    Whale,
    FreshWallet,
    Sports,
    Bond,
    TopTrader,
    Volatility,
    Tracked,
}

impl AlertCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertCategory::Whale => "whale",
            AlertCategory::FreshWallet => "fresh_wallet",
            AlertCategory::Sports => "sports",
            AlertCategory::Bond => "bond",
            AlertCategory::TopTrader => "top_trader",
            AlertCategory::Volatility => "volatility",
            AlertCategory::Tracked => "tracked",
        }
    }
}

impl fmt::Display for AlertCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot handed to the dispatcher for a volatility alert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VolatilitySnapshot {
    pub market_id: String,
    pub title: String,
    pub timeframe: Timeframe,
    /// VWAP baseline the move was measured against, in [0, 1].
    pub baseline: Decimal,
    pub current_price: Decimal,
    /// Signed move in points on the 0–100 scale.
    pub change_points: Decimal,
    pub window_volume: Decimal,
    pub triggered_at: DateTime<Utc>,
}

/// Payload variants for a resolved alert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AlertPayload {
    Trade {
        trade: TradeEvent,
        rank: Option<RankInfo>,
        /// Tracked-wallet label, when the guild assigned one.
        wallet_label: Option<String>,
    },
    Volatility(VolatilitySnapshot),
}

/// A fully resolved `(category, destination, payload)` tuple, ready for the
/// downstream dispatcher. The dispatcher owns formatting and delivery
/// retries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertEvent {
    pub id: Uuid,
    pub guild_id: u64,
    pub category: AlertCategory,
    pub channel: ChannelId,
    pub payload: AlertPayload,
}

impl AlertEvent {
    pub fn new(
        guild_id: u64,
        category: AlertCategory,
        channel: ChannelId,
        payload: AlertPayload,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            guild_id,
            category,
            channel,
            payload,
        }
    }
}
