pub mod alert;
pub mod market;
pub mod wallet;

pub use alert::{AlertCategory, AlertEvent, AlertPayload, ChannelId, VolatilitySnapshot};
pub use market::{MarketMeta, PriceSample};
pub use wallet::{HistoryTrade, RankInfo, TrackedWallet, WalletProfile};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Side
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn from_api_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "BUY" | "0" => Some(Side::Buy),
            "SELL" | "1" => Some(Side::Sell),
            _ => None,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "BUY"),
            Side::Sell => write!(f, "SELL"),
        }
    }
}

// ---------------------------------------------------------------------------
// TradeEvent — core pipeline message
// ---------------------------------------------------------------------------

/// One observed trade from the venue. Immutable once parsed; identity is
/// `tx_id` — a composite of transaction hash, timestamp, wallet and asset,
/// since one transaction hash can cover several fills.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeEvent {
    pub tx_id: String,
    pub wallet: String,
    pub market_id: String,
    pub asset_id: String,
    pub side: Side,
    /// Outcome price in [0, 1].
    pub price: Decimal,
    /// Notional value of the fill in USD (size × price).
    pub size_usd: Decimal,
    pub title: String,
    pub slug: String,
    pub event_slug: String,
    pub outcome: String,
    pub timestamp: DateTime<Utc>,
}

impl TradeEvent {
    /// Composite identity for deduplication. The venue redelivers recent
    /// fills after a reconnect, so every field that distinguishes a fill
    /// goes into the key.
    pub fn unique_trade_id(
        tx_hash: &str,
        timestamp: i64,
        wallet: &str,
        asset_id: &str,
    ) -> String {
        let asset_prefix = &asset_id[..asset_id.len().min(20)];
        format!("{tx_hash}_{timestamp}_{wallet}_{asset_prefix}")
    }
}

impl fmt::Display for TradeEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Trade: wallet={} market={} side={} price={} value={}",
            &self.wallet[..8.min(self.wallet.len())],
            &self.market_id[..8.min(self.market_id.len())],
            self.side,
            self.price,
            self.size_usd,
        )
    }
}
