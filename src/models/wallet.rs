use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// What the engine knows about a wallet at classification time.
///
/// `is_fresh` is authoritative only when it came from the external history
/// lookup; `None` means the lookup did not complete, which routing treats
/// as not fresh.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletProfile {
    pub wallet: String,
    pub is_fresh: Option<bool>,
    pub first_seen: DateTime<Utc>,
}

/// Leaderboard membership for a wallet. Present only for the top 25 by
/// all-time realized profit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankInfo {
    pub wallet: String,
    pub rank: u32,
    pub pnl: Decimal,
}

/// A wallet some guild asked to follow. Trades older than `added_at` must
/// not produce tracked alerts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackedWallet {
    pub guild_id: u64,
    pub wallet: String,
    pub label: Option<String>,
    pub added_at: DateTime<Utc>,
}

/// Minimal view of one historical trade returned by the wallet-history
/// lookup, used only for the freshness determination.
#[derive(Debug, Clone)]
pub struct HistoryTrade {
    pub timestamp: DateTime<Utc>,
}
