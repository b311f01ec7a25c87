use rust_decimal::Decimal;

use crate::models::{MarketMeta, RankInfo, TradeEvent, WalletProfile};

/// Price at or above which a market is treated as a near-certain outcome.
pub fn bond_price_floor() -> Decimal {
    Decimal::new(95, 2)
}

/// Signals extracted from an enriched trade. Pure data; the router turns
/// these into a category decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TradeSignals {
    pub is_sports: bool,
    pub is_bond: bool,
    pub is_fresh: bool,
    pub rank: Option<u32>,
    pub value: Decimal,
}

impl TradeSignals {
    pub fn is_top25(&self) -> bool {
        self.rank.is_some()
    }
}

/// Map an enriched trade to its classification signals. No I/O and no side
/// effects; every input was resolved by the enrichment caches beforehand,
/// which keeps the decision logic testable in isolation.
pub fn classify(
    trade: &TradeEvent,
    meta: &MarketMeta,
    profile: &WalletProfile,
    rank: Option<&RankInfo>,
) -> TradeSignals {
    TradeSignals {
        is_sports: meta.is_sports,
        is_bond: trade.price >= bond_price_floor(),
        is_fresh: profile.is_fresh == Some(true),
        rank: rank.map(|r| r.rank),
        value: trade.size_usd,
    }
}
