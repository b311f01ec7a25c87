use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

// ---------------------------------------------------------------------------
// RTDS WebSocket feed
// ---------------------------------------------------------------------------

/// Envelope for messages on the real-time data socket. Non-trade messages
/// (subscription acks, comments) carry no payload.
#[derive(Debug, Clone, Deserialize)]
pub struct RtdsMessage {
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(rename = "type", default)]
    pub msg_type: Option<String>,
    #[serde(default)]
    pub payload: Option<RtdsTrade>,
}

/// Trade payload from the `activity/trades` subscription. Numeric fields
/// arrive as either numbers or strings depending on the feed version, so
/// they are kept as raw JSON until normalization.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RtdsTrade {
    #[serde(default)]
    pub proxy_wallet: Option<String>,
    #[serde(default)]
    pub side: Option<String>,
    #[serde(default)]
    pub asset: Option<String>,
    #[serde(default)]
    pub condition_id: Option<String>,
    #[serde(default)]
    pub size: Option<serde_json::Value>,
    #[serde(default)]
    pub price: Option<serde_json::Value>,
    #[serde(default)]
    pub timestamp: Option<serde_json::Value>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub event_slug: Option<String>,
    #[serde(default)]
    pub outcome: Option<String>,
    #[serde(default)]
    pub transaction_hash: Option<String>,
}

/// Subscribe message for the RTDS socket:
/// `{"action":"subscribe","subscriptions":[{"topic":"activity","type":"trades"}]}`
#[derive(Debug, Clone, Serialize)]
pub struct RtdsSubscribe {
    pub action: String,
    pub subscriptions: Vec<RtdsSubscription>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RtdsSubscription {
    pub topic: String,
    #[serde(rename = "type")]
    pub sub_type: String,
}

impl RtdsSubscribe {
    pub fn activity_trades() -> Self {
        Self {
            action: "subscribe".into(),
            subscriptions: vec![RtdsSubscription {
                topic: "activity".into(),
                sub_type: "trades".into(),
            }],
        }
    }
}

/// Parse a JSON value that may be a number or a numeric string into a
/// `Decimal`.
pub fn decimal_field(value: Option<&serde_json::Value>) -> Option<Decimal> {
    match value? {
        serde_json::Value::Number(n) => Decimal::from_str(&n.to_string()).ok(),
        serde_json::Value::String(s) => Decimal::from_str(s).ok(),
        _ => None,
    }
}

/// Parse a timestamp field that may be epoch seconds, epoch milliseconds,
/// a numeric string of either, or an RFC 3339 string.
pub fn parse_trade_timestamp(value: Option<&serde_json::Value>) -> Option<DateTime<Utc>> {
    match value? {
        serde_json::Value::Number(n) => {
            let raw = n.as_i64()?;
            from_epoch(raw)
        }
        serde_json::Value::String(s) => {
            if let Ok(raw) = s.parse::<i64>() {
                return from_epoch(raw);
            }
            chrono::DateTime::parse_from_rfc3339(s)
                .ok()
                .map(|dt| dt.with_timezone(&Utc))
        }
        _ => None,
    }
}

fn from_epoch(raw: i64) -> Option<DateTime<Utc>> {
    // >1e12 means milliseconds
    if raw > 1_000_000_000_000 {
        chrono::DateTime::from_timestamp(raw / 1000, ((raw % 1000) * 1_000_000) as u32)
    } else {
        chrono::DateTime::from_timestamp(raw, 0)
    }
}

// ---------------------------------------------------------------------------
// Trade history (Data API — REST)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiTrade {
    #[serde(default)]
    pub proxy_wallet: Option<String>,
    #[serde(default)]
    pub side: Option<String>,
    #[serde(default)]
    pub asset: Option<String>,
    #[serde(default)]
    pub condition_id: Option<String>,
    #[serde(default)]
    pub size: Option<serde_json::Value>,
    #[serde(default)]
    pub price: Option<serde_json::Value>,
    #[serde(default)]
    pub timestamp: Option<serde_json::Value>,
    #[serde(default)]
    pub transaction_hash: Option<String>,
}

// ---------------------------------------------------------------------------
// Market metadata (Gamma API)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GammaTag {
    #[serde(default)]
    pub id: Option<serde_json::Value>,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
}

impl GammaTag {
    pub fn id_str(&self) -> Option<String> {
        match self.id.as_ref()? {
            serde_json::Value::Number(n) => Some(n.to_string()),
            serde_json::Value::String(s) => Some(s.clone()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GammaEvent {
    #[serde(default)]
    pub slug: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GammaMarket {
    #[serde(alias = "conditionId")]
    pub condition_id: String,
    pub question: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default, alias = "groupSlug")]
    pub group_slug: Option<String>,
    #[serde(default)]
    pub tags: Vec<GammaTag>,
    #[serde(default)]
    pub events: Vec<GammaEvent>,
    /// Stringified JSON array of token IDs, e.g. "[\"token1\", \"token2\"]"
    #[serde(default, alias = "clobTokenIds")]
    pub clob_token_ids: Option<String>,
}

impl GammaMarket {
    /// Parse the stringified clobTokenIds into a Vec of token ID strings.
    pub fn parse_token_ids(&self) -> Vec<String> {
        self.clob_token_ids
            .as_deref()
            .and_then(|s| serde_json::from_str::<Vec<String>>(s).ok())
            .unwrap_or_default()
    }
}

/// Entry from the `/sports` endpoint; `tags` is a comma-separated list of
/// tag IDs belonging to that sport.
#[derive(Debug, Clone, Deserialize)]
pub struct GammaSport {
    #[serde(default)]
    pub tags: Option<String>,
}

// ---------------------------------------------------------------------------
// Leaderboard (lb-api)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub rank: Option<u32>,
    #[serde(default)]
    pub profit: Option<serde_json::Value>,
    #[serde(default)]
    pub volume_traded: Option<serde_json::Value>,
}

impl LeaderboardEntry {
    pub fn profit_decimal(&self) -> Decimal {
        decimal_field(self.profit.as_ref()).unwrap_or(Decimal::ZERO)
    }
}
