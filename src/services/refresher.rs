use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::interval;

use crate::enrichment::sources::{GammaMarketSource, LeaderboardSource};

const SPORTS_TAGS_INTERVAL: Duration = Duration::from_secs(3_600);
const LEADERBOARD_INTERVAL: Duration = Duration::from_secs(600);

/// Keep the sports tag registry and the top-25 leaderboard snapshot warm on
/// their own cadences, independent of trade volume. The first tick of each
/// interval fires immediately, which doubles as the startup fetch.
pub async fn run_refresher(
    markets: Arc<GammaMarketSource>,
    leaderboard: Arc<LeaderboardSource>,
    mut stop: watch::Receiver<bool>,
) {
    let mut tags_timer = interval(SPORTS_TAGS_INTERVAL);
    let mut leaderboard_timer = interval(LEADERBOARD_INTERVAL);

    loop {
        tokio::select! {
            _ = tags_timer.tick() => {
                if let Err(e) = markets.refresh_sports_tags().await {
                    tracing::warn!(error = %e, "Sports tag refresh failed");
                }
            }
            _ = leaderboard_timer.tick() => {
                if let Err(e) = leaderboard.refresh().await {
                    tracing::warn!(error = %e, "Leaderboard refresh failed");
                }
            }
            _ = stop.changed() => break,
        }
    }
    tracing::info!("Refresher stopped");
}
