pub mod data_client;
pub mod gamma_client;
pub mod leaderboard;
pub mod types;

pub use data_client::DataClient;
pub use gamma_client::GammaClient;
pub use leaderboard::LeaderboardClient;
pub use types::{ApiTrade, GammaMarket, LeaderboardEntry, RtdsMessage, RtdsSubscribe};
