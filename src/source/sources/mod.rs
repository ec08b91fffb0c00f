/// Hugging Face Hub model and dataset listings.
pub mod hub;
/// Open LLM Leaderboard contents.
pub mod leaderboard;
/// Keyword news article search.
pub mod news;

pub use hub::{HubListingSource, HubNormalizer};
pub use leaderboard::{LeaderboardNormalizer, LeaderboardSource};
pub use news::{NewsNormalizer, NewsSource, location_country};
