pub mod recency;
pub mod sentiment;

pub use recency::RecencyCache;
pub use sentiment::{hash_message, SentimentCache};
