pub mod aggregator;

pub use aggregator::{dominant_category, trend, volatility, ContextAggregator};
