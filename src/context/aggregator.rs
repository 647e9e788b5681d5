use std::collections::HashMap;

use crate::models::{AnalysisContext, SentimentCategory};
use crate::providers::VectorMatch;

const VOLATILITY_RECENCY_BASE: f64 = 4.0;
const VOLATILITY_SCALE: f64 = 8.0;
const TREND_RECENCY_BASE: f64 = 3.0;
const TREND_SCALE: f64 = 6.0;

/// Turns a message's nearest neighbors into trend, volatility and the
/// dominant category.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContextAggregator;

impl ContextAggregator {
    pub fn new() -> Self {
        Self
    }

    /// `matches` arrive ranked by similarity; they are re-ordered oldest to
    /// newest by their `timestamp` metadata before aggregation. Matches
    /// without a timestamp sort first, in reverse rank order.
    pub fn aggregate(&self, matches: &[VectorMatch], current: SentimentCategory) -> AnalysisContext {
        let mut ordered: Vec<&VectorMatch> = matches.iter().rev().collect();
        ordered.sort_by_key(|m| m.timestamp_ms().unwrap_or(i64::MIN));

        let scores: Vec<f64> = ordered.iter().map(|m| m.score).collect();
        let categories: Vec<SentimentCategory> =
            ordered.iter().filter_map(|m| m.category()).collect();

        AnalysisContext {
            recent_trend: trend(&scores),
            volatility: volatility(&scores),
            dominant_category: dominant_category(&categories, current),
        }
    }
}

/// Weight for the `index`-th of `count` consecutive differences (1-based);
/// the newest difference gets the full `base`.
fn recency_weight(base: f64, index: usize, count: usize) -> f64 {
    base.powf(index as f64 / count as f64)
}

fn weighted_mean<F>(scores: &[f64], base: f64, transform: F) -> Option<f64>
where
    F: Fn(f64) -> f64,
{
    if scores.len() < 2 {
        return None;
    }

    let count = scores.len() - 1;
    let mut weighted_sum = 0.0;
    let mut weight_total = 0.0;
    for (i, pair) in scores.windows(2).enumerate() {
        let weight = recency_weight(base, i + 1, count);
        weighted_sum += weight * transform(pair[1] - pair[0]);
        weight_total += weight;
    }
    Some(weighted_sum / weight_total)
}

/// Cubic, recency-weighted dispersion of consecutive scores in `[0, 1]`.
pub fn volatility(scores: &[f64]) -> f64 {
    weighted_mean(scores, VOLATILITY_RECENCY_BASE, |delta| delta.abs().powi(3))
        .map(|mean| (mean * VOLATILITY_SCALE).clamp(0.0, 1.0))
        .unwrap_or(0.0)
}

/// Signed-square, recency-weighted momentum of consecutive scores in `[-1, 1]`.
pub fn trend(scores: &[f64]) -> f64 {
    weighted_mean(scores, TREND_RECENCY_BASE, |delta| delta.signum() * delta * delta)
        .map(|mean| (mean * TREND_SCALE).clamp(-1.0, 1.0))
        .unwrap_or(0.0)
}

/// Majority vote; ties go to the category seen most recently.
pub fn dominant_category(
    categories: &[SentimentCategory],
    fallback: SentimentCategory,
) -> SentimentCategory {
    let mut counts: HashMap<SentimentCategory, (usize, usize)> = HashMap::new();
    for (position, category) in categories.iter().enumerate() {
        let entry = counts.entry(*category).or_insert((0, position));
        entry.0 += 1;
        entry.1 = position;
    }

    counts
        .into_iter()
        .max_by_key(|(_, (count, last_seen))| (*count, *last_seen))
        .map(|(category, _)| category)
        .unwrap_or(fallback)
}
