use crate::models::{SentimentCategory, SentimentScore};

use super::config::{EmphasisConfig, Lexicon, Polarity};
use super::emphasis::EmphasisSignals;
use super::SentimentStrategy;

const DAMPENING_EXPONENT: f64 = 0.7;

/// Default strategy: weighted anchor matching amplified by emphasis.
#[derive(Debug, Clone)]
pub struct LexicalScoringEngine {
    lexicon: Lexicon,
    emphasis: EmphasisConfig,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct AnchorTally {
    bullish: f64,
    bearish: f64,
    matched: usize,
}

impl LexicalScoringEngine {
    pub fn new(lexicon: Lexicon) -> Self {
        Self::with_emphasis(lexicon, EmphasisConfig::default())
    }

    pub fn with_emphasis(lexicon: Lexicon, emphasis: EmphasisConfig) -> Self {
        Self { lexicon, emphasis }
    }

    pub fn lexicon(&self) -> &Lexicon {
        &self.lexicon
    }

    /// Each term counts once however often it appears. Neutral anchors are
    /// reference points for embeddings only and never score.
    fn tally(&self, folded: &str) -> AnchorTally {
        let mut tally = AnchorTally::default();
        for polarity in [Polarity::Bullish, Polarity::Bearish] {
            for term in self.lexicon.terms(polarity) {
                if !folded.contains(term.as_str()) {
                    continue;
                }
                tally.matched += 1;
                match polarity {
                    Polarity::Bullish => tally.bullish += Lexicon::weight(term),
                    _ => tally.bearish += Lexicon::weight(term),
                }
            }
        }
        tally
    }

    pub fn score_text(&self, text: &str) -> SentimentScore {
        let folded = text.to_lowercase();
        let tally = self.tally(&folded);
        let signals = EmphasisSignals::detect(text, &self.emphasis);
        let multiplier = signals.multiplier(&self.emphasis);

        let base = if tally.matched > 0 {
            let raw = (tally.bullish - tally.bearish) / (tally.bullish + tally.bearish).max(1.0);
            raw.signum() * raw.abs().sqrt()
        } else if signals.has_any() {
            signals.synthesized_score(&self.emphasis)
        } else {
            0.0
        };

        let score = if base == 0.0 {
            0.0
        } else {
            (base.signum() * (base * multiplier).abs().powf(DAMPENING_EXPONENT)).clamp(-1.0, 1.0)
        };

        SentimentScore {
            score,
            category: SentimentCategory::from_score(score),
            confidence: (multiplier * score.abs().min(1.0)).clamp(0.0, 1.0),
        }
    }
}

impl Default for LexicalScoringEngine {
    fn default() -> Self {
        Self::new(Lexicon::default())
    }
}

impl SentimentStrategy for LexicalScoringEngine {
    fn analyze(&self, text: &str, _embedding: &[f32]) -> SentimentScore {
        self.score_text(text)
    }

    fn name(&self) -> &str {
        "lexical"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> LexicalScoringEngine {
        LexicalScoringEngine::default()
    }

    #[test]
    fn shouted_rockets_are_strongly_bullish() {
        let result = engine().analyze("AMAZING!!! 🚀🚀🚀", &[]);
        assert_eq!(result.category, SentimentCategory::StronglyBullish);
        assert!(result.score > 0.3);
    }

    #[test]
    fn repeated_bearish_term_is_strongly_bearish() {
        let result = engine().analyze("terrible terrible terrible", &[]);
        assert_eq!(result.category, SentimentCategory::StronglyBearish);
        assert!(result.score < -0.3);
    }

    #[test]
    fn plain_text_is_neutral_with_zero_confidence() {
        let result = engine().analyze("what time is the meeting", &[]);
        assert_eq!(result.score, 0.0);
        assert_eq!(result.category, SentimentCategory::Neutral);
        assert_eq!(result.confidence, 0.0);
    }

    #[test]
    fn mixed_anchors_partially_cancel() {
        let mixed = engine().analyze("pump then dump", &[]);
        assert_eq!(mixed.score, 0.0);

        let leaning = engine().analyze("pump pumping then dump", &[]);
        assert!(leaning.score > 0.0);
        assert!(leaning.score < 1.0);
    }

    #[test]
    fn emphasis_alone_moves_off_neutral() {
        let result = engine().analyze("WHAT IS HAPPENING", &[]);
        assert!(result.score > 0.15);
    }

    #[test]
    fn neutral_anchor_does_not_block_emphasis() {
        // "flat" is a neutral anchor hiding inside "inflation".
        let result = engine().analyze("INFLATION IS CRAZY!!!", &[]);
        assert!(result.score > 0.15);
        assert_ne!(result.category, SentimentCategory::Neutral);

        let plain = engine().analyze("markets are flat today", &[]);
        assert_eq!(plain.score, 0.0);
    }

    #[test]
    fn scores_and_confidence_stay_in_range() {
        let engine = engine();
        for text in [
            "MOON MOON MOON!!!!! 🚀🚀🚀🚀 💎💎💎",
            "rekt rekt rekt 💀💀💀 CRASH!!!",
            "sell",
            "",
        ] {
            let result = engine.analyze(text, &[]);
            assert!((-1.0..=1.0).contains(&result.score), "{text}");
            assert!((0.0..=1.0).contains(&result.confidence), "{text}");
        }
    }

    #[test]
    fn deterministic_for_same_input() {
        let engine = engine();
        let a = engine.analyze("bullish breakout incoming", &[0.1, 0.2]);
        let b = engine.analyze("bullish breakout incoming", &[0.9, -0.3]);
        assert_eq!(a, b);
    }

    #[test]
    fn custom_lexicon_replaces_defaults() {
        let lexicon = Lexicon::new(
            vec!["ship it".to_string()],
            vec!["rollback".to_string()],
            vec![],
        )
        .unwrap();
        let engine = LexicalScoringEngine::new(lexicon);

        assert!(engine.analyze("ship it", &[]).score > 0.0);
        assert!(engine.analyze("rollback now", &[]).score < 0.0);
        assert_eq!(engine.analyze("moon", &[]).score, 0.0);
    }
}
