use std::collections::HashSet;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use super::lexicon::{DEFAULT_BEARISH, DEFAULT_BULLISH, DEFAULT_NEUTRAL};

/// Terms longer than this many characters carry extra weight.
const LONG_TERM_CHARS: usize = 6;
const LONG_TERM_WEIGHT: f64 = 1.5;
const SHORT_TERM_WEIGHT: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Polarity {
    Bullish,
    Bearish,
    Neutral,
}

/// Immutable anchor-term lists, injected into the scoring engine.
///
/// The three sets are disjoint; terms are stored lower case.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Lexicon {
    bullish: Vec<String>,
    bearish: Vec<String>,
    #[serde(default)]
    neutral: Vec<String>,
}

impl Default for Lexicon {
    fn default() -> Self {
        let owned = |terms: &[&str]| terms.iter().map(|t| t.to_string()).collect();
        Self {
            bullish: owned(DEFAULT_BULLISH),
            bearish: owned(DEFAULT_BEARISH),
            neutral: owned(DEFAULT_NEUTRAL),
        }
    }
}

impl Lexicon {
    pub fn new(bullish: Vec<String>, bearish: Vec<String>, neutral: Vec<String>) -> Result<Self> {
        let lexicon = Self {
            bullish: normalize(bullish),
            bearish: normalize(bearish),
            neutral: normalize(neutral),
        };
        lexicon.validate()?;
        Ok(lexicon)
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read lexicon from {}", path.display()))?;
        let raw: Lexicon = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse lexicon in {}", path.display()))?;
        Self::new(raw.bullish, raw.bearish, raw.neutral)
    }

    fn validate(&self) -> Result<()> {
        if self.bullish.is_empty() || self.bearish.is_empty() {
            bail!("lexicon needs at least one bullish and one bearish term");
        }

        let mut seen: HashSet<&str> = HashSet::new();
        for term in self.all_terms() {
            if !seen.insert(term) {
                bail!("lexicon term {term:?} appears in more than one set");
            }
        }
        Ok(())
    }

    pub fn terms(&self, polarity: Polarity) -> &[String] {
        match polarity {
            Polarity::Bullish => &self.bullish,
            Polarity::Bearish => &self.bearish,
            Polarity::Neutral => &self.neutral,
        }
    }

    pub fn all_terms(&self) -> impl Iterator<Item = &str> {
        self.bullish
            .iter()
            .chain(self.bearish.iter())
            .chain(self.neutral.iter())
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.bullish.len() + self.bearish.len() + self.neutral.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn weight(term: &str) -> f64 {
        if term.chars().count() > LONG_TERM_CHARS {
            LONG_TERM_WEIGHT
        } else {
            SHORT_TERM_WEIGHT
        }
    }
}

fn normalize(terms: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    terms
        .into_iter()
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .filter(|t| seen.insert(t.clone()))
        .collect()
}

/// A family of emoji that amplify a message, optionally hinting direction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EmojiClass {
    pub name: String,
    pub symbols: Vec<String>,
    /// +1 bullish, -1 bearish, 0 pure emphasis.
    pub polarity: f64,
    pub single_multiplier: f64,
    pub burst_threshold: usize,
    pub burst_multiplier: f64,
}

/// Thresholds and multipliers for emphasis detection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct EmphasisConfig {
    pub exclamation_single_multiplier: f64,
    pub exclamation_burst_threshold: usize,
    pub exclamation_burst_multiplier: f64,

    pub caps_single_multiplier: f64,
    pub caps_burst_threshold: usize,
    pub caps_burst_multiplier: f64,

    /// Words shorter than this are ignored for repetition.
    pub repetition_min_word_chars: usize,
    pub repetition_single_multiplier: f64,
    pub repetition_burst_threshold: usize,
    pub repetition_burst_multiplier: f64,

    pub emoji_classes: Vec<EmojiClass>,

    /// Scores used when emphasis is present but no anchor matched.
    pub synthetic_emoji_score: f64,
    pub synthetic_caps_score: f64,
    pub synthetic_exclamation_score: f64,
    pub synthetic_repetition_score: f64,
}

impl Default for EmphasisConfig {
    fn default() -> Self {
        let class = |name: &str, symbols: &[&str], polarity, single, burst| EmojiClass {
            name: name.to_string(),
            symbols: symbols.iter().map(|s| s.to_string()).collect(),
            polarity,
            single_multiplier: single,
            burst_threshold: 3,
            burst_multiplier: burst,
        };

        Self {
            exclamation_single_multiplier: 1.2,
            exclamation_burst_threshold: 3,
            exclamation_burst_multiplier: 1.5,

            caps_single_multiplier: 1.3,
            caps_burst_threshold: 2,
            caps_burst_multiplier: 2.0,

            repetition_min_word_chars: 3,
            repetition_single_multiplier: 1.2,
            repetition_burst_threshold: 3,
            repetition_burst_multiplier: 1.5,

            emoji_classes: vec![
                class("rocket", &["🚀"], 1.0, 1.5, 2.5),
                class("hype", &["🔥", "💎", "🙌", "💰", "📈", "🌙"], 1.0, 1.3, 1.6),
                class("doom", &["📉", "💀", "😭", "🩸", "🔻"], -1.0, 1.3, 1.6),
            ],

            synthetic_emoji_score: 0.3,
            synthetic_caps_score: 0.3,
            synthetic_exclamation_score: 0.2,
            synthetic_repetition_score: 0.1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn terms(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn default_lexicon_is_valid_and_disjoint() {
        let lexicon = Lexicon::default();
        lexicon.validate().unwrap();
        assert!(lexicon.terms(Polarity::Bullish).iter().any(|t| t == "amazing"));
        assert!(lexicon.terms(Polarity::Bearish).iter().any(|t| t == "terrible"));
    }

    #[test]
    fn overlapping_sets_are_rejected() {
        let err = Lexicon::new(terms(&["moon"]), terms(&["Moon "]), vec![]).unwrap_err();
        assert!(err.to_string().contains("more than one set"));
    }

    #[test]
    fn terms_are_normalized_and_deduplicated() {
        let lexicon = Lexicon::new(terms(&["  PUMP", "pump"]), terms(&["dump"]), vec![]).unwrap();
        assert_eq!(lexicon.terms(Polarity::Bullish), &["pump".to_string()]);
    }

    #[test]
    fn long_terms_weigh_more() {
        assert_eq!(Lexicon::weight("pump"), 1.0);
        assert_eq!(Lexicon::weight("bullish"), 1.5);
        assert_eq!(Lexicon::weight("🚀"), 1.0);
    }

    #[test]
    fn lexicon_loads_from_json() {
        let path = std::env::temp_dir().join(format!("chatpulse-lexicon-{}.json", uuid::Uuid::new_v4()));
        std::fs::write(&path, r#"{ "bullish": ["up only"], "bearish": ["down only"] }"#).unwrap();

        let lexicon = Lexicon::from_json_file(&path).unwrap();
        assert_eq!(lexicon.len(), 2);
        assert!(lexicon.terms(Polarity::Neutral).is_empty());
        let _ = std::fs::remove_file(path);
    }
}
