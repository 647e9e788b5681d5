use std::collections::HashMap;

use super::config::EmphasisConfig;

/// Raw emphasis counts observed in one message.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EmphasisSignals {
    pub exclamations: usize,
    pub caps_words: usize,
    /// Occurrences per configured emoji class, in config order.
    pub emoji_counts: Vec<usize>,
    /// Highest occurrence count of any single word.
    pub max_repetition: usize,
}

impl EmphasisSignals {
    pub fn detect(text: &str, config: &EmphasisConfig) -> Self {
        let exclamations = text.chars().filter(|c| *c == '!').count();

        let mut caps_words = 0;
        let mut word_counts: HashMap<String, usize> = HashMap::new();
        for raw in text.split_whitespace() {
            let word = raw.trim_matches(|c: char| !c.is_alphanumeric());
            if is_shouted(word) {
                caps_words += 1;
            }
            if word.chars().count() >= config.repetition_min_word_chars {
                *word_counts.entry(word.to_lowercase()).or_insert(0) += 1;
            }
        }

        let emoji_counts = config
            .emoji_classes
            .iter()
            .map(|class| {
                class
                    .symbols
                    .iter()
                    .map(|symbol| text.matches(symbol.as_str()).count())
                    .sum()
            })
            .collect();

        Self {
            exclamations,
            caps_words,
            emoji_counts,
            max_repetition: word_counts.values().copied().max().unwrap_or(0),
        }
    }

    pub fn has_any(&self) -> bool {
        self.exclamations > 0
            || self.caps_words > 0
            || self.max_repetition >= 2
            || self.emoji_counts.iter().any(|count| *count > 0)
    }

    /// Product of every active signal's multiplier; 1.0 when calm.
    pub fn multiplier(&self, config: &EmphasisConfig) -> f64 {
        let mut multiplier = 1.0;

        multiplier *= tiered(
            self.exclamations,
            1,
            config.exclamation_single_multiplier,
            config.exclamation_burst_threshold,
            config.exclamation_burst_multiplier,
        );
        multiplier *= tiered(
            self.caps_words,
            1,
            config.caps_single_multiplier,
            config.caps_burst_threshold,
            config.caps_burst_multiplier,
        );
        multiplier *= tiered(
            self.max_repetition,
            2,
            config.repetition_single_multiplier,
            config.repetition_burst_threshold,
            config.repetition_burst_multiplier,
        );

        for (class, count) in config.emoji_classes.iter().zip(&self.emoji_counts) {
            multiplier *= tiered(
                *count,
                1,
                class.single_multiplier,
                class.burst_threshold,
                class.burst_multiplier,
            );
        }

        multiplier
    }

    /// Score to use when no anchor term matched.
    ///
    /// Directional emoji win; otherwise the strongest non-directional signal
    /// nudges the message slightly bullish.
    pub fn synthesized_score(&self, config: &EmphasisConfig) -> f64 {
        let emoji_direction: f64 = config
            .emoji_classes
            .iter()
            .zip(&self.emoji_counts)
            .map(|(class, count)| class.polarity * *count as f64)
            .sum();

        if emoji_direction != 0.0 {
            emoji_direction.signum() * config.synthetic_emoji_score
        } else if self.caps_words > 0 {
            config.synthetic_caps_score
        } else if self.exclamations > 0 {
            config.synthetic_exclamation_score
        } else if self.max_repetition >= 2 {
            config.synthetic_repetition_score
        } else {
            0.0
        }
    }
}

fn tiered(count: usize, single_at: usize, single: f64, burst_at: usize, burst: f64) -> f64 {
    if count >= burst_at.max(single_at) {
        burst
    } else if count >= single_at {
        single
    } else {
        1.0
    }
}

/// At least two letters, every letter upper case.
fn is_shouted(word: &str) -> bool {
    let mut letters = 0;
    for c in word.chars().filter(|c| c.is_alphabetic()) {
        if !c.is_uppercase() {
            return false;
        }
        letters += 1;
    }
    letters >= 2
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_each_signal() {
        let config = EmphasisConfig::default();
        let signals = EmphasisSignals::detect("WOW THIS is it!!! 🚀🚀 moon moon moon", &config);

        assert_eq!(signals.exclamations, 3);
        assert_eq!(signals.caps_words, 2);
        assert_eq!(signals.emoji_counts[0], 2);
        assert_eq!(signals.max_repetition, 3);
    }

    #[test]
    fn multipliers_compound() {
        let config = EmphasisConfig::default();
        let signals = EmphasisSignals {
            exclamations: 0,
            caps_words: 2,
            emoji_counts: vec![3, 0, 0],
            max_repetition: 0,
        };
        let expected = 2.0 * 2.5;
        assert!((signals.multiplier(&config) - expected).abs() < 1e-9);
    }

    #[test]
    fn calm_text_has_unit_multiplier() {
        let config = EmphasisConfig::default();
        let signals = EmphasisSignals::detect("just checking the chart", &config);
        assert!(!signals.has_any());
        assert_eq!(signals.multiplier(&config), 1.0);
        assert_eq!(signals.synthesized_score(&config), 0.0);
    }

    #[test]
    fn single_letter_capitals_are_not_shouting() {
        assert!(!is_shouted("I"));
        assert!(!is_shouted("A1"));
        assert!(is_shouted("NFT"));
        assert!(!is_shouted("Moon"));
    }

    #[test]
    fn synthesized_score_prefers_emoji_direction() {
        let config = EmphasisConfig::default();
        let doom = EmphasisSignals::detect("HELP 💀💀", &config);
        assert_eq!(doom.synthesized_score(&config), -0.3);

        let shouting = EmphasisSignals::detect("HELLO THERE", &config);
        assert_eq!(shouting.synthesized_score(&config), 0.3);
    }
}
