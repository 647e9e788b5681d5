//! Built-in anchor lists for trading-chat sentiment.
//!
//! Matching is a case-folded substring test, so every entry here is lower
//! case and short terms were picked to avoid common false positives.

pub(crate) const DEFAULT_BULLISH: &[&str] = &[
    "moon",
    "mooning",
    "pump",
    "pumping",
    "bullish",
    "buy the dip",
    "buying",
    "lambo",
    "hodl",
    "amazing",
    "awesome",
    "great",
    "breakout",
    "rally",
    "gains",
    "profit",
    "all time high",
    "wagmi",
    "lfg",
    "send it",
    "undervalued",
    "accumulate",
    "🚀",
    "📈",
    "💎",
    "🌙",
    "💰",
    "🙌",
];

pub(crate) const DEFAULT_BEARISH: &[&str] = &[
    "dump",
    "dumping",
    "bearish",
    "sell",
    "crash",
    "rekt",
    "scam",
    "rugged",
    "rug pull",
    "terrible",
    "awful",
    "bleeding",
    "liquidated",
    "ngmi",
    "fud",
    "dead coin",
    "down bad",
    "capitulation",
    "overvalued",
    "bagholder",
    "📉",
    "💀",
    "😭",
    "🩸",
    "🔻",
];

pub(crate) const DEFAULT_NEUTRAL: &[&str] = &[
    "sideways",
    "crab",
    "consolidation",
    "holding",
    "waiting",
    "no change",
    "flat",
    "🤔",
    "😐",
    "🦀",
];
