pub mod sentiment;
pub mod window;

pub use sentiment::{
    AnalysisContext, RequestContext, SentimentAnalysisResult, SentimentCategory, SentimentScore,
};
pub use window::{MessageEntry, MessageInput, Window, WindowStatus};
