pub mod observer;
pub mod orchestrator;
pub mod state;
pub mod window;

pub use observer::{ObserverId, SentimentObserver};
pub use orchestrator::SentimentAnalyzer;
pub use state::ServiceState;
pub use window::WindowAnalysis;
