//! Message window data models.
//!
//! A window is a bounded-duration batch of messages from one chat, processed
//! as a unit once it is ready.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum WindowStatus {
    Collecting,
    Processing,
    Completed,
}

impl WindowStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WindowStatus::Collecting => "collecting",
            WindowStatus::Processing => "processing",
            WindowStatus::Completed => "completed",
        }
    }
}

impl Default for WindowStatus {
    fn default() -> Self {
        WindowStatus::Collecting
    }
}

/// A single message appended to a window. Never mutated after insertion.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MessageEntry {
    pub text: String,
    pub user_id: String,
    pub timestamp: DateTime<Utc>,
    pub platform_metadata: Option<serde_json::Value>,
}

/// Inbound message as handed to the window manager by the transport layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageInput {
    pub chat_id: String,
    pub user_id: String,
    pub text: String,
    #[serde(default)]
    pub platform_metadata: Option<serde_json::Value>,
}

impl MessageInput {
    pub fn new(
        chat_id: impl Into<String>,
        user_id: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            chat_id: chat_id.into(),
            user_id: user_id.into(),
            text: text.into(),
            platform_metadata: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Window {
    pub id: String,
    pub chat_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub messages: Vec<MessageEntry>,
    pub status: WindowStatus,
}

impl Window {
    pub fn message_count(&self) -> usize {
        self.messages.len()
    }

    pub fn is_collecting(&self) -> bool {
        self.status == WindowStatus::Collecting
    }
}
