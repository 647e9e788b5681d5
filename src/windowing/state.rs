use std::collections::HashMap;

use chrono::{DateTime, TimeZone, Utc};

use crate::models::{MessageEntry, MessageInput, Window, WindowStatus};
use crate::settings::WindowSettings;

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_warn};

const OVERFLOW_SUFFIX: &str = "_overflow";

/// Per-chat message windows keyed by id.
///
/// Not synchronized; the controller wraps it in a `tokio::sync::Mutex`
/// shared between callers and the sweep task.
#[derive(Debug)]
pub struct WindowManager {
    settings: WindowSettings,
    windows: HashMap<String, Window>,
}

impl WindowManager {
    pub fn new(settings: WindowSettings) -> Self {
        Self {
            settings,
            windows: HashMap::new(),
        }
    }

    pub fn settings(&self) -> &WindowSettings {
        &self.settings
    }

    /// `"{chat_id}_{bucket_start_ms}"`, stable for every timestamp in the
    /// same bucket.
    pub fn window_id(&self, chat_id: &str, timestamp_ms: i64) -> String {
        format!("{}_{}", chat_id, self.bucket_start_ms(timestamp_ms))
    }

    fn bucket_start_ms(&self, timestamp_ms: i64) -> i64 {
        let size = self.settings.window_size().num_milliseconds().max(1);
        timestamp_ms - timestamp_ms.rem_euclid(size)
    }

    /// Append `input` to the collecting window for its chat and bucket.
    ///
    /// If the bucket's window has already left `Collecting`, the message goes
    /// to an overflow window started at `now` instead, chaining further
    /// `_overflow` suffixes as needed. Returns a snapshot of the window the
    /// message landed in.
    pub fn add_message(&mut self, input: MessageInput, now: DateTime<Utc>) -> Window {
        let bucket_start = self.bucket_start_ms(now.timestamp_millis());
        let mut id = format!("{}_{}", input.chat_id, bucket_start);
        let mut overflow = false;

        while self
            .windows
            .get(&id)
            .is_some_and(|window| !window.is_collecting())
        {
            id.push_str(OVERFLOW_SUFFIX);
            overflow = true;
        }

        let size = self.settings.window_size();
        let window = self.windows.entry(id.clone()).or_insert_with(|| {
            let start_time = if overflow {
                now
            } else {
                Utc.timestamp_millis_opt(bucket_start).single().unwrap_or(now)
            };
            log_debug!("Opening window {}", id);
            Window {
                id: id.clone(),
                chat_id: input.chat_id.clone(),
                start_time,
                end_time: start_time
                    .checked_add_signed(size)
                    .unwrap_or(DateTime::<Utc>::MAX_UTC),
                messages: Vec::new(),
                status: WindowStatus::Collecting,
            }
        });

        window.messages.push(MessageEntry {
            text: input.text,
            user_id: input.user_id,
            timestamp: now,
            platform_metadata: input.platform_metadata,
        });
        window.clone()
    }

    /// Move every ready `Collecting` window to `Processing` and return them,
    /// oldest first.
    ///
    /// Ready means the window reached `max_messages`, or its end time has
    /// passed and it holds at least `min_messages`.
    pub fn get_ready_windows(&mut self, now: DateTime<Utc>) -> Vec<Window> {
        let min = self.settings.min_messages;
        let max = self.settings.max_messages;

        let mut ready: Vec<Window> = self
            .windows
            .values_mut()
            .filter(|window| window.is_collecting())
            .filter(|window| {
                let count = window.message_count();
                count >= max || (now >= window.end_time && count >= min)
            })
            .map(|window| {
                window.status = WindowStatus::Processing;
                window.clone()
            })
            .collect();

        ready.sort_by(|a, b| a.start_time.cmp(&b.start_time).then_with(|| a.id.cmp(&b.id)));
        ready
    }

    /// `Processing → Completed`. Returns `false` for unknown ids or windows
    /// in any other state.
    pub fn mark_window_complete(&mut self, id: &str) -> bool {
        match self.windows.get_mut(id) {
            Some(window) if window.status == WindowStatus::Processing => {
                window.status = WindowStatus::Completed;
                true
            }
            Some(window) => {
                log_warn!(
                    "Window {} is {}, not processing; completion ignored",
                    id,
                    window.status.as_str()
                );
                false
            }
            None => {
                log_warn!("Window {} not found; completion ignored", id);
                false
            }
        }
    }

    /// Drop completed windows whose end time has passed and collecting
    /// windows older than `stale_factor × window_size`. Returns how many were
    /// removed.
    ///
    /// A completed window stays until its bucket is over so late messages for
    /// that bucket keep landing in its overflow chain instead of reopening
    /// the canonical id.
    pub fn cleanup(&mut self, now: DateTime<Utc>) -> usize {
        let stale_after = self.settings.stale_after();
        let before = self.windows.len();

        self.windows.retain(|_, window| match window.status {
            WindowStatus::Completed => now < window.end_time,
            WindowStatus::Collecting => now - window.start_time <= stale_after,
            WindowStatus::Processing => true,
        });

        let removed = before - self.windows.len();
        if removed > 0 {
            log_debug!("Swept {} window(s), {} remaining", removed, self.windows.len());
        }
        removed
    }

    pub fn get(&self, id: &str) -> Option<&Window> {
        self.windows.get(id)
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }
}
