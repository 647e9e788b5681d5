use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use chrono::Utc;
use futures::FutureExt;
use tokio::sync::Mutex;
use tokio::time::{Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::state::WindowManager;
use super::WindowHandler;

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error, log_info};

pub async fn window_loop(
    manager: Arc<Mutex<WindowManager>>,
    handler: Arc<dyn WindowHandler>,
    check_interval: Duration,
    cancel_token: CancellationToken,
) {
    let mut ticker = tokio::time::interval(check_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    log_info!("window sweep started (every {:?})", check_interval);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let handled = sweep(&manager, handler.as_ref()).await;
                if handled > 0 {
                    log_debug!("window sweep handled {} window(s)", handled);
                }
            }
            _ = cancel_token.cancelled() => {
                log_info!("window sweep shutting down");
                break;
            }
        }
    }
}

/// One pass: hand every ready window to `handler` in turn, mark each
/// complete once its handler resolves, then drop finished and stale windows.
///
/// The manager lock is released while a handler runs. Returns the number of
/// windows dispatched.
pub async fn sweep(manager: &Mutex<WindowManager>, handler: &dyn WindowHandler) -> usize {
    let ready = manager.lock().await.get_ready_windows(Utc::now());
    let dispatched = ready.len();

    for window in ready {
        let id = window.id.clone();
        let count = window.message_count();

        match AssertUnwindSafe(handler.handle_window(window))
            .catch_unwind()
            .await
        {
            Ok(Ok(())) => log_debug!("window {} handled ({} messages)", id, count),
            Ok(Err(err)) => log_error!("window handler failed for {}: {err:?}", id),
            Err(_) => log_error!("window handler panicked for {}", id),
        }

        manager.lock().await.mark_window_complete(&id);
    }

    manager.lock().await.cleanup(Utc::now());
    dispatched
}
