use std::sync::{Arc, Mutex as StdMutex, MutexGuard};

use anyhow::{Context, Result};
use chrono::Utc;
use log::{info, warn};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::models::{MessageInput, Window};
use crate::settings::WindowSettings;

use super::loop_worker::window_loop;
use super::state::WindowManager;
use super::WindowHandler;

struct ProcessingTask {
    handle: JoinHandle<()>,
    cancel_token: CancellationToken,
}

/// Owns the window map and the background sweep that drains it.
pub struct WindowController {
    manager: Arc<Mutex<WindowManager>>,
    task: StdMutex<Option<ProcessingTask>>,
}

impl WindowController {
    pub fn new(settings: WindowSettings) -> Self {
        Self {
            manager: Arc::new(Mutex::new(WindowManager::new(settings))),
            task: StdMutex::new(None),
        }
    }

    pub fn manager(&self) -> Arc<Mutex<WindowManager>> {
        Arc::clone(&self.manager)
    }

    pub async fn add_message(&self, input: MessageInput) -> Window {
        self.manager.lock().await.add_message(input, Utc::now())
    }

    pub fn is_processing(&self) -> bool {
        self.task_slot().is_some()
    }

    /// Start sweeping with `handler`. Only one handler may be active; a
    /// second call logs a warning and leaves the running one in place.
    pub async fn start_processing(&self, handler: Arc<dyn WindowHandler>) {
        let check_interval = self.manager.lock().await.settings().check_interval();

        let mut slot = self.task_slot();
        if slot.is_some() {
            warn!("Window processing already active; ignoring new handler");
            return;
        }

        let cancel_token = CancellationToken::new();
        let handle = tokio::spawn(window_loop(
            Arc::clone(&self.manager),
            handler,
            check_interval,
            cancel_token.clone(),
        ));

        *slot = Some(ProcessingTask {
            handle,
            cancel_token,
        });
        info!("Window processing started");
    }

    /// Cancel the sweep and wait for it to finish. A sweep already in
    /// progress runs to completion first.
    pub async fn stop_processing(&self) -> Result<()> {
        let task = self.task_slot().take();
        let Some(task) = task else {
            return Ok(());
        };

        task.cancel_token.cancel();
        task.handle
            .await
            .context("window sweep task failed to join")?;
        info!("Window processing stopped");
        Ok(())
    }

    fn task_slot(&self) -> MutexGuard<'_, Option<ProcessingTask>> {
        match self.task.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
