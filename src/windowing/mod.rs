//! Per-chat message windows and the background sweep that dispatches them.

pub mod controller;
pub mod loop_worker;
pub mod state;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::Window;

pub use controller::WindowController;
pub use state::WindowManager;

/// Receives each ready window exactly once.
///
/// Errors and panics are logged by the sweep; the window is still marked
/// complete and the sweep moves on.
#[async_trait]
pub trait WindowHandler: Send + Sync {
    async fn handle_window(&self, window: Window) -> Result<()>;
}
