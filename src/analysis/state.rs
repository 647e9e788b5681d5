use serde::{Deserialize, Serialize};

/// Lifecycle of the analysis service.
///
/// `Uninitialized → Initializing → Ready`; a failed initialization falls
/// back to `Uninitialized`, as does `cleanup`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ServiceState {
    Uninitialized,
    Initializing,
    Ready,
}

impl ServiceState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceState::Uninitialized => "uninitialized",
            ServiceState::Initializing => "initializing",
            ServiceState::Ready => "ready",
        }
    }
}

impl Default for ServiceState {
    fn default() -> Self {
        ServiceState::Uninitialized
    }
}
