use serde::{Deserialize, Serialize};

/// Lifecycle state of one worker version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum WorkerState {
    /// Constructed, no lifecycle event seen yet.
    #[default]
    Parsed,
    /// Install event running.
    Installing,
    /// Installed, waiting for activation.
    Installed,
    /// Activate event running.
    Activating,
    /// Active and intercepting fetches.
    Activated,
    /// Install failed; this version will never activate.
    Redundant,
}

#[derive(Debug, Clone)]
pub struct Lifecycle {
    state: WorkerState,
    skip_waiting: bool,
    clients_claimed: bool,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl Lifecycle {
    pub fn new() -> Self {
        Self {
            state: WorkerState::Parsed,
            skip_waiting: false,
            clients_claimed: false,
        }
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }

    pub fn set_state(&mut self, state: WorkerState) {
        self.state = state;
    }

    /// Do not wait for pages controlled by the previous version to close.
    pub fn skip_waiting(&mut self) {
        self.skip_waiting = true;
    }

    pub fn skips_waiting(&self) -> bool {
        self.skip_waiting
    }

    /// Take control of already-open pages without a reload.
    pub fn claim_clients(&mut self) {
        self.clients_claimed = true;
    }

    pub fn controls_clients(&self) -> bool {
        self.clients_claimed
    }

    pub fn is_active(&self) -> bool {
        self.state == WorkerState::Activated
    }

    /// Installed and allowed to activate without waiting.
    pub fn can_activate_now(&self) -> bool {
        self.state == WorkerState::Installed && self.skip_waiting
    }
}
