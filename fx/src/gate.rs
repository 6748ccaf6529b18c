//! One-shot gate guarding a provider's first load.

use std::time::Duration;

use tokio::sync::watch;

/// Gate position. Once out of `Pending` it never returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    /// No load has completed yet.
    Pending,
    /// Opened by the first successful load.
    Open,
    /// Opened after a caller gave up waiting.
    ForcedOpen,
}

/// Blocks callers until a provider's first successful load.
///
/// The gate opens once, either through [`LoadGate::open`] or through
/// [`LoadGate::force_open`] after a timed-out wait, and is never re-armed.
#[derive(Debug)]
pub struct LoadGate {
    state: watch::Sender<GateState>,
}

impl LoadGate {
    pub fn new() -> Self {
        let (state, _) = watch::channel(GateState::Pending);
        Self { state }
    }

    pub fn state(&self) -> GateState {
        *self.state.borrow()
    }

    pub fn is_open(&self) -> bool {
        self.state() != GateState::Pending
    }

    /// Open the gate. Returns `true` only for the call that released it.
    pub fn open(&self) -> bool {
        self.transition(GateState::Open)
    }

    /// Open the gate without a successful load.
    pub fn force_open(&self) -> bool {
        self.transition(GateState::ForcedOpen)
    }

    fn transition(&self, to: GateState) -> bool {
        self.state.send_if_modified(|state| {
            if *state == GateState::Pending {
                *state = to;
                true
            } else {
                false
            }
        })
    }

    /// Wait up to `timeout` for the gate to open. Returns whether it is open.
    pub async fn wait(&self, timeout: Duration) -> bool {
        let mut rx = self.state.subscribe();
        let opened = tokio::time::timeout(timeout, rx.wait_for(|s| *s != GateState::Pending)).await;
        matches!(opened, Ok(Ok(_)))
    }
}

impl Default for LoadGate {
    fn default() -> Self {
        Self::new()
    }
}
