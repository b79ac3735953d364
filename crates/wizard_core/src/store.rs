//! Process-wide modal state for the project creation wizard.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Step {
    #[default]
    Source,
    Details,
}

impl Step {
    pub fn as_str(&self) -> &'static str {
        match self {
            Step::Source => "source",
            Step::Details => "details",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WizardState {
    pub open: bool,
    pub step: Step,
    /// Bumped on every open and close; work started in an older session must not touch the modal.
    pub session: u64,
}

/// Cloneable handle to the wizard's modal state. Clones observe and mutate the same state.
#[derive(Debug, Clone)]
pub struct ModalStore {
    tx: Arc<watch::Sender<WizardState>>,
}

impl Default for ModalStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ModalStore {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(WizardState::default());
        Self { tx: Arc::new(tx) }
    }

    pub fn open(&self, step: Option<Step>) {
        let step = step.unwrap_or_default();
        self.tx.send_modify(|state| {
            state.open = true;
            state.step = step;
            state.session += 1;
        });
        debug!(action = "ui/openProjectCreation", step = step.as_str(), "modal store updated");
    }

    pub fn close(&self) {
        self.tx.send_modify(|state| {
            state.open = false;
            state.step = Step::default();
            state.session += 1;
        });
        debug!(action = "ui/closeProjectCreation", "modal store updated");
    }

    /// Closes only if the modal is still in `session`. Returns whether it closed.
    pub fn close_session(&self, session: u64) -> bool {
        let closed = self.tx.send_if_modified(|state| {
            if state.session != session || !state.open {
                return false;
            }
            state.open = false;
            state.step = Step::default();
            state.session += 1;
            true
        });
        if closed {
            debug!(action = "ui/closeProjectCreation", session, "modal store updated");
        }
        closed
    }

    pub fn set_step(&self, step: Step) {
        self.tx.send_modify(|state| state.step = step);
        debug!(
            action = "ui/setProjectCreationStep",
            step = step.as_str(),
            "modal store updated"
        );
    }

    pub fn snapshot(&self) -> WizardState {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<WizardState> {
        self.tx.subscribe()
    }
}
