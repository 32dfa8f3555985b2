use std::fmt;

use thiserror::Error;

/// Save lifecycle of one open document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveState {
    /// Local mirror equals the last document the server returned.
    Clean,
    /// Local edits are waiting for the debounce window to close.
    Dirty,
    /// A PUT is in flight. `queued` records a save requested meanwhile.
    Saving { queued: bool },
    /// The last PUT failed; edits are kept and nothing retries on its own.
    SaveFailed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveEvent {
    Mutated,
    /// Debounce expiry or a manual save.
    SaveRequested,
    /// `stale` is true when the document changed while the PUT was in flight.
    SaveSucceeded { stale: bool },
    SaveFailed { stale: bool },
}

/// What the controller must do after a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    None,
    StartSave,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("illegal save transition: {event:?} while {from}")]
pub struct IllegalTransition {
    pub from: SaveState,
    pub event: SaveEvent,
}

impl SaveState {
    /// Unsaved local edits exist.
    pub fn is_dirty(&self) -> bool {
        !matches!(self, SaveState::Clean)
    }

    pub fn is_saving(&self) -> bool {
        matches!(self, SaveState::Saving { .. })
    }

    pub fn on(self, event: SaveEvent) -> Result<(SaveState, Effect), IllegalTransition> {
        use SaveEvent as E;
        use SaveState as S;

        let next = match (self, event) {
            (S::Clean | S::Dirty | S::SaveFailed, E::Mutated) => (S::Dirty, Effect::None),
            (S::Saving { queued }, E::Mutated) => (S::Saving { queued }, Effect::None),

            (S::Clean, E::SaveRequested) => (S::Clean, Effect::None),
            (S::Dirty | S::SaveFailed, E::SaveRequested) => {
                (S::Saving { queued: false }, Effect::StartSave)
            }
            (S::Saving { .. }, E::SaveRequested) => (S::Saving { queued: true }, Effect::None),

            (S::Saving { .. }, E::SaveSucceeded { stale: false }) => (S::Clean, Effect::None),
            (S::Saving { queued: true }, E::SaveSucceeded { stale: true })
            | (S::Saving { queued: true }, E::SaveFailed { stale: true }) => {
                (S::Saving { queued: false }, Effect::StartSave)
            }
            (S::Saving { queued: false }, E::SaveSucceeded { stale: true }) => (S::Dirty, Effect::None),
            (S::Saving { .. }, E::SaveFailed { .. }) => (S::SaveFailed, Effect::None),

            (from, event) => return Err(IllegalTransition { from, event }),
        };
        Ok(next)
    }
}

impl fmt::Display for SaveState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SaveState::Clean => f.write_str("saved"),
            SaveState::Dirty => f.write_str("unsaved changes"),
            SaveState::Saving { queued: false } => f.write_str("saving"),
            SaveState::Saving { queued: true } => f.write_str("saving (another save queued)"),
            SaveState::SaveFailed => f.write_str("save failed"),
        }
    }
}
