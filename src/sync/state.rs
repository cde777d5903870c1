use std::time::Instant;

/// What the reconciler is currently doing with the file.
///
/// A finished save or reload is not immediately `Idle`: the phase is held
/// until `release_at` so the watcher notifications caused by our own write
/// (or still trickling in after a reload) are not taken for external edits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncPhase {
    #[default]
    Idle,
    /// Writing the file. `release_at` is set once the write has finished.
    Saving { release_at: Option<Instant> },
    /// Reading the file. `release_at` is set once the reload has finished.
    ReloadingFromFile { release_at: Option<Instant> },
}

impl SyncPhase {
    pub fn is_idle(&self) -> bool {
        matches!(self, SyncPhase::Idle)
    }

    pub fn is_saving(&self) -> bool {
        matches!(self, SyncPhase::Saving { .. })
    }

    pub fn is_reloading(&self) -> bool {
        matches!(self, SyncPhase::ReloadingFromFile { .. })
    }

    /// When a held phase returns to idle, if it is being held.
    pub fn release_at(&self) -> Option<Instant> {
        match self {
            SyncPhase::Idle => None,
            SyncPhase::Saving { release_at } | SyncPhase::ReloadingFromFile { release_at } => {
                *release_at
            }
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SyncPhase::Idle => "idle",
            SyncPhase::Saving { .. } => "saving",
            SyncPhase::ReloadingFromFile { .. } => "reloading",
        }
    }
}

/// Inputs to [`transition`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseEvent {
    BeginSave,
    BeginReload,
    /// The in-flight save or reload completed; hold until the given instant.
    Finished { release_at: Instant },
    /// Time has passed.
    Tick(Instant),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("cannot apply {event:?} while {from}")]
pub struct TransitionError {
    pub from: &'static str,
    pub event: PhaseEvent,
}

/// Advance the phase machine. Saves and reloads only start from idle, so
/// the two never overlap.
pub fn transition(phase: SyncPhase, event: PhaseEvent) -> Result<SyncPhase, TransitionError> {
    use PhaseEvent::*;
    use SyncPhase::*;

    let next = match (phase, event) {
        (Idle, BeginSave) => Saving { release_at: None },
        (Idle, BeginReload) => ReloadingFromFile { release_at: None },
        (Saving { release_at: None }, Finished { release_at }) => Saving {
            release_at: Some(release_at),
        },
        (ReloadingFromFile { release_at: None }, Finished { release_at }) => ReloadingFromFile {
            release_at: Some(release_at),
        },
        (Saving { release_at: Some(t) }, Tick(now))
        | (ReloadingFromFile { release_at: Some(t) }, Tick(now))
            if now >= t =>
        {
            Idle
        }
        (phase, Tick(_)) => phase,
        (phase, event) => {
            return Err(TransitionError {
                from: phase.label(),
                event,
            });
        }
    };
    Ok(next)
}
