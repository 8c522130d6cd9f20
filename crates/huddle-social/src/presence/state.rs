//! Presence lifecycle as a pure state machine.
//!
//! `transition` maps `(state, input)` to the next state and the backend work
//! the caller must start. It performs no I/O, so every race the manager has
//! to handle is expressed (and tested) here.

/// Presence lifecycle of one session in one room.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PresenceState {
    /// No record, nothing in flight.
    #[default]
    Idle,
    /// Join in flight.
    Pending,
    /// Record confirmed present.
    Active,
    /// Leave requested while the join was still in flight.
    LeavePending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresenceInput {
    Join,
    Leave,
    /// The in-flight join finished.
    JoinSettled { ok: bool },
    NetworkOnline,
    NetworkOffline,
    /// Our record disappeared while active, e.g. removed by the reaper.
    RecordLost,
}

/// Backend work requested by a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    None,
    StartJoin,
    StartLeave,
}

pub fn transition(state: PresenceState, input: PresenceInput) -> (PresenceState, Effect) {
    use PresenceInput as I;
    use PresenceState as S;

    match (state, input) {
        (S::Idle, I::Join | I::NetworkOnline) => (S::Pending, Effect::StartJoin),
        (S::Idle, _) => (S::Idle, Effect::None),

        (S::Pending, I::Leave) => (S::LeavePending, Effect::None),
        (S::Pending, I::JoinSettled { ok: true }) => (S::Active, Effect::None),
        (S::Pending, I::JoinSettled { ok: false }) => (S::Idle, Effect::None),
        (S::Pending, _) => (S::Pending, Effect::None),

        // The join is still in flight; re-requesting it cancels the deferred leave.
        (S::LeavePending, I::Join) => (S::Pending, Effect::None),
        (S::LeavePending, I::JoinSettled { .. }) => (S::Idle, Effect::StartLeave),
        (S::LeavePending, _) => (S::LeavePending, Effect::None),

        (S::Active, I::Leave | I::NetworkOffline) => (S::Idle, Effect::StartLeave),
        (S::Active, I::RecordLost) => (S::Pending, Effect::StartJoin),
        (S::Active, _) => (S::Active, Effect::None),
    }
}
