use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Lifecycle state of a mount session
///
/// States only ever move forward; `Ready` and `FailedEarly` are alternative
/// outcomes of `Mounting`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Created,
    Mounting,
    Ready,
    FailedEarly,
    Serving,
    Unmounting,
    Terminated,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Created => "created",
            SessionState::Mounting => "mounting",
            SessionState::Ready => "ready",
            SessionState::FailedEarly => "failed_early",
            SessionState::Serving => "serving",
            SessionState::Unmounting => "unmounting",
            SessionState::Terminated => "terminated",
        }
    }

    fn rank(&self) -> u8 {
        match self {
            SessionState::Created => 0,
            SessionState::Mounting => 1,
            SessionState::Ready | SessionState::FailedEarly => 2,
            SessionState::Serving => 3,
            SessionState::Unmounting => 4,
            SessionState::Terminated => 5,
        }
    }

    /// Whether `next` is a legal step from this state
    pub fn can_advance_to(&self, next: SessionState) -> bool {
        if *self == SessionState::FailedEarly {
            return next == SessionState::Terminated;
        }
        next.rank() > self.rank()
    }
}

impl std::str::FromStr for SessionState {
    type Err = UnknownState;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "created" => SessionState::Created,
            "mounting" => SessionState::Mounting,
            "ready" => SessionState::Ready,
            "failed_early" => SessionState::FailedEarly,
            "serving" => SessionState::Serving,
            "unmounting" => SessionState::Unmounting,
            "terminated" => SessionState::Terminated,
            other => return Err(UnknownState(other.to_string())),
        })
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown session state: {0}")]
pub struct UnknownState(String);

/// Shared, forward-only holder of a session's state
#[derive(Debug)]
pub(crate) struct StateCell {
    state: Mutex<SessionState>,
}

impl StateCell {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(SessionState::Created),
        }
    }

    pub(crate) fn get(&self) -> SessionState {
        *self.state.lock()
    }

    /// Move to `next` if that is a forward step. Returns whether it moved.
    pub(crate) fn advance(&self, next: SessionState) -> bool {
        let mut state = self.state.lock();
        if !state.can_advance_to(next) {
            if *state != next {
                tracing::trace!(from = %*state, to = %next, "ignoring backward state change");
            }
            return false;
        }
        tracing::debug!(from = %*state, to = %next, "session state");
        *state = next;
        true
    }
}
