use std::fmt;

/// Lifecycle of one checkpoint run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Idle,
    Attached,
    Running,
    Intercepted,
    Exited,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Attached => "attached",
            SessionState::Running => "running",
            SessionState::Intercepted => "intercepted",
            SessionState::Exited => "exited",
        }
    }

    /// Any state can end the run; otherwise the order is fixed.
    pub fn can_transition_to(&self, next: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, next),
            (Idle, Attached)
                | (Attached, Running)
                | (Running, Intercepted)
                | (Intercepted, Running)
                | (Idle | Attached | Running | Intercepted, Exited)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Exited)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
