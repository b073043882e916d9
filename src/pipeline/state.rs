use std::fmt;

/// Where a pipeline run currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Fetching,
    Loading,
    Cleaning,
    Mapping,
    Writing,
    Done,   // terminal
    Failed, // terminal
}

impl PipelineState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Fetching => "fetching",
            Self::Loading => "loading",
            Self::Cleaning => "cleaning",
            Self::Mapping => "mapping",
            Self::Writing => "writing",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }

    /// Returns true if this is a terminal state (Done or Failed).
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    /// The one state a successful step leads to, `None` once terminal.
    pub fn next(&self) -> Option<Self> {
        match self {
            Self::Idle => Some(Self::Fetching),
            Self::Fetching => Some(Self::Loading),
            Self::Loading => Some(Self::Cleaning),
            Self::Cleaning => Some(Self::Mapping),
            Self::Mapping => Some(Self::Writing),
            Self::Writing => Some(Self::Done),
            Self::Done | Self::Failed => None,
        }
    }

    /// Any non-terminal state may fail, otherwise only the next state is allowed.
    pub fn can_transition_to(&self, target: Self) -> bool {
        if self.is_terminal() {
            return false;
        }
        target == Self::Failed || self.next() == Some(target)
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [PipelineState; 8] = [
        PipelineState::Idle,
        PipelineState::Fetching,
        PipelineState::Loading,
        PipelineState::Cleaning,
        PipelineState::Mapping,
        PipelineState::Writing,
        PipelineState::Done,
        PipelineState::Failed,
    ];

    #[test]
    fn test_happy_path_order() {
        let mut state = PipelineState::Idle;
        let mut seen = vec![state];
        while let Some(next) = state.next() {
            assert!(state.can_transition_to(next));
            state = next;
            seen.push(state);
        }
        assert_eq!(&seen[..], &ALL[..7]);
    }

    #[test]
    fn test_any_running_state_can_fail() {
        for state in ALL.iter().filter(|s| !s.is_terminal()) {
            assert!(state.can_transition_to(PipelineState::Failed), "{}", state);
        }
    }

    #[test]
    fn test_no_backward_or_skipping_transitions() {
        assert!(!PipelineState::Loading.can_transition_to(PipelineState::Fetching));
        assert!(!PipelineState::Fetching.can_transition_to(PipelineState::Cleaning));
        assert!(!PipelineState::Writing.can_transition_to(PipelineState::Writing));
        assert!(!PipelineState::Idle.can_transition_to(PipelineState::Done));
    }

    #[test]
    fn test_terminal_states_are_final() {
        for target in ALL {
            assert!(!PipelineState::Done.can_transition_to(target));
            assert!(!PipelineState::Failed.can_transition_to(target));
        }
        assert!(PipelineState::Done.is_terminal());
        assert!(PipelineState::Failed.is_terminal());
        assert!(!PipelineState::Writing.is_terminal());
    }
}
