//! Job state machine.
//!
//! `NEW` is only ever assigned at creation. Every later transition goes
//! through [`JobState::validate_transition`], so a record can never move
//! backwards or leave a terminal state.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    New,
    Queued,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobState {
    pub const ALL: [JobState; 6] = [
        JobState::New,
        JobState::Queued,
        JobState::Running,
        JobState::Completed,
        JobState::Failed,
        JobState::Cancelled,
    ];

    /// Wire/storage spelling, e.g. `"QUEUED"`.
    pub fn as_str(self) -> &'static str {
        match self {
            JobState::New => "NEW",
            JobState::Queued => "QUEUED",
            JobState::Running => "RUNNING",
            JobState::Completed => "COMPLETED",
            JobState::Failed => "FAILED",
            JobState::Cancelled => "CANCELLED",
        }
    }

    /// Returns the set of states reachable from `self`.
    ///
    /// Terminal states return an empty slice. `Queued -> Queued` is allowed
    /// so a queued job can be re-queued with a new priority.
    pub fn valid_transitions(self) -> &'static [JobState] {
        use JobState::*;
        match self {
            New => &[Queued, Running, Failed, Cancelled],
            Queued => &[Queued, Running, Failed, Cancelled],
            Running => &[Completed, Failed, Cancelled],
            Completed | Failed | Cancelled => &[],
        }
    }

    pub fn can_transition(self, to: JobState) -> bool {
        self.valid_transitions().contains(&to)
    }

    pub fn is_terminal(self) -> bool {
        self.valid_transitions().is_empty()
    }

    /// Validate a state transition, returning an error message for invalid ones.
    pub fn validate_transition(self, to: JobState) -> Result<(), String> {
        if self.can_transition(to) {
            Ok(())
        } else {
            Err(format!("Invalid transition: {self} -> {to}"))
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobState {
    type Err = String;

    /// Case-insensitive, so `"queued"` from a status server parses too.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        JobState::ALL
            .into_iter()
            .find(|state| state.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("Unknown job state '{s}'"))
    }
}

#[cfg(test)]
mod tests {
    use super::JobState::*;
    use super::*;

    // -----------------------------------------------------------------------
    // Valid transitions
    // -----------------------------------------------------------------------

    #[test]
    fn new_to_queued() {
        assert!(New.can_transition(Queued));
    }

    #[test]
    fn queued_can_be_requeued() {
        assert!(Queued.can_transition(Queued));
    }

    #[test]
    fn queued_to_running() {
        assert!(Queued.can_transition(Running));
    }

    #[test]
    fn running_to_each_terminal_state() {
        assert!(Running.can_transition(Completed));
        assert!(Running.can_transition(Failed));
        assert!(Running.can_transition(Cancelled));
    }

    // -----------------------------------------------------------------------
    // Terminal states and backwards moves
    // -----------------------------------------------------------------------

    #[test]
    fn terminal_states_have_no_transitions() {
        for state in [Completed, Failed, Cancelled] {
            assert!(state.is_terminal(), "{state} should be terminal");
        }
    }

    #[test]
    fn nothing_returns_to_new() {
        for state in JobState::ALL {
            assert!(!state.can_transition(New), "{state} -> NEW must be rejected");
        }
    }

    #[test]
    fn running_cannot_be_requeued() {
        let err = Running.validate_transition(Queued).unwrap_err();
        assert_eq!(err, "Invalid transition: RUNNING -> QUEUED");
    }

    // -----------------------------------------------------------------------
    // Parsing / serialization
    // -----------------------------------------------------------------------

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!("queued".parse::<JobState>().unwrap(), Queued);
        assert_eq!("CANCELLED".parse::<JobState>().unwrap(), Cancelled);
        assert!("PAUSED".parse::<JobState>().is_err());
    }

    #[test]
    fn serializes_upper_case() {
        assert_eq!(serde_json::to_string(&Queued).unwrap(), "\"QUEUED\"");
        let parsed: JobState = serde_json::from_str("\"COMPLETED\"").unwrap();
        assert_eq!(parsed, Completed);
    }
}
