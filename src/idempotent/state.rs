//! Per-invocation execution phases
//!
//! ```text
//! Start -> Acquire -> Acquired -> Invoke -> Commit   -> End
//!                  \                     \-> Rollback -> End
//!                   \-> Rejected -> End
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionPhase {
    Start,
    Acquire,
    Acquired,
    Rejected,
    Invoke,
    Commit,
    Rollback,
    End,
}

impl ExecutionPhase {
    pub fn can_transition_to(&self, next: ExecutionPhase) -> bool {
        use ExecutionPhase::*;
        matches!(
            (self, next),
            (Start, Acquire)
                | (Acquire, Acquired)
                | (Acquire, Rejected)
                | (Acquired, Invoke)
                | (Invoke, Commit)
                | (Invoke, Rollback)
                | (Commit, End)
                | (Rollback, End)
                | (Rejected, End)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::End)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Acquire => "acquire",
            Self::Acquired => "acquired",
            Self::Rejected => "rejected",
            Self::Invoke => "invoke",
            Self::Commit => "commit",
            Self::Rollback => "rollback",
            Self::End => "end",
        }
    }
}

impl fmt::Display for ExecutionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
