//! Job lifecycle status and its transition table.
//!
//! Transition rules:
//! - `QUEUED`   -> `RUNNING`
//! - `RUNNING`  -> `FINISHED`, `FAILED`
//! - `FINISHED` and `FAILED` are terminal.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Execution status of a prime job. Stored as its upper-case name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Queued,
    Running,
    Finished,
    Failed,
}

/// All statuses, in lifecycle order.
pub const ALL_STATUSES: [JobStatus; 4] = [
    JobStatus::Queued,
    JobStatus::Running,
    JobStatus::Finished,
    JobStatus::Failed,
];

impl JobStatus {
    /// The persisted / wire representation.
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Queued => "QUEUED",
            JobStatus::Running => "RUNNING",
            JobStatus::Finished => "FINISHED",
            JobStatus::Failed => "FAILED",
        }
    }

    /// Returns the statuses this status may move to.
    pub fn valid_transitions(self) -> &'static [JobStatus] {
        match self {
            JobStatus::Queued => &[JobStatus::Running],
            JobStatus::Running => &[JobStatus::Finished, JobStatus::Failed],
            JobStatus::Finished | JobStatus::Failed => &[],
        }
    }

    pub fn can_transition_to(self, next: JobStatus) -> bool {
        self.valid_transitions().contains(&next)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Finished | JobStatus::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ALL_STATUSES
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| CoreError::Validation(format!("Invalid job status '{s}'")))
    }
}

/// Validate that a status transition from `current` to `next` is allowed.
///
/// Illegal transitions are conflicts, not validation failures: they mean two
/// writers raced for the same job or a terminal job was touched again.
pub fn validate_transition(current: JobStatus, next: JobStatus) -> Result<(), CoreError> {
    if current.can_transition_to(next) {
        Ok(())
    } else {
        Err(CoreError::Conflict(format!(
            "Cannot transition job from {current} to {next}. Allowed transitions: {:?}",
            current.valid_transitions()
        )))
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn only_forward_edges_are_allowed() {
        let mut allowed = Vec::new();
        for from in ALL_STATUSES {
            for to in ALL_STATUSES {
                if from.can_transition_to(to) {
                    allowed.push((from, to));
                }
            }
        }
        assert_eq!(
            allowed,
            vec![
                (JobStatus::Queued, JobStatus::Running),
                (JobStatus::Running, JobStatus::Finished),
                (JobStatus::Running, JobStatus::Failed),
            ]
        );
    }

    #[test]
    fn terminal_statuses_have_no_exits() {
        assert!(JobStatus::Finished.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(!JobStatus::Queued.is_terminal());
        assert!(!JobStatus::Running.is_terminal());
        assert!(JobStatus::Finished.valid_transitions().is_empty());
    }

    #[test]
    fn running_to_running_is_a_conflict() {
        assert_matches!(
            validate_transition(JobStatus::Running, JobStatus::Running),
            Err(CoreError::Conflict(_))
        );
    }

    #[test]
    fn parses_wire_names() {
        for status in ALL_STATUSES {
            assert_eq!(status.as_str().parse::<JobStatus>().unwrap(), status);
        }
        assert!("queued".parse::<JobStatus>().is_err());
    }

    #[test]
    fn serializes_upper_case() {
        assert_eq!(
            serde_json::to_string(&JobStatus::Finished).unwrap(),
            "\"FINISHED\""
        );
    }
}
