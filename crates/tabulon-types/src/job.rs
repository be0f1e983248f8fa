use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::ids::JobId;

/// The job state machine's states. Terminal states (`Done`, `Failed`,
/// `Cancelled`) reject further transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Pending,
    Analyzing,
    Mapping,
    Materializing,
    Validating,
    Done,
    Failed,
    Cancelled,
}

impl JobState {
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, JobState::Done | JobState::Failed | JobState::Cancelled)
    }

    /// Whether `self -> next` is a legal transition under the state machine
    /// in spec.md §4.J: the non-terminal happy path is strictly linear,
    /// `Failed`/`Cancelled` are reachable from any non-terminal state, and
    /// terminal states accept nothing.
    #[must_use]
    pub fn can_transition_to(self, next: JobState) -> bool {
        if self.is_terminal() {
            return false;
        }
        if matches!(next, JobState::Failed | JobState::Cancelled) {
            return true;
        }
        matches!(
            (self, next),
            (JobState::Pending, JobState::Analyzing)
                | (JobState::Analyzing, JobState::Mapping)
                | (JobState::Mapping, JobState::Materializing)
                | (JobState::Materializing, JobState::Validating)
                | (JobState::Validating, JobState::Done)
        )
    }
}

/// Current status of a job, mutated only through checked transitions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobStatus {
    pub job_id: JobId,
    pub state: JobState,
    pub detail: Option<String>,
    pub last_error: Option<String>,
    pub metadata: BTreeMap<String, String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JobStatus {
    #[must_use]
    pub fn new(job_id: JobId, now: DateTime<Utc>) -> Self {
        Self {
            job_id,
            state: JobState::Pending,
            detail: None,
            last_error: None,
            metadata: BTreeMap::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// An append-only record of a job's state transitions, used to reconstruct
/// history and to audit crash-before-checkpoint scenarios.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobEvent {
    pub job_id: JobId,
    pub state: JobState,
    pub detail: Option<String>,
    pub at: DateTime<Utc>,
}
