//! Job state machine (spec.md §4.J): transitions are serialized through a
//! single mutex so two writers can never both succeed a `can_transition_to`
//! check against the same stale state, while reads go through a plain
//! atomic load and never block on that mutex.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Mutex;

use tabulon_error::TabulonError;
use tabulon_types::JobState;

fn encode(state: JobState) -> u8 {
    match state {
        JobState::Pending => 0,
        JobState::Analyzing => 1,
        JobState::Mapping => 2,
        JobState::Materializing => 3,
        JobState::Validating => 4,
        JobState::Done => 5,
        JobState::Failed => 6,
        JobState::Cancelled => 7,
    }
}

fn decode(byte: u8) -> JobState {
    match byte {
        0 => JobState::Pending,
        1 => JobState::Analyzing,
        2 => JobState::Mapping,
        3 => JobState::Materializing,
        4 => JobState::Validating,
        5 => JobState::Done,
        6 => JobState::Failed,
        _ => JobState::Cancelled,
    }
}

pub struct JobStateMachine {
    state: AtomicU8,
    transition_lock: Mutex<()>,
}

impl JobStateMachine {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(encode(JobState::Pending)),
            transition_lock: Mutex::new(()),
        }
    }

    /// Lock-free read of the current state.
    #[must_use]
    pub fn current(&self) -> JobState {
        decode(self.state.load(Ordering::Acquire))
    }

    /// Attempt `current -> next`. Serialized against concurrent transitions;
    /// rejects illegal transitions without mutating state.
    pub fn transition(&self, next: JobState) -> Result<(), TabulonError> {
        let _guard = self.transition_lock.lock().unwrap();
        let current = self.current();
        if !current.can_transition_to(next) {
            return Err(TabulonError::Config(format!(
                "illegal job transition: {current:?} -> {next:?}"
            )));
        }
        self.state.store(encode(next), Ordering::Release);
        Ok(())
    }
}

impl Default for JobStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn starts_pending() {
        let sm = JobStateMachine::new();
        assert_eq!(sm.current(), JobState::Pending);
    }

    #[test]
    fn legal_transition_succeeds() {
        let sm = JobStateMachine::new();
        sm.transition(JobState::Analyzing).unwrap();
        assert_eq!(sm.current(), JobState::Analyzing);
    }

    #[test]
    fn illegal_transition_is_rejected_and_state_is_unchanged() {
        let sm = JobStateMachine::new();
        let err = sm.transition(JobState::Materializing).unwrap_err();
        assert_eq!(err.code(), "CONFIG_ERROR");
        assert_eq!(sm.current(), JobState::Pending);
    }

    #[test]
    fn terminal_state_rejects_further_transitions() {
        let sm = JobStateMachine::new();
        sm.transition(JobState::Failed).unwrap();
        assert!(sm.transition(JobState::Analyzing).is_err());
    }

    #[test]
    fn concurrent_transition_attempts_only_one_wins_the_race_edge() {
        let sm = Arc::new(JobStateMachine::new());
        sm.transition(JobState::Analyzing).unwrap();
        sm.transition(JobState::Mapping).unwrap();
        sm.transition(JobState::Materializing).unwrap();
        sm.transition(JobState::Validating).unwrap();

        let a = sm.clone();
        let b = sm.clone();
        let t1 = std::thread::spawn(move || a.transition(JobState::Done));
        let t2 = std::thread::spawn(move || b.transition(JobState::Failed));
        let r1 = t1.join().unwrap();
        let r2 = t2.join().unwrap();
        // Exactly one of the two racing terminal transitions succeeds.
        assert_ne!(r1.is_ok(), r2.is_ok());
    }
}
