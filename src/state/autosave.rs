//! Debounced auto-save scheduling.
//!
//! The scheduler never performs I/O itself: it tells its driver when a save should
//! start and whether the dirty flag may be cleared once that save completes.

use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;

/// Phases of the auto-save scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutoSavePhase {
    /// Nothing pending.
    Idle,
    /// A save will start at `deadline` unless another mutation pushes it back.
    Scheduled {
        /// Instant at which the save fires.
        deadline: Instant,
    },
    /// A save is in flight.
    Saving {
        /// Deadline of the save requested by mutations that arrived mid-flight.
        follow_up: Option<Instant>,
    },
}

/// Error returned when a completion is reported while no save is in flight.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("save completion reported while the scheduler is {phase:?}")]
pub struct NotSaving {
    /// Phase the scheduler was in.
    pub phase: AutoSavePhase,
}

/// What the driver must do after a save completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaveCompletion {
    /// The saved snapshot is still the latest one, so the dirty flag can be cleared.
    pub clear_dirty: bool,
}

/// State machine implementing a single-flight, resettable debounce.
#[derive(Debug, Clone)]
pub struct AutoSaveMachine {
    delay: Duration,
    phase: AutoSavePhase,
}

impl AutoSaveMachine {
    /// Create an idle scheduler with the given quiescence delay.
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            phase: AutoSavePhase::Idle,
        }
    }

    /// Current phase.
    pub fn phase(&self) -> AutoSavePhase {
        self.phase
    }

    /// Quiet period applied after each mutation.
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Deadline the driver should sleep until, if a save is scheduled.
    pub fn deadline(&self) -> Option<Instant> {
        match self.phase {
            AutoSavePhase::Scheduled { deadline } => Some(deadline),
            _ => None,
        }
    }

    /// A save-worthy mutation happened at `now`: (re)arm the timer.
    pub fn on_mutation(&mut self, now: Instant) {
        let deadline = now + self.delay;
        self.phase = match self.phase {
            AutoSavePhase::Idle | AutoSavePhase::Scheduled { .. } => {
                AutoSavePhase::Scheduled { deadline }
            }
            AutoSavePhase::Saving { .. } => AutoSavePhase::Saving {
                follow_up: Some(deadline),
            },
        };
    }

    /// The timer woke up at `now`. Returns `true` when the driver must start a save.
    pub fn on_timer(&mut self, now: Instant) -> bool {
        match self.phase {
            AutoSavePhase::Scheduled { deadline } if now >= deadline => {
                self.phase = AutoSavePhase::Saving { follow_up: None };
                true
            }
            _ => false,
        }
    }

    /// The in-flight save finished, successfully or not.
    ///
    /// A follow-up requested mid-flight is scheduled whatever the result; failures
    /// are otherwise not retried.
    pub fn on_save_complete(&mut self, succeeded: bool) -> Result<SaveCompletion, NotSaving> {
        let AutoSavePhase::Saving { follow_up } = self.phase else {
            return Err(NotSaving { phase: self.phase });
        };

        self.phase = match follow_up {
            Some(deadline) => AutoSavePhase::Scheduled { deadline },
            None => AutoSavePhase::Idle,
        };

        Ok(SaveCompletion {
            clear_dirty: succeeded && follow_up.is_none(),
        })
    }

    /// The board stopped being eligible for auto-save: drop any pending schedule.
    ///
    /// An in-flight save is left to complete.
    pub fn cancel(&mut self) {
        self.phase = match self.phase {
            AutoSavePhase::Idle | AutoSavePhase::Scheduled { .. } => AutoSavePhase::Idle,
            AutoSavePhase::Saving { .. } => AutoSavePhase::Saving { follow_up: None },
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DELAY: Duration = Duration::from_millis(1_000);

    #[test]
    fn initial_state_is_idle() {
        let machine = AutoSaveMachine::new(DELAY);
        assert_eq!(machine.phase(), AutoSavePhase::Idle);
        assert_eq!(machine.deadline(), None);
    }

    #[test]
    fn mutations_push_the_deadline_back() {
        let mut machine = AutoSaveMachine::new(DELAY);
        let start = Instant::now();

        machine.on_mutation(start);
        machine.on_mutation(start + Duration::from_millis(300));
        assert_eq!(
            machine.deadline(),
            Some(start + Duration::from_millis(1_300))
        );

        assert!(!machine.on_timer(start + Duration::from_millis(1_000)));
        assert!(machine.on_timer(start + Duration::from_millis(1_300)));
        assert_eq!(machine.phase(), AutoSavePhase::Saving { follow_up: None });
    }

    #[test]
    fn successful_save_returns_to_idle_and_clears_dirty() {
        let mut machine = AutoSaveMachine::new(DELAY);
        let start = Instant::now();
        machine.on_mutation(start);
        assert!(machine.on_timer(start + DELAY));

        let completion = machine.on_save_complete(true).unwrap();
        assert!(completion.clear_dirty);
        assert_eq!(machine.phase(), AutoSavePhase::Idle);
    }

    #[test]
    fn mutation_during_save_schedules_follow_up() {
        let mut machine = AutoSaveMachine::new(DELAY);
        let start = Instant::now();
        machine.on_mutation(start);
        machine.on_timer(start + DELAY);

        let mid_flight = start + Duration::from_millis(1_200);
        machine.on_mutation(mid_flight);
        assert_eq!(machine.deadline(), None);

        let completion = machine.on_save_complete(true).unwrap();
        assert!(!completion.clear_dirty);
        assert_eq!(machine.deadline(), Some(mid_flight + DELAY));
    }

    #[test]
    fn failed_save_is_not_retried() {
        let mut machine = AutoSaveMachine::new(DELAY);
        let start = Instant::now();
        machine.on_mutation(start);
        machine.on_timer(start + DELAY);

        let completion = machine.on_save_complete(false).unwrap();
        assert!(!completion.clear_dirty);
        assert_eq!(machine.phase(), AutoSavePhase::Idle);
    }

    #[test]
    fn cancel_drops_schedule_but_not_flight() {
        let mut machine = AutoSaveMachine::new(DELAY);
        let start = Instant::now();
        machine.on_mutation(start);
        machine.cancel();
        assert_eq!(machine.phase(), AutoSavePhase::Idle);

        machine.on_mutation(start);
        machine.on_timer(start + DELAY);
        machine.on_mutation(start + DELAY);
        machine.cancel();
        assert_eq!(machine.phase(), AutoSavePhase::Saving { follow_up: None });
    }

    #[test]
    fn completion_without_flight_is_an_error() {
        let mut machine = AutoSaveMachine::new(DELAY);
        let err = machine.on_save_complete(true).unwrap_err();
        assert_eq!(err.phase, AutoSavePhase::Idle);
    }
}
