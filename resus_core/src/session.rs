//! Session state and the one-second clock.
//!
//! The clock only advances while the session is running. The cycle timer
//! clamps at [`CYCLE_DURATION_SECONDS`]; moving to the next cycle is an
//! operator decision (pulse check or sync), never a clock side effect.

use crate::types::{Mode, SessionStatus};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Length of one compression cycle
pub const CYCLE_DURATION_SECONDS: u32 = 120;

/// Pulse-check and compressor prompts open this many seconds before the
/// cycle timer runs out
pub const PROMPT_LEAD_SECONDS: u32 = 5;

/// Result of a single clock tick
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Tick {
    /// Session not running; nothing advanced
    Frozen,
    Advanced {
        /// The cycle timer reached its clamp on this tick
        cycle_completed: bool,
    },
}

/// Run state, counters and mode of the current resuscitation
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Session {
    pub status: SessionStatus,
    pub total_elapsed_seconds: u64,
    pub cycle_number: u32,
    pub cycle_elapsed_seconds: u32,
    pub mode: Mode,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    /// Set by a sync; the next pulse check then keeps the cycle number
    pub cycle_synced: bool,
    pub pulse_checks: u32,
    /// Cycle in which the most recent pulse check was confirmed
    #[serde(default)]
    pub last_pulse_check_cycle: Option<u32>,
    pub compressor_changes: u32,
    pub mechanical_cpr: bool,
}

impl Session {
    pub fn new(mode: Mode) -> Self {
        Self {
            status: SessionStatus::Idle,
            total_elapsed_seconds: 0,
            cycle_number: 1,
            cycle_elapsed_seconds: 0,
            mode,
            started_at: None,
            ended_at: None,
            cycle_synced: false,
            pulse_checks: 0,
            last_pulse_check_cycle: None,
            compressor_changes: 0,
            mechanical_cpr: false,
        }
    }

    /// Advance both counters by one second if running
    pub fn tick(&mut self) -> Tick {
        if self.status != SessionStatus::Running {
            return Tick::Frozen;
        }

        let was_complete = self.is_cycle_complete();
        self.total_elapsed_seconds += 1;
        self.cycle_elapsed_seconds = (self.cycle_elapsed_seconds + 1).min(CYCLE_DURATION_SECONDS);

        Tick::Advanced {
            cycle_completed: !was_complete && self.is_cycle_complete(),
        }
    }

    /// Start or resume. Returns true only for the very first start.
    pub fn begin(&mut self, now: DateTime<Utc>) -> Result<bool> {
        match self.status {
            SessionStatus::Ended => Err(Error::SessionEnded),
            SessionStatus::Running => Ok(false),
            SessionStatus::Paused => {
                self.status = SessionStatus::Running;
                Ok(false)
            }
            SessionStatus::Idle => {
                let first = self.total_elapsed_seconds == 0;
                if first {
                    self.started_at = Some(now);
                }
                self.status = SessionStatus::Running;
                Ok(first)
            }
        }
    }

    /// Returns true if the session was running
    pub fn pause(&mut self) -> bool {
        if self.status == SessionStatus::Running {
            self.status = SessionStatus::Paused;
            true
        } else {
            false
        }
    }

    pub fn finish(&mut self, now: DateTime<Utc>) {
        self.status = SessionStatus::Ended;
        self.ended_at = Some(now);
    }

    /// Move to the next cycle and restart the cycle timer
    pub fn advance_cycle(&mut self) {
        self.cycle_number += 1;
        self.cycle_elapsed_seconds = 0;
    }

    pub fn is_cycle_complete(&self) -> bool {
        self.cycle_elapsed_seconds >= CYCLE_DURATION_SECONDS
    }

    /// Inside the prompt window at the end of the cycle
    pub fn is_prompt_window(&self) -> bool {
        self.cycle_elapsed_seconds >= CYCLE_DURATION_SECONDS - PROMPT_LEAD_SECONDS
    }

    /// Only true after a sync, since a pulse check normally starts a new cycle
    pub fn pulse_checked_this_cycle(&self) -> bool {
        self.last_pulse_check_cycle == Some(self.cycle_number)
    }

    pub fn cycle_remaining_seconds(&self) -> u32 {
        CYCLE_DURATION_SECONDS - self.cycle_elapsed_seconds
    }

    /// Started and not yet ended
    pub fn is_active(&self) -> bool {
        matches!(self.status, SessionStatus::Running | SessionStatus::Paused)
    }

    /// Clinical actions are only accepted during an active session
    pub fn ensure_active(&self) -> Result<()> {
        match self.status {
            SessionStatus::Running | SessionStatus::Paused => Ok(()),
            SessionStatus::Idle => Err(Error::NotStarted),
            SessionStatus::Ended => Err(Error::SessionEnded),
        }
    }
}

/// Format session seconds as `MM:SS`
pub fn format_clock(seconds: u64) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn running() -> Session {
        let mut s = Session::new(Mode::Coach);
        s.begin(Utc::now()).unwrap();
        s
    }

    #[test]
    fn test_no_advance_before_start_or_while_paused() {
        let mut s = Session::new(Mode::Coach);
        assert_eq!(s.tick(), Tick::Frozen);
        assert_eq!(s.total_elapsed_seconds, 0);

        s.begin(Utc::now()).unwrap();
        s.tick();
        assert!(s.pause());
        assert_eq!(s.tick(), Tick::Frozen);
        assert_eq!(s.total_elapsed_seconds, 1);
        assert_eq!(s.cycle_elapsed_seconds, 1);
    }

    #[test]
    fn test_cycle_timer_clamps_without_advancing_cycle() {
        let mut s = running();
        let mut completions = 0;
        for _ in 0..300 {
            if let Tick::Advanced { cycle_completed: true } = s.tick() {
                completions += 1;
            }
        }
        assert_eq!(s.total_elapsed_seconds, 300);
        assert_eq!(s.cycle_elapsed_seconds, CYCLE_DURATION_SECONDS);
        assert_eq!(s.cycle_number, 1);
        assert_eq!(completions, 1);
    }

    #[test]
    fn test_first_start_versus_resume() {
        let mut s = Session::new(Mode::Coach);
        assert!(s.begin(Utc::now()).unwrap());
        assert!(s.started_at.is_some());
        s.tick();
        s.pause();
        assert!(!s.begin(Utc::now()).unwrap());
        assert_eq!(s.status, SessionStatus::Running);
    }

    #[test]
    fn test_ended_session_refuses_start() {
        let mut s = running();
        s.finish(Utc::now());
        assert!(matches!(s.begin(Utc::now()), Err(Error::SessionEnded)));
        assert!(matches!(s.ensure_active(), Err(Error::SessionEnded)));
    }

    #[test]
    fn test_prompt_window() {
        let mut s = running();
        for _ in 0..114 {
            s.tick();
        }
        assert!(!s.is_prompt_window());
        s.tick();
        assert!(s.is_prompt_window());
        assert_eq!(s.cycle_remaining_seconds(), 5);
    }

    #[test]
    fn test_format_clock() {
        assert_eq!(format_clock(0), "00:00");
        assert_eq!(format_clock(125), "02:05");
    }
}
