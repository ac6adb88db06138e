//! Append-only event log with a bounded undo window.
//!
//! Every mutating action appends one [`Event`] together with the
//! [`Inverse`] that reverses it. `undo` pops the newest entry while its
//! window is open; everything older is permanent history.

use crate::medication::MedicationTracker;
use crate::rhythm::RhythmState;
use crate::session::format_clock;
use crate::types::{AdrenalineFrequency, Anomaly, DoseUnit, Drug, Mode, Outcome, Procedure, Rhythm};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What happened, with its payload
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    Start,
    Rhythm {
        rhythm: Rhythm,
        previous: Option<Rhythm>,
    },
    Shock {
        number: u32,
        energy_joules: u16,
        rhythm: Option<Rhythm>,
    },
    PulseCheck {
        /// Cycle started by this pulse check, `None` after a sync
        next_cycle: Option<u32>,
    },
    CycleSync {
        new_cycle: u32,
    },
    Medication {
        drug: Drug,
        dose: f64,
        unit: DoseUnit,
        dose_number: u32,
        cumulative: f64,
    },
    Dismiss {
        drug: Drug,
    },
    Snooze {
        drug: Drug,
        until_seconds: u64,
    },
    Mode {
        mode: Mode,
    },
    AdrenalineFrequency {
        minutes: u8,
    },
    CompressorChange {
        /// The change ended mechanical compressions
        resumed_manual: bool,
    },
    MechanicalCpr {
        active: bool,
    },
    Discretionary {
        medication: String,
        dosage: String,
    },
    Procedure {
        procedure: Procedure,
    },
    End {
        outcome: Outcome,
    },
}

impl EventKind {
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::Start => "start",
            EventKind::Rhythm { .. } => "rhythm",
            EventKind::Shock { .. } => "shock",
            EventKind::PulseCheck { .. } => "pulse",
            EventKind::CycleSync { .. } => "sync",
            EventKind::Medication { .. } => "medication",
            EventKind::Dismiss { .. } => "dismiss",
            EventKind::Snooze { .. } => "snooze",
            EventKind::Mode { .. } => "mode",
            EventKind::AdrenalineFrequency { .. } => "frequency",
            EventKind::CompressorChange { .. } => "compressor",
            EventKind::MechanicalCpr { .. } => "lucas",
            EventKind::Discretionary { .. } => "discretionary",
            EventKind::Procedure { .. } => "procedure",
            EventKind::End { .. } => "end",
        }
    }

    /// Human-readable line for the audit trail
    pub fn describe(&self) -> String {
        match self {
            EventKind::Start => "CPR session started".to_string(),
            EventKind::Rhythm { rhythm, previous } => match previous {
                Some(prev) => format!("Rhythm identified: {} (was {})", rhythm, prev),
                None => format!("Rhythm identified: {}", rhythm),
            },
            EventKind::Shock {
                number,
                energy_joules,
                ..
            } => format!("Shock delivered @ {}J (Shock #{})", energy_joules, number),
            EventKind::PulseCheck { next_cycle } => match next_cycle {
                Some(cycle) => format!("Pulse check performed, cycle {} started", cycle),
                None => "Pulse check performed".to_string(),
            },
            EventKind::CycleSync { new_cycle } => {
                format!("Cycle synced, cycle {} started", new_cycle)
            },
            EventKind::Medication {
                drug,
                dose,
                unit,
                dose_number,
                ..
            } => format!("{} {} {} administered (Dose #{})", drug, dose, unit, dose_number),
            EventKind::Dismiss { drug } => format!("{} reminder dismissed", drug),
            EventKind::Snooze {
                drug,
                until_seconds,
            } => format!(
                "{} reminder snoozed until {}",
                drug,
                format_clock(*until_seconds)
            ),
            EventKind::Mode { mode } => format!("Switched to {} mode", mode),
            EventKind::AdrenalineFrequency { minutes } => {
                format!("Adrenaline frequency set to every {} min", minutes)
            }
            EventKind::CompressorChange { resumed_manual } => {
                if *resumed_manual {
                    "Resumed manual chest compressions".to_string()
                } else {
                    "Compressor changed".to_string()
                }
            }
            EventKind::MechanicalCpr { active } => {
                if *active {
                    "LUCAS mechanical CPR device activated".to_string()
                } else {
                    "LUCAS device deactivated - returned to manual compressions".to_string()
                }
            }
            EventKind::Discretionary { medication, dosage } => {
                format!("{} ({}) administered", medication, dosage)
            }
            EventKind::Procedure { procedure } => format!("{} performed", procedure),
            EventKind::End { outcome } => format!("Session ended: {}", outcome),
        }
    }
}

/// Immutable audit-trail entry
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Event {
    #[serde(flatten)]
    pub kind: EventKind,
    pub session_seconds: u64,
    pub cycle: u32,
    pub wall_clock: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub annotations: Vec<Anomaly>,
}

/// How to reverse the side effects of a logged action
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "restore", rename_all = "snake_case")]
pub enum Inverse {
    Medication {
        previous: Box<MedicationTracker>,
    },
    Rhythm {
        previous: RhythmState,
    },
    Cycle {
        cycle_number: u32,
        cycle_elapsed_seconds: u32,
        cycle_synced: bool,
        pulse_checks: u32,
        last_pulse_check_cycle: Option<u32>,
        rhythm: RhythmState,
    },
    Mode {
        previous: Mode,
    },
    AdrenalineFrequency {
        previous: AdrenalineFrequency,
    },
    Compressor {
        changes: u32,
        mechanical_cpr: bool,
    },
    /// The event itself is the only effect
    LogOnly,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
struct Entry {
    event: Event,
    /// `None` for permanent entries
    inverse: Option<Inverse>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct EventLog {
    entries: Vec<Entry>,
    undo_window_seconds: u64,
}

impl EventLog {
    pub fn new(undo_window_seconds: u64) -> Self {
        Self {
            entries: Vec::new(),
            undo_window_seconds,
        }
    }

    /// Append an event. Pass `None` as the inverse to make it permanent.
    pub fn append(&mut self, event: Event, inverse: Option<Inverse>) {
        tracing::debug!(
            "Event {} at {}: {}",
            event.kind.name(),
            format_clock(event.session_seconds),
            event.kind.describe()
        );
        self.entries.push(Entry { event, inverse });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn events(&self) -> impl Iterator<Item = &Event> {
        self.entries.iter().map(|e| &e.event)
    }

    pub fn last(&self) -> Option<&Event> {
        self.entries.last().map(|e| &e.event)
    }

    /// The newest event, if it can still be undone at `now`
    pub fn undoable(&self, now: u64) -> Option<&Event> {
        self.entries
            .last()
            .filter(|e| e.inverse.is_some() && self.within_window(&e.event, now))
            .map(|e| &e.event)
    }

    /// Remove the newest entry and hand back its inverse
    pub fn pop_for_undo(&mut self, now: u64) -> Result<(Event, Inverse)> {
        let entry = self.entries.last().ok_or(Error::NothingToUndo)?;
        if entry.inverse.is_none() || !self.within_window(&entry.event, now) {
            return Err(Error::UndoExpired(entry.event.kind.name()));
        }

        match self.entries.pop() {
            Some(Entry {
                event,
                inverse: Some(inverse),
            }) => Ok((event, inverse)),
            _ => Err(Error::NothingToUndo),
        }
    }

    fn within_window(&self, event: &Event, now: u64) -> bool {
        now < event.session_seconds + self.undo_window_seconds
    }
}
