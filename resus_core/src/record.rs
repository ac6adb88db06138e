//! Finished-session record handed to a [`RecordSink`](crate::sink::RecordSink).

use crate::event_log::{Event, EventKind};
use crate::types::{Classification, Drug, Mode, Outcome, Rhythm, SessionStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Counters describing the session at a point in time
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SessionSummary {
    pub status: SessionStatus,
    pub total_elapsed_seconds: u64,
    pub cycle_number: u32,
    pub cycle_elapsed_seconds: u32,
    pub mode: Mode,
    pub rhythm: Option<Rhythm>,
    pub classification: Classification,
    pub shock_count: u32,
    pub adrenaline_doses: u32,
    pub amiodarone_mg: f64,
    pub lidocaine_mg_per_kg: f64,
    pub compressor_changes: u32,
    pub pulse_checks: u32,
    pub adrenaline_frequency_minutes: u8,
    pub mechanical_cpr: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct RhythmEntry {
    pub rhythm: Rhythm,
    pub cycle: u32,
    pub session_seconds: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ShockEntry {
    pub shock_number: u32,
    pub energy_joules: u16,
    pub rhythm_before: Option<Rhythm>,
    pub cycle: u32,
    pub session_seconds: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct DoseEntry {
    pub drug: Drug,
    pub dose_number: u32,
    pub dose: f64,
    pub cycle: u32,
    pub session_seconds: u64,
}

/// Everything persisted about one resuscitation
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SessionRecord {
    pub id: Uuid,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: DateTime<Utc>,
    pub outcome: Outcome,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub doctor_notes: String,
    pub summary: SessionSummary,
    pub events: Vec<Event>,
}

impl SessionRecord {
    pub fn duration_seconds(&self) -> u64 {
        self.summary.total_elapsed_seconds
    }

    pub fn total_cycles(&self) -> u32 {
        self.summary.cycle_number
    }

    pub fn rhythm_history(&self) -> Vec<RhythmEntry> {
        self.events
            .iter()
            .filter_map(|e| match e.kind {
                EventKind::Rhythm { rhythm, .. } => Some(RhythmEntry {
                    rhythm,
                    cycle: e.cycle,
                    session_seconds: e.session_seconds,
                }),
                _ => None,
            })
            .collect()
    }

    pub fn shocks(&self) -> Vec<ShockEntry> {
        self.events
            .iter()
            .filter_map(|e| match e.kind {
                EventKind::Shock {
                    number,
                    energy_joules,
                    rhythm,
                } => Some(ShockEntry {
                    shock_number: number,
                    energy_joules,
                    rhythm_before: rhythm,
                    cycle: e.cycle,
                    session_seconds: e.session_seconds,
                }),
                _ => None,
            })
            .collect()
    }

    /// Protocol drug administrations, optionally restricted to one drug
    pub fn medication_doses(&self, drug: Option<Drug>) -> Vec<DoseEntry> {
        self.events
            .iter()
            .filter_map(|e| match e.kind {
                EventKind::Medication {
                    drug: given,
                    dose,
                    dose_number,
                    ..
                } if drug.map_or(true, |d| d == given) => Some(DoseEntry {
                    drug: given,
                    dose_number,
                    dose,
                    cycle: e.cycle,
                    session_seconds: e.session_seconds,
                }),
                _ => None,
            })
            .collect()
    }
}
