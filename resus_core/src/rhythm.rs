//! Rhythm selection, shock counting and crossover bookkeeping.

use crate::types::{Anomaly, Classification, Mode, Rhythm};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Outcome of a rhythm selection attempt
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RhythmChange {
    /// Selection is locked for the rest of the cycle
    Ignored,
    Changed {
        previous: Option<Rhythm>,
        /// Non-shockable (or unset) to shockable transition
        crossover: bool,
    },
}

/// A shock accepted by [`RhythmState::record_shock`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShockRecord {
    pub number: u32,
    pub rhythm: Option<Rhythm>,
    pub anomalies: Vec<Anomaly>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RhythmState {
    pub current: Option<Rhythm>,
    pub classification: Classification,
    pub selection_locked: bool,
    pub shock_count: u32,
    /// Captured on a crossover to shockable after adrenaline was given
    pub shock_count_at_last_crossover: Option<u32>,
    pub last_shock_cycle: Option<u32>,
}

impl RhythmState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the rhythm seen at a rhythm check.
    ///
    /// `adrenaline_doses` is the number of adrenaline doses already given;
    /// the crossover marker is only captured when it is non-zero.
    pub fn select(&mut self, rhythm: Rhythm, adrenaline_doses: u32) -> RhythmChange {
        if self.selection_locked {
            return RhythmChange::Ignored;
        }

        let previous = self.current;
        let was_shockable = self.classification == Classification::Shockable;
        let classification = rhythm.classification();
        let crossover = !was_shockable && classification == Classification::Shockable;

        if crossover {
            self.shock_count_at_last_crossover =
                (adrenaline_doses > 0).then_some(self.shock_count);
        } else if was_shockable && classification == Classification::NonShockable {
            self.shock_count_at_last_crossover = None;
        }

        self.current = Some(rhythm);
        self.classification = classification;
        self.selection_locked = true;

        RhythmChange::Changed {
            previous,
            crossover,
        }
    }

    /// Count a delivered shock in `cycle`.
    ///
    /// Coach mode refuses a second shock in the same cycle. Track mode
    /// accepts it and annotates the anomaly instead.
    pub fn record_shock(&mut self, cycle: u32, mode: Mode) -> Result<ShockRecord> {
        let mut anomalies = Vec::new();

        if self.shocked_in_cycle(cycle) {
            match mode {
                Mode::Coach => return Err(Error::ShockRefused { cycle }),
                Mode::Track => anomalies.push(Anomaly::ExtraShockInCycle),
            }
        }
        if self.classification == Classification::NonShockable {
            anomalies.push(Anomaly::ShockOnNonShockableRhythm);
        }

        self.shock_count += 1;
        self.last_shock_cycle = Some(cycle);

        Ok(ShockRecord {
            number: self.shock_count,
            rhythm: self.current,
            anomalies,
        })
    }

    /// Called when a new cycle begins
    pub fn unlock(&mut self) {
        self.selection_locked = false;
    }

    pub fn shocked_in_cycle(&self, cycle: u32) -> bool {
        self.last_shock_cycle == Some(cycle)
    }
}
