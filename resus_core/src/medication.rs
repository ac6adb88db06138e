//! Medication due engine.
//!
//! Each protocol drug owns a [`MedicationTracker`]. On every tick and after
//! every operator action the engine calls [`MedicationTracker::evaluate`]
//! with a [`DueContext`] snapshot. Evaluation combines the drug's raw trigger
//! predicate with the suppression layers held in [`DueState`]:
//!
//! ```text
//!                 trigger                     administer
//!   Inactive ──────────────► Due ─────────────────────────► Inactive
//!      ▲                      │ dismiss          │ snooze
//!      │                      ▼                  ▼
//!      │               Dismissed{since}     Snoozed{until}
//!      │     coach: trigger recurs │            │ now >= until
//!      └───────────────────────────┴────────────┘
//! ```
//!
//! Track mode never re-arms a dismissal; only administering clears it.

use crate::formulary::{formulary, DrugProtocol};
use crate::types::{Classification, DoseUnit, Drug, Mode};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Adrenaline first dose on a non-shockable rhythm
pub const ADRENALINE_FIRST_DOSE_SECONDS: u64 = 10;
/// Adrenaline first dose on a shockable rhythm
pub const ADRENALINE_FIRST_DOSE_SHOCKS: u32 = 2;
/// Shocks required in a new shockable streak after a crossover
pub const CROSSOVER_SHOCKS: u32 = 2;

pub const AMIODARONE_LOADING_SHOCKS: u32 = 3;
pub const AMIODARONE_SUPPLEMENT_SHOCK_GAP: u32 = 2;
pub const AMIODARONE_LOADING_MG: f64 = 300.0;

pub const LIDOCAINE_INTERVAL_SECONDS: u64 = 360;
pub const LIDOCAINE_FIRST_DOSE_SHOCKS: u32 = 8;
pub const LIDOCAINE_SECOND_DOSE_SHOCKS: u32 = 11;
pub const LIDOCAINE_REPEAT_SHOCK_GAP: u32 = 3;

/// Further shocks that re-arm a coach-mode dismissal of a shock-anchored drug
pub const DISMISS_REARM_SHOCKS: u32 = 2;

/// Tolerance for floating-point dose arithmetic
const DOSE_EPSILON: f64 = 1e-6;

/// Suppression state of one drug
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum DueState {
    #[default]
    Inactive,
    Due,
    Dismissed {
        since_seconds: u64,
        shock_count: u32,
    },
    Snoozed {
        until_seconds: u64,
    },
}

/// Everything the due predicates read, captured once per evaluation
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DueContext {
    pub now: u64,
    pub mode: Mode,
    pub classification: Classification,
    pub shock_count: u32,
    pub crossover_shock_count: Option<u32>,
    pub adrenaline_interval_seconds: u64,
    /// When amiodarone reached its ceiling
    pub amiodarone_complete_at: Option<u64>,
}

/// What a trigger condition is measured against
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Anchor {
    Time { interval_seconds: u64 },
    Shocks,
}

#[derive(Clone, Copy, Debug)]
struct Trigger {
    met: bool,
    anchor: Anchor,
}

/// Dosing history and due state of a single drug
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct MedicationTracker {
    pub drug: Drug,
    pub cumulative_dose: f64,
    pub last_administered_at: Option<u64>,
    pub dose_sequence: u32,
    pub due_state: DueState,
    /// Shock count at the first administration
    pub first_dose_shock_count: Option<u32>,
    /// Session second at which the ceiling was reached
    pub ceiling_reached_at: Option<u64>,
}

impl MedicationTracker {
    pub fn new(drug: Drug) -> Self {
        Self {
            drug,
            cumulative_dose: 0.0,
            last_administered_at: None,
            dose_sequence: 0,
            due_state: DueState::Inactive,
            first_dose_shock_count: None,
            ceiling_reached_at: None,
        }
    }

    pub fn protocol(&self) -> &'static DrugProtocol {
        formulary().protocol(self.drug)
    }

    pub fn unit(&self) -> DoseUnit {
        self.protocol().unit
    }

    pub fn is_due(&self) -> bool {
        self.due_state == DueState::Due
    }

    pub fn is_dismissed(&self) -> bool {
        matches!(self.due_state, DueState::Dismissed { .. })
    }

    pub fn snoozed_until(&self) -> Option<u64> {
        match self.due_state {
            DueState::Snoozed { until_seconds } => Some(until_seconds),
            _ => None,
        }
    }

    /// Headroom left below the ceiling, `None` when unbounded
    pub fn remaining(&self) -> Option<f64> {
        self.protocol()
            .ceiling
            .map(|ceiling| (ceiling - self.cumulative_dose).max(0.0))
    }

    pub fn ceiling_reached(&self) -> bool {
        self.remaining().is_some_and(|r| r <= DOSE_EPSILON)
    }

    /// The dose the protocol calls for next, capped by the headroom
    pub fn next_dose(&self) -> Option<f64> {
        if self.ceiling_reached() {
            return None;
        }
        let standard = match self.drug {
            // A split loading dose is topped up before the supplement
            Drug::Amiodarone if self.cumulative_dose + DOSE_EPSILON < AMIODARONE_LOADING_MG => {
                AMIODARONE_LOADING_MG - self.cumulative_dose
            }
            Drug::Amiodarone => self.protocol().standard_dose(1),
            _ => self.protocol().standard_dose(self.dose_sequence),
        };
        Some(match self.remaining() {
            Some(remaining) => standard.min(remaining),
            None => standard,
        })
    }

    /// Re-evaluate due-ness. Returns true if the state changed.
    pub fn evaluate(&mut self, ctx: &DueContext) -> bool {
        let trigger = self.trigger(ctx);
        let next = match self.due_state {
            DueState::Snoozed { until_seconds } if ctx.now < until_seconds => self.due_state,
            DueState::Dismissed {
                since_seconds,
                shock_count,
            } => {
                if trigger.met
                    && ctx.mode == Mode::Coach
                    && rearmed(trigger.anchor, since_seconds, shock_count, ctx)
                {
                    DueState::Due
                } else {
                    self.due_state
                }
            }
            _ if trigger.met => DueState::Due,
            _ => DueState::Inactive,
        };

        let changed = next != self.due_state;
        if changed {
            tracing::debug!(
                "{} due state {:?} -> {:?} at {}s",
                self.drug,
                self.due_state,
                next,
                ctx.now
            );
            self.due_state = next;
        }
        changed
    }

    pub fn dismiss(&mut self, now: u64, shock_count: u32) {
        self.due_state = DueState::Dismissed {
            since_seconds: now,
            shock_count,
        };
    }

    /// Suppress for `duration` seconds. Replaces any dismissal.
    pub fn snooze(&mut self, now: u64, duration: u64) -> u64 {
        let until_seconds = now + duration;
        self.due_state = DueState::Snoozed { until_seconds };
        until_seconds
    }

    /// Record an administered dose.
    ///
    /// Refuses a non-positive dose, anything but the unit dose of a
    /// fixed-dose drug, or a dose past the remaining headroom. The tracker
    /// is untouched on error.
    pub fn administer(&mut self, dose: f64, now: u64, shock_count: u32) -> Result<()> {
        let protocol = self.protocol();
        let off_unit_dose = protocol.fixed_dose
            && (dose - protocol.standard_dose(0)).abs() > DOSE_EPSILON;
        if !dose.is_finite() || dose <= 0.0 || off_unit_dose {
            return Err(Error::InvalidDose {
                drug: self.drug,
                dose,
            });
        }
        if let Some(remaining) = self.remaining() {
            if dose > remaining + DOSE_EPSILON {
                return Err(Error::DoseCeiling {
                    drug: self.drug,
                    requested: dose,
                    remaining,
                    unit: self.unit(),
                });
            }
        }

        self.cumulative_dose += dose;
        if let Some(ceiling) = self.protocol().ceiling {
            self.cumulative_dose = self.cumulative_dose.min(ceiling);
        }
        self.dose_sequence += 1;
        self.last_administered_at = Some(now);
        self.first_dose_shock_count.get_or_insert(shock_count);
        self.due_state = DueState::Inactive;
        if self.ceiling_reached() && self.ceiling_reached_at.is_none() {
            self.ceiling_reached_at = Some(now);
        }
        Ok(())
    }

    fn trigger(&self, ctx: &DueContext) -> Trigger {
        match self.drug {
            Drug::Adrenaline => self.adrenaline_trigger(ctx),
            Drug::Amiodarone => self.amiodarone_trigger(ctx),
            Drug::Lidocaine => self.lidocaine_trigger(ctx),
        }
    }

    fn since_last_dose(&self, now: u64) -> Option<u64> {
        self.last_administered_at.map(|t| now.saturating_sub(t))
    }

    fn adrenaline_trigger(&self, ctx: &DueContext) -> Trigger {
        let interval = ctx.adrenaline_interval_seconds;
        let timed = Anchor::Time {
            interval_seconds: interval,
        };
        let interval_elapsed = self.since_last_dose(ctx.now).is_some_and(|s| s >= interval);

        match ctx.classification {
            Classification::Unset => Trigger {
                met: false,
                anchor: timed,
            },
            Classification::NonShockable if self.dose_sequence == 0 => Trigger {
                met: ctx.now >= ADRENALINE_FIRST_DOSE_SECONDS,
                anchor: timed,
            },
            Classification::NonShockable => Trigger {
                met: interval_elapsed,
                anchor: timed,
            },
            Classification::Shockable if self.dose_sequence == 0 => Trigger {
                met: ctx.shock_count >= ADRENALINE_FIRST_DOSE_SHOCKS,
                anchor: Anchor::Shocks,
            },
            Classification::Shockable => {
                let streak_ok = ctx
                    .crossover_shock_count
                    .map_or(true, |at| ctx.shock_count.saturating_sub(at) >= CROSSOVER_SHOCKS);
                Trigger {
                    met: streak_ok && interval_elapsed,
                    anchor: timed,
                }
            }
        }
    }

    fn amiodarone_trigger(&self, ctx: &DueContext) -> Trigger {
        let met = if ctx.classification != Classification::Shockable || self.ceiling_reached() {
            false
        } else if self.cumulative_dose + DOSE_EPSILON < AMIODARONE_LOADING_MG {
            ctx.shock_count >= AMIODARONE_LOADING_SHOCKS
        } else {
            let first = self
                .first_dose_shock_count
                .unwrap_or(AMIODARONE_LOADING_SHOCKS);
            ctx.shock_count >= first + AMIODARONE_SUPPLEMENT_SHOCK_GAP
        };
        Trigger {
            met,
            anchor: Anchor::Shocks,
        }
    }

    fn lidocaine_trigger(&self, ctx: &DueContext) -> Trigger {
        let eligible = ctx.classification == Classification::Shockable && !self.ceiling_reached();

        match ctx.mode {
            Mode::Coach => {
                let anchor_at = if self.dose_sequence == 0 {
                    ctx.amiodarone_complete_at
                } else {
                    self.last_administered_at
                };
                Trigger {
                    met: eligible
                        && anchor_at.is_some_and(|at| ctx.now >= at + LIDOCAINE_INTERVAL_SECONDS),
                    anchor: Anchor::Time {
                        interval_seconds: LIDOCAINE_INTERVAL_SECONDS,
                    },
                }
            }
            Mode::Track => Trigger {
                met: eligible && ctx.shock_count >= lidocaine_shock_threshold(self.dose_sequence),
                anchor: Anchor::Shocks,
            },
        }
    }
}

/// Shock count at which the n-th lidocaine dose (0-based) falls due in
/// track mode
pub fn lidocaine_shock_threshold(sequence: u32) -> u32 {
    match sequence {
        0 => LIDOCAINE_FIRST_DOSE_SHOCKS,
        n => LIDOCAINE_SECOND_DOSE_SHOCKS + LIDOCAINE_REPEAT_SHOCK_GAP * (n - 1),
    }
}

/// Shock count at which the amiodarone supplement falls due
pub fn amiodarone_supplement_threshold(tracker: &MedicationTracker) -> u32 {
    tracker
        .first_dose_shock_count
        .unwrap_or(AMIODARONE_LOADING_SHOCKS)
        + AMIODARONE_SUPPLEMENT_SHOCK_GAP
}

fn rearmed(anchor: Anchor, since_seconds: u64, shocks_at_dismiss: u32, ctx: &DueContext) -> bool {
    match anchor {
        Anchor::Time { interval_seconds } => ctx.now >= since_seconds + interval_seconds,
        Anchor::Shocks => ctx.shock_count >= shocks_at_dismiss + DISMISS_REARM_SHOCKS,
    }
}

/// The three protocol drug trackers
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Medications {
    pub adrenaline: MedicationTracker,
    pub amiodarone: MedicationTracker,
    pub lidocaine: MedicationTracker,
}

impl Default for Medications {
    fn default() -> Self {
        Self::new()
    }
}

impl Medications {
    pub fn new() -> Self {
        Self {
            adrenaline: MedicationTracker::new(Drug::Adrenaline),
            amiodarone: MedicationTracker::new(Drug::Amiodarone),
            lidocaine: MedicationTracker::new(Drug::Lidocaine),
        }
    }

    pub fn get(&self, drug: Drug) -> &MedicationTracker {
        match drug {
            Drug::Adrenaline => &self.adrenaline,
            Drug::Amiodarone => &self.amiodarone,
            Drug::Lidocaine => &self.lidocaine,
        }
    }

    pub fn get_mut(&mut self, drug: Drug) -> &mut MedicationTracker {
        match drug {
            Drug::Adrenaline => &mut self.adrenaline,
            Drug::Amiodarone => &mut self.amiodarone,
            Drug::Lidocaine => &mut self.lidocaine,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &MedicationTracker> {
        [&self.adrenaline, &self.amiodarone, &self.lidocaine].into_iter()
    }

    /// Evaluate every drug. Returns the drugs that just became due.
    pub fn evaluate(&mut self, ctx: &DueContext) -> Vec<Drug> {
        let mut newly_due = Vec::new();
        for drug in Drug::ALL {
            let tracker = self.get_mut(drug);
            if tracker.evaluate(ctx) && tracker.is_due() {
                newly_due.push(drug);
            }
        }
        newly_due
    }
}
