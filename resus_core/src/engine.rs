//! Resuscitation engine.
//!
//! [`Engine`] owns the whole session: clock, rhythm tracker, medication
//! trackers, event log and audio queue. Drive it with [`Engine::tick`] once
//! per second and feed operator input through [`Engine::apply`]. Both run to
//! completion synchronously; afterwards due states, banners and the audio
//! queue reflect the new state.
//!
//! Refused actions return a validation [`Error`] and leave the engine
//! untouched.

use crate::alerts::{project, Banner, ProjectionInput};
use crate::audio::{AlertSound, AudioQueue, DEFAULT_MIN_GAP_MS};
use crate::event_log::{Event, EventKind, EventLog, Inverse};
use crate::formulary::{formulary, SHOCK_ENERGY_OPTIONS};
use crate::medication::{DueContext, MedicationTracker, Medications};
use crate::record::{SessionRecord, SessionSummary};
use crate::rhythm::{RhythmChange, RhythmState};
use crate::session::{format_clock, Session, Tick, CYCLE_DURATION_SECONDS};
use crate::types::{AdrenalineFrequency, Anomaly, Drug, Mode, Outcome, Procedure, Rhythm, SessionStatus};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const DEFAULT_SNOOZE_SECONDS: u64 = 90;
pub const DEFAULT_UNDO_WINDOW_SECONDS: u64 = 10;
pub const MAX_NOTES_CHARS: usize = 200;

/// Tunable protocol parameters, usually built from [`Config`](crate::Config)
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ProtocolSettings {
    pub default_mode: Mode,
    pub adrenaline_frequency: AdrenalineFrequency,
    pub snooze_seconds: u64,
    pub undo_window_seconds: u64,
    pub audio_gap_ms: u64,
}

impl Default for ProtocolSettings {
    fn default() -> Self {
        Self {
            default_mode: Mode::Coach,
            adrenaline_frequency: AdrenalineFrequency::default(),
            snooze_seconds: DEFAULT_SNOOZE_SECONDS,
            undo_window_seconds: DEFAULT_UNDO_WINDOW_SECONDS,
            audio_gap_ms: DEFAULT_MIN_GAP_MS,
        }
    }
}

/// Operator input
#[derive(Clone, Debug, PartialEq)]
pub enum Action {
    Start,
    Pause,
    ConfirmPulseCheck,
    SelectRhythm(Rhythm),
    ConfirmShock {
        energy_joules: u16,
    },
    /// `dose: None` gives the protocol's next standard dose
    Administer {
        drug: Drug,
        dose: Option<f64>,
    },
    Dismiss(Drug),
    Snooze(Drug),
    SetMode {
        mode: Mode,
        confirmed: bool,
    },
    SetAdrenalineFrequency(u8),
    SyncCycle,
    UndoLast,
    ConfirmCompressorChange,
    ToggleMechanicalCpr,
    RecordMedication {
        medication: String,
        dosage: String,
    },
    RecordProcedure(Procedure),
    SetNotes(String),
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Action::Start => "start",
            Action::Pause => "pause",
            Action::ConfirmPulseCheck => "pulse check",
            Action::SelectRhythm(_) => "rhythm",
            Action::ConfirmShock { .. } => "shock",
            Action::Administer { .. } => "administer",
            Action::Dismiss(_) => "dismiss",
            Action::Snooze(_) => "snooze",
            Action::SetMode { .. } => "mode",
            Action::SetAdrenalineFrequency(_) => "frequency",
            Action::SyncCycle => "sync",
            Action::UndoLast => "undo",
            Action::ConfirmCompressorChange => "compressor",
            Action::ToggleMechanicalCpr => "lucas",
            Action::RecordMedication { .. } => "medication",
            Action::RecordProcedure(_) => "procedure",
            Action::SetNotes(_) => "notes",
        }
    }
}

/// What an accepted action did
#[derive(Clone, Debug, PartialEq)]
pub enum ActionOutcome {
    /// An event was appended to the log
    Recorded { annotations: Vec<Anomaly> },
    /// State changed without a log entry
    Updated,
    /// Accepted but had no effect
    Ignored,
    /// The newest log entry was reverted
    Undone(EventKind),
}

impl ActionOutcome {
    fn recorded() -> Self {
        ActionOutcome::Recorded {
            annotations: Vec::new(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Engine {
    id: Uuid,
    settings: ProtocolSettings,
    session: Session,
    rhythm: RhythmState,
    medications: Medications,
    adrenaline_frequency: AdrenalineFrequency,
    #[serde(default)]
    doctor_notes: String,
    log: EventLog,
    audio: AudioQueue,
    outcome: Option<Outcome>,
    /// Derived on every refresh
    #[serde(skip)]
    banners: Vec<Banner>,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(ProtocolSettings::default())
    }
}

impl Engine {
    pub fn new(settings: ProtocolSettings) -> Self {
        let mut engine = Self {
            id: Uuid::new_v4(),
            session: Session::new(settings.default_mode),
            rhythm: RhythmState::new(),
            medications: Medications::new(),
            adrenaline_frequency: settings.adrenaline_frequency,
            doctor_notes: String::new(),
            log: EventLog::new(settings.undo_window_seconds),
            audio: AudioQueue::new(settings.audio_gap_ms),
            outcome: None,
            banners: Vec::new(),
            settings,
        };
        engine.refresh();
        engine
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn settings(&self) -> &ProtocolSettings {
        &self.settings
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn rhythm(&self) -> &RhythmState {
        &self.rhythm
    }

    pub fn medications(&self) -> &Medications {
        &self.medications
    }

    pub fn medication(&self, drug: Drug) -> &MedicationTracker {
        self.medications.get(drug)
    }

    pub fn adrenaline_frequency(&self) -> AdrenalineFrequency {
        self.adrenaline_frequency
    }

    pub fn doctor_notes(&self) -> &str {
        &self.doctor_notes
    }

    pub fn outcome(&self) -> Option<Outcome> {
        self.outcome
    }

    pub fn banners(&self) -> &[Banner] {
        &self.banners
    }

    pub fn events(&self) -> impl Iterator<Item = &Event> {
        self.log.events()
    }

    pub fn audio(&self) -> &AudioQueue {
        &self.audio
    }

    pub fn last_event(&self) -> Option<&Event> {
        self.log.last()
    }

    /// The newest event if it can still be undone
    pub fn undoable(&self) -> Option<&Event> {
        self.log.undoable(self.session.total_elapsed_seconds)
    }

    /// Next dose the protocol calls for, `None` once the ceiling is reached
    pub fn default_dose(&self, drug: Drug) -> Option<f64> {
        self.medications.get(drug).next_dose()
    }

    /// Advance the clock by one second
    pub fn tick(&mut self) -> Tick {
        let tick = self.session.tick();
        if let Tick::Advanced { cycle_completed } = tick {
            if cycle_completed {
                tracing::info!(
                    "Cycle {} complete at {}, awaiting pulse check",
                    self.session.cycle_number,
                    format_clock(self.session.total_elapsed_seconds)
                );
            }
            self.refresh();
        }
        tick
    }

    /// Tick `seconds` times
    pub fn advance(&mut self, seconds: u64) {
        for _ in 0..seconds {
            self.tick();
        }
    }

    pub fn apply(&mut self, action: Action) -> Result<ActionOutcome> {
        self.apply_at(action, Utc::now())
    }

    /// Apply an action stamped with the given wall-clock time
    pub fn apply_at(&mut self, action: Action, wall: DateTime<Utc>) -> Result<ActionOutcome> {
        let name = action.name();
        let result = self.dispatch(action, wall);
        match &result {
            Ok(_) => self.refresh(),
            Err(e) if e.is_validation() => tracing::warn!("Refused {}: {}", name, e),
            Err(e) => tracing::error!("Failed to apply {}: {}", name, e),
        }
        result
    }

    fn dispatch(&mut self, action: Action, wall: DateTime<Utc>) -> Result<ActionOutcome> {
        match action {
            Action::Start => self.start(wall),
            Action::Pause => Ok(if self.session.pause() {
                tracing::info!(
                    "Session paused at {}",
                    format_clock(self.session.total_elapsed_seconds)
                );
                ActionOutcome::Updated
            } else {
                ActionOutcome::Ignored
            }),
            Action::ConfirmPulseCheck => self.confirm_pulse_check(wall),
            Action::SelectRhythm(rhythm) => self.select_rhythm(rhythm, wall),
            Action::ConfirmShock { energy_joules } => self.confirm_shock(energy_joules, wall),
            Action::Administer { drug, dose } => self.administer(drug, dose, wall),
            Action::Dismiss(drug) => self.dismiss(drug, wall),
            Action::Snooze(drug) => self.snooze(drug, wall),
            Action::SetMode { mode, confirmed } => self.set_mode(mode, confirmed, wall),
            Action::SetAdrenalineFrequency(minutes) => self.set_frequency(minutes, wall),
            Action::SyncCycle => self.sync_cycle(wall),
            Action::UndoLast => self.undo_last(),
            Action::ConfirmCompressorChange => self.confirm_compressor_change(wall),
            Action::ToggleMechanicalCpr => self.toggle_mechanical_cpr(wall),
            Action::RecordMedication { medication, dosage } => {
                self.record_medication(medication, dosage, wall)
            }
            Action::RecordProcedure(procedure) => self.record_procedure(procedure, wall),
            Action::SetNotes(notes) => self.set_notes(notes),
        }
    }

    fn start(&mut self, wall: DateTime<Utc>) -> Result<ActionOutcome> {
        let was = self.session.status;
        if was == SessionStatus::Running {
            return Ok(ActionOutcome::Ignored);
        }
        if self.session.begin(wall)? {
            tracing::info!("Session {} started", self.id);
            Ok(self.record(EventKind::Start, wall, None))
        } else {
            tracing::info!(
                "Session resumed at {}",
                format_clock(self.session.total_elapsed_seconds)
            );
            Ok(ActionOutcome::Updated)
        }
    }

    fn confirm_pulse_check(&mut self, wall: DateTime<Utc>) -> Result<ActionOutcome> {
        self.session.ensure_active()?;
        let inverse = self.cycle_inverse();
        let synced = self.session.cycle_synced;
        let next_cycle = (!synced).then_some(self.session.cycle_number + 1);
        let event = self.event(EventKind::PulseCheck { next_cycle }, wall);

        self.session.pulse_checks += 1;
        self.session.last_pulse_check_cycle = Some(self.session.cycle_number);
        self.rhythm.unlock();
        if synced {
            self.session.cycle_synced = false;
        } else {
            self.session.advance_cycle();
            tracing::info!("Cycle {} started", self.session.cycle_number);
        }

        self.log.append(event, Some(inverse));
        Ok(ActionOutcome::recorded())
    }

    fn sync_cycle(&mut self, wall: DateTime<Utc>) -> Result<ActionOutcome> {
        self.session.ensure_active()?;
        let inverse = self.cycle_inverse();
        let event = self.event(
            EventKind::CycleSync {
                new_cycle: self.session.cycle_number + 1,
            },
            wall,
        );

        self.session.advance_cycle();
        self.session.cycle_synced = true;
        self.rhythm.unlock();
        tracing::info!("Cycle synced, cycle {} started", self.session.cycle_number);

        self.log.append(event, Some(inverse));
        Ok(ActionOutcome::recorded())
    }

    fn select_rhythm(&mut self, rhythm: Rhythm, wall: DateTime<Utc>) -> Result<ActionOutcome> {
        self.session.ensure_active()?;
        let previous_state = self.rhythm.clone();

        match self
            .rhythm
            .select(rhythm, self.medications.adrenaline.dose_sequence)
        {
            RhythmChange::Ignored => {
                tracing::debug!(
                    "Rhythm selection locked in cycle {}, ignoring {}",
                    self.session.cycle_number,
                    rhythm
                );
                Ok(ActionOutcome::Ignored)
            }
            RhythmChange::Changed {
                previous,
                crossover,
            } => {
                if crossover {
                    tracing::info!("Crossover to shockable rhythm {}", rhythm);
                }
                Ok(self.record(
                    EventKind::Rhythm { rhythm, previous },
                    wall,
                    Some(Inverse::Rhythm {
                        previous: previous_state,
                    }),
                ))
            }
        }
    }

    fn confirm_shock(&mut self, energy_joules: u16, wall: DateTime<Utc>) -> Result<ActionOutcome> {
        self.session.ensure_active()?;
        if energy_joules == 0 {
            return Err(Error::InvalidEnergy(energy_joules));
        }
        if !SHOCK_ENERGY_OPTIONS.contains(&energy_joules) {
            tracing::debug!("Non-standard shock energy {} J", energy_joules);
        }

        let previous = self.rhythm.clone();
        let shock = self
            .rhythm
            .record_shock(self.session.cycle_number, self.session.mode)?;
        for anomaly in &shock.anomalies {
            tracing::warn!("Shock #{} annotated: {}", shock.number, anomaly);
        }

        let mut event = self.event(
            EventKind::Shock {
                number: shock.number,
                energy_joules,
                rhythm: shock.rhythm,
            },
            wall,
        );
        event.annotations = shock.anomalies.clone();
        self.log.append(event, Some(Inverse::Rhythm { previous }));

        Ok(ActionOutcome::Recorded {
            annotations: shock.anomalies,
        })
    }

    fn administer(
        &mut self,
        drug: Drug,
        dose: Option<f64>,
        wall: DateTime<Utc>,
    ) -> Result<ActionOutcome> {
        self.session.ensure_active()?;
        let now = self.session.total_elapsed_seconds;
        let shocks = self.rhythm.shock_count;

        let tracker = self.medications.get(drug);
        let dose = match dose.or_else(|| tracker.next_dose()) {
            Some(dose) => dose,
            None => {
                return Err(Error::DoseCeiling {
                    drug,
                    requested: tracker.protocol().standard_dose(tracker.dose_sequence),
                    remaining: 0.0,
                    unit: tracker.unit(),
                })
            }
        };
        let previous = Box::new(tracker.clone());

        let tracker = self.medications.get_mut(drug);
        tracker.administer(dose, now, shocks)?;
        let kind = EventKind::Medication {
            drug,
            dose,
            unit: tracker.unit(),
            dose_number: tracker.dose_sequence,
            cumulative: tracker.cumulative_dose,
        };
        if tracker.ceiling_reached() {
            tracing::info!(
                "{} ceiling reached ({} {})",
                drug,
                tracker.cumulative_dose,
                tracker.unit()
            );
        }

        Ok(self.record(kind, wall, Some(Inverse::Medication { previous })))
    }

    fn dismiss(&mut self, drug: Drug, wall: DateTime<Utc>) -> Result<ActionOutcome> {
        self.session.ensure_active()?;
        let tracker = self.medications.get(drug);
        if !tracker.is_due() {
            return Ok(ActionOutcome::Ignored);
        }
        let previous = Box::new(tracker.clone());

        self.medications
            .get_mut(drug)
            .dismiss(self.session.total_elapsed_seconds, self.rhythm.shock_count);
        Ok(self.record(
            EventKind::Dismiss { drug },
            wall,
            Some(Inverse::Medication { previous }),
        ))
    }

    /// Only a due or already suppressed reminder can be snoozed
    fn snooze(&mut self, drug: Drug, wall: DateTime<Utc>) -> Result<ActionOutcome> {
        self.session.ensure_active()?;
        let tracker = self.medications.get(drug);
        if !(tracker.is_due() || tracker.is_dismissed() || tracker.snoozed_until().is_some()) {
            return Ok(ActionOutcome::Ignored);
        }
        let previous = Box::new(tracker.clone());

        let until_seconds = self
            .medications
            .get_mut(drug)
            .snooze(self.session.total_elapsed_seconds, self.settings.snooze_seconds);
        Ok(self.record(
            EventKind::Snooze {
                drug,
                until_seconds,
            },
            wall,
            Some(Inverse::Medication { previous }),
        ))
    }

    fn set_mode(&mut self, mode: Mode, confirmed: bool, wall: DateTime<Utc>) -> Result<ActionOutcome> {
        self.ensure_not_ended()?;
        if mode == self.session.mode {
            return Ok(ActionOutcome::Ignored);
        }
        if !confirmed {
            return Err(Error::ConfirmationRequired(mode));
        }

        let previous = self.session.mode;
        self.session.mode = mode;
        tracing::info!("Mode changed from {} to {}", previous, mode);

        if self.session.is_active() {
            Ok(self.record(EventKind::Mode { mode }, wall, Some(Inverse::Mode { previous })))
        } else {
            Ok(ActionOutcome::Updated)
        }
    }

    fn set_frequency(&mut self, minutes: u8, wall: DateTime<Utc>) -> Result<ActionOutcome> {
        self.ensure_not_ended()?;
        let frequency = AdrenalineFrequency::try_from(minutes)?;
        if frequency == self.adrenaline_frequency {
            return Ok(ActionOutcome::Ignored);
        }

        let previous = self.adrenaline_frequency;
        self.adrenaline_frequency = frequency;
        tracing::info!("Adrenaline frequency set to every {} min", minutes);

        if self.session.is_active() {
            Ok(self.record(
                EventKind::AdrenalineFrequency { minutes },
                wall,
                Some(Inverse::AdrenalineFrequency { previous }),
            ))
        } else {
            Ok(ActionOutcome::Updated)
        }
    }

    fn undo_last(&mut self) -> Result<ActionOutcome> {
        self.ensure_not_ended()?;
        let now = self.session.total_elapsed_seconds;
        let (event, inverse) = self.log.pop_for_undo(now)?;

        match inverse {
            Inverse::Medication { previous } => {
                let previous = *previous;
                let drug = previous.drug;
                *self.medications.get_mut(drug) = previous;
            }
            Inverse::Rhythm { previous } => self.rhythm = previous,
            Inverse::Cycle {
                cycle_number,
                cycle_elapsed_seconds,
                cycle_synced,
                pulse_checks,
                last_pulse_check_cycle,
                rhythm,
            } => {
                // The old cycle kept running while the undone one did
                let since = now.saturating_sub(event.session_seconds);
                let elapsed = u64::from(cycle_elapsed_seconds) + since;
                self.session.cycle_number = cycle_number;
                self.session.cycle_elapsed_seconds =
                    elapsed.min(u64::from(CYCLE_DURATION_SECONDS)) as u32;
                self.session.cycle_synced = cycle_synced;
                self.session.pulse_checks = pulse_checks;
                self.session.last_pulse_check_cycle = last_pulse_check_cycle;
                self.rhythm = rhythm;
            }
            Inverse::Mode { previous } => self.session.mode = previous,
            Inverse::AdrenalineFrequency { previous } => self.adrenaline_frequency = previous,
            Inverse::Compressor {
                changes,
                mechanical_cpr,
            } => {
                self.session.compressor_changes = changes;
                self.session.mechanical_cpr = mechanical_cpr;
            }
            Inverse::LogOnly => {}
        }

        tracing::info!("Undid: {}", event.kind.describe());
        Ok(ActionOutcome::Undone(event.kind))
    }

    fn confirm_compressor_change(&mut self, wall: DateTime<Utc>) -> Result<ActionOutcome> {
        self.session.ensure_active()?;
        let inverse = Inverse::Compressor {
            changes: self.session.compressor_changes,
            mechanical_cpr: self.session.mechanical_cpr,
        };
        let resumed_manual = self.session.mechanical_cpr;

        self.session.compressor_changes += 1;
        self.session.mechanical_cpr = false;
        Ok(self.record(
            EventKind::CompressorChange { resumed_manual },
            wall,
            Some(inverse),
        ))
    }

    fn toggle_mechanical_cpr(&mut self, wall: DateTime<Utc>) -> Result<ActionOutcome> {
        self.session.ensure_active()?;
        let inverse = Inverse::Compressor {
            changes: self.session.compressor_changes,
            mechanical_cpr: self.session.mechanical_cpr,
        };
        let active = !self.session.mechanical_cpr;

        self.session.mechanical_cpr = active;
        tracing::info!(
            "Mechanical CPR {}",
            if active { "activated" } else { "deactivated" }
        );
        Ok(self.record(EventKind::MechanicalCpr { active }, wall, Some(inverse)))
    }

    fn record_medication(
        &mut self,
        medication: String,
        dosage: String,
        wall: DateTime<Utc>,
    ) -> Result<ActionOutcome> {
        self.session.ensure_active()?;
        let medication = medication.trim();
        if medication.is_empty() {
            return Err(Error::Parse("medication name is empty".into()));
        }
        let medication = formulary()
            .common_medication(medication)
            .map(|m| m.full.to_string())
            .unwrap_or_else(|| medication.to_string());

        Ok(self.record(
            EventKind::Discretionary {
                medication,
                dosage: dosage.trim().to_string(),
            },
            wall,
            Some(Inverse::LogOnly),
        ))
    }

    fn record_procedure(&mut self, procedure: Procedure, wall: DateTime<Utc>) -> Result<ActionOutcome> {
        self.session.ensure_active()?;
        let already = self.log.events().any(|e| {
            matches!(e.kind, EventKind::Procedure { procedure: p } if p == procedure)
        });
        if already && !procedure.repeatable() {
            return Err(Error::ProcedureAlreadyRecorded(procedure));
        }

        Ok(self.record(
            EventKind::Procedure { procedure },
            wall,
            Some(Inverse::LogOnly),
        ))
    }

    fn set_notes(&mut self, notes: String) -> Result<ActionOutcome> {
        self.ensure_not_ended()?;
        if notes.chars().count() > MAX_NOTES_CHARS {
            return Err(Error::NotesTooLong {
                max: MAX_NOTES_CHARS,
            });
        }
        self.doctor_notes = notes;
        Ok(ActionOutcome::Updated)
    }

    /// End the session and build its record
    pub fn end(&mut self, outcome: Outcome, notes: impl Into<String>) -> Result<SessionRecord> {
        self.end_at(outcome, notes, Utc::now())
    }

    pub fn end_at(
        &mut self,
        outcome: Outcome,
        notes: impl Into<String>,
        wall: DateTime<Utc>,
    ) -> Result<SessionRecord> {
        self.session.ensure_active()?;

        self.record(EventKind::End { outcome }, wall, None);
        self.session.finish(wall);
        self.outcome = Some(outcome);
        self.refresh();
        tracing::info!(
            "Session {} ended after {}: {}",
            self.id,
            format_clock(self.session.total_elapsed_seconds),
            outcome
        );

        Ok(SessionRecord {
            id: self.id,
            started_at: self.session.started_at,
            ended_at: wall,
            outcome,
            notes: notes.into(),
            doctor_notes: self.doctor_notes.clone(),
            summary: self.summary(),
            events: self.log.events().cloned().collect(),
        })
    }

    /// Discard everything and return to an idle session
    pub fn reset(&mut self) {
        tracing::info!("Session {} reset", self.id);
        *self = Engine::new(self.settings.clone());
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            status: self.session.status,
            total_elapsed_seconds: self.session.total_elapsed_seconds,
            cycle_number: self.session.cycle_number,
            cycle_elapsed_seconds: self.session.cycle_elapsed_seconds,
            mode: self.session.mode,
            rhythm: self.rhythm.current,
            classification: self.rhythm.classification,
            shock_count: self.rhythm.shock_count,
            adrenaline_doses: self.medications.adrenaline.dose_sequence,
            amiodarone_mg: self.medications.amiodarone.cumulative_dose,
            lidocaine_mg_per_kg: self.medications.lidocaine.cumulative_dose,
            compressor_changes: self.session.compressor_changes,
            pulse_checks: self.session.pulse_checks,
            adrenaline_frequency_minutes: self.adrenaline_frequency.minutes(),
            mechanical_cpr: self.session.mechanical_cpr,
        }
    }

    /// Start the next queued cue, if playback is allowed at `now_ms`
    pub fn next_sound(&mut self, now_ms: u64) -> Option<AlertSound> {
        let sound = self.audio.next(now_ms);
        if let Some(sound) = sound {
            tracing::debug!("Playing {} cue", sound);
        }
        sound
    }

    /// Signal that the playing cue has finished
    pub fn sound_finished(&mut self, now_ms: u64) -> Option<AlertSound> {
        self.audio.finished(now_ms)
    }

    /// Re-evaluate due states, then rebuild banners and feed the audio queue
    pub(crate) fn refresh(&mut self) {
        if self.session.is_active() {
            let ctx = DueContext {
                now: self.session.total_elapsed_seconds,
                mode: self.session.mode,
                classification: self.rhythm.classification,
                shock_count: self.rhythm.shock_count,
                crossover_shock_count: self.rhythm.shock_count_at_last_crossover,
                adrenaline_interval_seconds: self.adrenaline_frequency.interval_seconds(),
                amiodarone_complete_at: self.medications.amiodarone.ceiling_reached_at,
            };
            for drug in self.medications.evaluate(&ctx) {
                tracing::info!("{} due at {}", drug, format_clock(ctx.now));
            }
        }

        self.banners = project(&ProjectionInput {
            session: &self.session,
            medications: &self.medications,
            adrenaline_frequency: self.adrenaline_frequency,
        });
        self.audio.observe(&self.banners);
    }

    fn ensure_not_ended(&self) -> Result<()> {
        if self.session.status == SessionStatus::Ended {
            Err(Error::SessionEnded)
        } else {
            Ok(())
        }
    }

    fn cycle_inverse(&self) -> Inverse {
        Inverse::Cycle {
            cycle_number: self.session.cycle_number,
            cycle_elapsed_seconds: self.session.cycle_elapsed_seconds,
            cycle_synced: self.session.cycle_synced,
            pulse_checks: self.session.pulse_checks,
            last_pulse_check_cycle: self.session.last_pulse_check_cycle,
            rhythm: self.rhythm.clone(),
        }
    }

    fn event(&self, kind: EventKind, wall: DateTime<Utc>) -> Event {
        Event {
            kind,
            session_seconds: self.session.total_elapsed_seconds,
            cycle: self.session.cycle_number,
            wall_clock: wall,
            annotations: Vec::new(),
        }
    }

    fn record(&mut self, kind: EventKind, wall: DateTime<Utc>, inverse: Option<Inverse>) -> ActionOutcome {
        let event = self.event(kind, wall);
        self.log.append(event, inverse);
        ActionOutcome::recorded()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::{BannerKind, BannerStatus};
    use crate::types::Classification;

    fn started() -> Engine {
        crate::logging::init_test();
        let mut engine = Engine::default();
        engine.apply(Action::Start).unwrap();
        engine
    }

    fn shock(engine: &mut Engine) -> Result<ActionOutcome> {
        engine.apply(Action::ConfirmShock { energy_joules: 200 })
    }

    fn give(engine: &mut Engine, drug: Drug) -> Result<ActionOutcome> {
        engine.apply(Action::Administer { drug, dose: None })
    }

    fn banner(engine: &Engine, kind: BannerKind) -> Option<&Banner> {
        engine.banners().iter().find(|b| b.kind == kind)
    }

    /// Advance to `target` seconds of total session time
    fn advance_to(engine: &mut Engine, target: u64) {
        let now = engine.session().total_elapsed_seconds;
        engine.advance(target - now);
    }

    #[test]
    fn test_pea_at_ten_seconds_makes_adrenaline_due() {
        let mut e = started();
        e.advance(10);
        assert!(!e.medication(Drug::Adrenaline).is_due());

        e.apply(Action::SelectRhythm(Rhythm::Pea)).unwrap();
        assert!(e.medication(Drug::Adrenaline).is_due());
        let adr = banner(&e, BannerKind::Medication(Drug::Adrenaline)).unwrap();
        assert_eq!(adr.status, BannerStatus::Active);
        assert_eq!(e.audio().pending().collect::<Vec<_>>(), vec![AlertSound::Adrenaline]);
    }

    #[test]
    fn test_vf_amiodarone_schedule() {
        let mut e = started();
        advance_to(&mut e, 5);
        e.apply(Action::SelectRhythm(Rhythm::Vf)).unwrap();
        shock(&mut e).unwrap();

        advance_to(&mut e, 30);
        e.apply(Action::ConfirmPulseCheck).unwrap();
        advance_to(&mut e, 35);
        shock(&mut e).unwrap();
        assert!(e.medication(Drug::Adrenaline).is_due(), "second shock");
        assert!(!e.medication(Drug::Amiodarone).is_due());

        advance_to(&mut e, 60);
        e.apply(Action::ConfirmPulseCheck).unwrap();
        advance_to(&mut e, 65);
        shock(&mut e).unwrap();
        assert!(e.medication(Drug::Amiodarone).is_due());
        assert_eq!(e.default_dose(Drug::Amiodarone), Some(300.0));

        give(&mut e, Drug::Amiodarone).unwrap();
        let amio = e.medication(Drug::Amiodarone);
        assert!(!amio.is_due());
        assert_eq!(amio.cumulative_dose, 300.0);

        advance_to(&mut e, 90);
        e.apply(Action::ConfirmPulseCheck).unwrap();
        advance_to(&mut e, 95);
        shock(&mut e).unwrap();
        assert!(!e.medication(Drug::Amiodarone).is_due());

        advance_to(&mut e, 120);
        e.apply(Action::ConfirmPulseCheck).unwrap();
        advance_to(&mut e, 125);
        shock(&mut e).unwrap();
        assert_eq!(e.rhythm().shock_count, 5);
        assert!(e.medication(Drug::Amiodarone).is_due());
        assert_eq!(e.default_dose(Drug::Amiodarone), Some(150.0));
    }

    #[test]
    fn test_cumulative_dose_never_exceeds_ceiling() {
        let mut e = started();
        give(&mut e, Drug::Amiodarone).unwrap();
        give(&mut e, Drug::Amiodarone).unwrap();
        assert_eq!(e.medication(Drug::Amiodarone).cumulative_dose, 450.0);

        let events_before = e.events().count();
        let err = give(&mut e, Drug::Amiodarone).unwrap_err();
        assert!(matches!(err, Error::DoseCeiling { .. }));
        let err = e
            .apply(Action::Administer {
                drug: Drug::Amiodarone,
                dose: Some(10.0),
            })
            .unwrap_err();
        assert!(err.is_validation());
        assert_eq!(e.medication(Drug::Amiodarone).cumulative_dose, 450.0);
        assert_eq!(e.events().count(), events_before);
    }

    #[test]
    fn test_adrenaline_only_accepts_unit_dose() {
        let mut e = started();
        e.apply(Action::SelectRhythm(Rhythm::Pea)).unwrap();

        let err = e
            .apply(Action::Administer {
                drug: Drug::Adrenaline,
                dose: Some(5.0),
            })
            .unwrap_err();
        assert!(matches!(err, Error::InvalidDose { drug: Drug::Adrenaline, .. }));
        assert_eq!(e.medication(Drug::Adrenaline).cumulative_dose, 0.0);

        e.apply(Action::Administer {
            drug: Drug::Adrenaline,
            dose: Some(1.0),
        })
        .unwrap();
        assert_eq!(e.medication(Drug::Adrenaline).cumulative_dose, 1.0);
    }

    #[test]
    fn test_undo_administer_restores_tracker() {
        let mut e = started();
        advance_to(&mut e, 10);
        e.apply(Action::SelectRhythm(Rhythm::Asystole)).unwrap();
        let before = e.medication(Drug::Adrenaline).clone();
        let events_before = e.events().count();

        advance_to(&mut e, 12);
        give(&mut e, Drug::Adrenaline).unwrap();
        assert_eq!(e.medication(Drug::Adrenaline).dose_sequence, 1);

        advance_to(&mut e, 15);
        let outcome = e.apply(Action::UndoLast).unwrap();
        assert!(matches!(outcome, ActionOutcome::Undone(EventKind::Medication { .. })));
        let after = e.medication(Drug::Adrenaline);
        assert_eq!(after.cumulative_dose, before.cumulative_dose);
        assert_eq!(after.dose_sequence, 0);
        assert!(after.is_due());
        assert_eq!(e.events().count(), events_before);
    }

    #[test]
    fn test_undo_window_closes() {
        let mut e = started();
        give(&mut e, Drug::Adrenaline).unwrap();
        e.advance(10);
        assert!(e.undoable().is_none());
        assert!(matches!(
            e.apply(Action::UndoLast),
            Err(Error::UndoExpired("medication"))
        ));
        assert_eq!(e.medication(Drug::Adrenaline).dose_sequence, 1);
    }

    #[test]
    fn test_start_event_is_permanent() {
        let mut e = started();
        assert!(matches!(e.apply(Action::UndoLast), Err(Error::UndoExpired("start"))));
    }

    #[test]
    fn test_cycle_changes_only_on_pulse_check() {
        let mut e = started();
        e.apply(Action::SelectRhythm(Rhythm::Pea)).unwrap();
        e.advance(500);
        assert_eq!(e.session().cycle_number, 1);
        assert_eq!(e.session().cycle_elapsed_seconds, CYCLE_DURATION_SECONDS);
        assert!(e.rhythm().selection_locked);

        e.apply(Action::ConfirmPulseCheck).unwrap();
        assert_eq!(e.session().cycle_number, 2);
        assert_eq!(e.session().cycle_elapsed_seconds, 0);
        assert!(!e.rhythm().selection_locked);

        e.apply(Action::SelectRhythm(Rhythm::Vf)).unwrap();
        assert!(e.rhythm().selection_locked);
        assert_eq!(
            e.apply(Action::SelectRhythm(Rhythm::Asystole)).unwrap(),
            ActionOutcome::Ignored
        );
        assert_eq!(e.rhythm().current, Some(Rhythm::Vf));
    }

    #[test]
    fn test_undo_pulse_check_resumes_previous_cycle() {
        let mut e = started();
        advance_to(&mut e, 30);
        e.apply(Action::ConfirmPulseCheck).unwrap();
        advance_to(&mut e, 33);
        e.apply(Action::UndoLast).unwrap();
        assert_eq!(e.session().cycle_number, 1);
        assert_eq!(e.session().cycle_elapsed_seconds, 33);
        assert_eq!(e.session().pulse_checks, 0);
    }

    #[test]
    fn test_sync_then_pulse_check_advances_once() {
        let mut e = started();
        e.apply(Action::SelectRhythm(Rhythm::Vf)).unwrap();
        advance_to(&mut e, 40);
        e.apply(Action::SyncCycle).unwrap();
        assert_eq!(e.session().cycle_number, 2);
        assert_eq!(e.session().cycle_elapsed_seconds, 0);
        assert!(!e.rhythm().selection_locked);

        e.advance(115);
        assert_eq!(
            banner(&e, BannerKind::PulseCheck).unwrap().status,
            BannerStatus::Active
        );
        e.apply(Action::ConfirmPulseCheck).unwrap();
        assert_eq!(e.session().cycle_number, 2);
        assert!(!e.session().cycle_synced);
        assert_eq!(
            banner(&e, BannerKind::PulseCheck).unwrap().status,
            BannerStatus::Completed
        );

        e.apply(Action::ConfirmPulseCheck).unwrap();
        assert_eq!(e.session().cycle_number, 3);
    }

    #[test]
    fn test_coach_refuses_second_shock_in_cycle() {
        let mut e = started();
        e.apply(Action::SelectRhythm(Rhythm::Vf)).unwrap();
        shock(&mut e).unwrap();
        let err = shock(&mut e).unwrap_err();
        assert!(matches!(err, Error::ShockRefused { cycle: 1 }));
        assert_eq!(e.rhythm().shock_count, 1);
    }

    #[test]
    fn test_track_mode_annotates_extra_shock() {
        let mut e = started();
        assert!(matches!(
            e.apply(Action::SetMode {
                mode: Mode::Track,
                confirmed: false
            }),
            Err(Error::ConfirmationRequired(Mode::Track))
        ));
        e.apply(Action::SetMode {
            mode: Mode::Track,
            confirmed: true,
        })
        .unwrap();

        e.apply(Action::SelectRhythm(Rhythm::Vf)).unwrap();
        shock(&mut e).unwrap();
        let outcome = shock(&mut e).unwrap();
        assert_eq!(
            outcome,
            ActionOutcome::Recorded {
                annotations: vec![Anomaly::ExtraShockInCycle]
            }
        );
        let last = e.events().last().unwrap();
        assert_eq!(last.annotations, vec![Anomaly::ExtraShockInCycle]);
    }

    #[test]
    fn test_track_mode_drug_banners_pending() {
        let mut e = started();
        e.apply(Action::SetMode {
            mode: Mode::Track,
            confirmed: true,
        })
        .unwrap();
        e.advance(10);
        e.apply(Action::SelectRhythm(Rhythm::Pea)).unwrap();
        assert!(e.medication(Drug::Adrenaline).is_due());
        assert!(e
            .banners()
            .iter()
            .filter(|b| matches!(b.kind, BannerKind::Medication(_)))
            .all(|b| b.status == BannerStatus::Pending));
        assert_eq!(e.audio().pending().count(), 0);
    }

    #[test]
    fn test_snooze_through_engine() {
        let mut e = started();
        advance_to(&mut e, 10);
        e.apply(Action::SelectRhythm(Rhythm::Pea)).unwrap();
        e.apply(Action::Snooze(Drug::Adrenaline)).unwrap();
        assert_eq!(e.medication(Drug::Adrenaline).snoozed_until(), Some(100));

        advance_to(&mut e, 99);
        assert!(!e.medication(Drug::Adrenaline).is_due());
        advance_to(&mut e, 100);
        assert!(e.medication(Drug::Adrenaline).is_due());
    }

    #[test]
    fn test_dismiss_ignored_when_not_due() {
        let mut e = started();
        assert_eq!(
            e.apply(Action::Dismiss(Drug::Amiodarone)).unwrap(),
            ActionOutcome::Ignored
        );
    }

    #[test]
    fn test_frequency_change_reschedules_adrenaline() {
        let mut e = started();
        e.apply(Action::SelectRhythm(Rhythm::Asystole)).unwrap();
        advance_to(&mut e, 10);
        give(&mut e, Drug::Adrenaline).unwrap();

        assert!(matches!(
            e.apply(Action::SetAdrenalineFrequency(6)),
            Err(Error::InvalidFrequency(6))
        ));
        e.apply(Action::SetAdrenalineFrequency(3)).unwrap();
        advance_to(&mut e, 189);
        assert!(!e.medication(Drug::Adrenaline).is_due());
        advance_to(&mut e, 190);
        assert!(e.medication(Drug::Adrenaline).is_due());
    }

    #[test]
    fn test_actions_require_active_session() {
        crate::logging::init_test();
        let mut e = Engine::default();
        assert!(matches!(e.apply(Action::ConfirmPulseCheck), Err(Error::NotStarted)));
        e.advance(30);
        assert_eq!(e.session().total_elapsed_seconds, 0);

        e.apply(Action::Start).unwrap();
        e.end(Outcome::Rosc, "").unwrap();
        assert!(matches!(shock(&mut e), Err(Error::SessionEnded)));
        assert!(matches!(e.apply(Action::Start), Err(Error::SessionEnded)));
        assert!(matches!(e.end(Outcome::Rosc, ""), Err(Error::SessionEnded)));
    }

    #[test]
    fn test_pause_freezes_clock() {
        let mut e = started();
        e.advance(20);
        assert_eq!(e.apply(Action::Pause).unwrap(), ActionOutcome::Updated);
        e.advance(20);
        assert_eq!(e.session().total_elapsed_seconds, 20);
        assert_eq!(e.apply(Action::Start).unwrap(), ActionOutcome::Updated);
        assert_eq!(e.events().filter(|ev| ev.kind == EventKind::Start).count(), 1);
    }

    #[test]
    fn test_compressor_and_mechanical_cpr() {
        let mut e = started();
        e.advance(115);
        assert_eq!(
            banner(&e, BannerKind::Compressor).unwrap().status,
            BannerStatus::Active
        );
        e.apply(Action::ConfirmCompressorChange).unwrap();
        assert_eq!(
            banner(&e, BannerKind::Compressor).unwrap().status,
            BannerStatus::Completed
        );

        e.apply(Action::ToggleMechanicalCpr).unwrap();
        assert!(e.session().mechanical_cpr);
        e.apply(Action::ConfirmCompressorChange).unwrap();
        assert!(!e.session().mechanical_cpr);
        assert_eq!(
            e.events().last().unwrap().kind,
            EventKind::CompressorChange {
                resumed_manual: true
            }
        );
    }

    #[test]
    fn test_procedures_and_discretionary_meds() {
        let mut e = started();
        e.apply(Action::RecordProcedure(Procedure::Intubation)).unwrap();
        assert!(matches!(
            e.apply(Action::RecordProcedure(Procedure::Intubation)),
            Err(Error::ProcedureAlreadyRecorded(Procedure::Intubation))
        ));
        e.apply(Action::RecordProcedure(Procedure::Echo)).unwrap();
        e.apply(Action::RecordProcedure(Procedure::Echo)).unwrap();

        e.apply(Action::RecordMedication {
            medication: "bicarb".into(),
            dosage: "1 amp".into(),
        })
        .unwrap();
        match &e.events().last().unwrap().kind {
            EventKind::Discretionary { medication, dosage } => {
                assert_eq!(medication, "7.5% Sodium Bicarbonate 50 mg IV");
                assert_eq!(dosage, "1 amp");
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_notes_limit() {
        let mut e = started();
        assert!(matches!(
            e.apply(Action::SetNotes("x".repeat(201))),
            Err(Error::NotesTooLong { max: 200 })
        ));
        e.apply(Action::SetNotes("Witnessed arrest".into())).unwrap();
        assert_eq!(e.doctor_notes(), "Witnessed arrest");
    }

    #[test]
    fn test_end_builds_record() {
        let mut e = started();
        e.apply(Action::SelectRhythm(Rhythm::Vf)).unwrap();
        advance_to(&mut e, 5);
        shock(&mut e).unwrap();
        advance_to(&mut e, 40);
        give(&mut e, Drug::Adrenaline).unwrap();

        let record = e.end(Outcome::Rosc, "Transferred to ICU").unwrap();
        assert_eq!(record.id, e.id());
        assert_eq!(record.outcome, Outcome::Rosc);
        assert_eq!(record.summary.shock_count, 1);
        assert_eq!(record.summary.adrenaline_doses, 1);
        assert_eq!(record.summary.status, SessionStatus::Ended);
        assert_eq!(record.shocks().len(), 1);
        assert_eq!(record.rhythm_history()[0].rhythm, Rhythm::Vf);
        assert!(matches!(
            record.events.last().unwrap().kind,
            EventKind::End { outcome: Outcome::Rosc }
        ));
        assert!(e.banners().iter().all(|b| !b.is_active()));
    }

    #[test]
    fn test_reset_returns_to_idle() {
        let mut e = started();
        let id = e.id();
        e.advance(30);
        e.reset();
        assert_ne!(e.id(), id);
        assert_eq!(e.session().status, SessionStatus::Idle);
        assert_eq!(e.events().count(), 0);
        assert_eq!(e.rhythm().classification, Classification::Unset);
    }

    #[test]
    fn test_audio_pulse_cue_with_gap() {
        let mut e = started();
        e.apply(Action::SelectRhythm(Rhythm::Pea)).unwrap();
        advance_to(&mut e, 10);
        advance_to(&mut e, 115);

        // Pulse check outranks the adrenaline cue queued earlier
        assert_eq!(e.next_sound(0), Some(AlertSound::PulseCheck));
        assert_eq!(e.next_sound(500), None);
        e.sound_finished(1000);
        assert_eq!(e.next_sound(2999), None);
        assert_eq!(e.next_sound(3000), Some(AlertSound::Adrenaline));
    }

    #[test]
    fn test_engine_serde_roundtrip_keeps_state() {
        let mut e = started();
        e.apply(Action::SelectRhythm(Rhythm::Pea)).unwrap();
        e.advance(12);
        let json = serde_json::to_string(&e).unwrap();
        let mut back: Engine = serde_json::from_str(&json).unwrap();
        back.refresh();
        assert_eq!(back.summary(), e.summary());
        assert_eq!(back.banners(), e.banners());
        assert_eq!(back.events().count(), e.events().count());
    }

    /// Undo `action` right after applying it and check nothing is left behind
    fn assert_undo_restores(e: &mut Engine, action: Action) {
        let session = e.session().clone();
        let rhythm = e.rhythm().clone();
        let medications = e.medications().clone();
        let frequency = e.adrenaline_frequency();
        let events = e.events().count();

        let outcome = e.apply(action.clone()).unwrap();
        assert!(
            matches!(outcome, ActionOutcome::Recorded { .. }),
            "{:?} was not recorded",
            action
        );
        assert!(matches!(e.apply(Action::UndoLast).unwrap(), ActionOutcome::Undone(_)));

        assert_eq!(e.session(), &session, "session after undoing {:?}", action);
        assert_eq!(e.rhythm(), &rhythm, "rhythm after undoing {:?}", action);
        assert_eq!(e.medications(), &medications, "medications after undoing {:?}", action);
        assert_eq!(e.adrenaline_frequency(), frequency);
        assert_eq!(e.events().count(), events);
    }

    #[test]
    fn test_undo_restores_every_reversible_kind() {
        let mut e = started();
        assert_undo_restores(&mut e, Action::SelectRhythm(Rhythm::Pea));
        assert_undo_restores(
            &mut e,
            Action::SetMode {
                mode: Mode::Track,
                confirmed: true,
            },
        );
        assert_undo_restores(&mut e, Action::SetAdrenalineFrequency(5));
        assert_undo_restores(&mut e, Action::ConfirmCompressorChange);
        assert_undo_restores(&mut e, Action::ToggleMechanicalCpr);
        assert_undo_restores(
            &mut e,
            Action::RecordMedication {
                medication: "Mg".into(),
                dosage: "2 g".into(),
            },
        );
        assert_undo_restores(&mut e, Action::RecordProcedure(Procedure::Ecmo));

        advance_to(&mut e, 30);
        assert_undo_restores(&mut e, Action::SyncCycle);
        assert_undo_restores(&mut e, Action::ConfirmPulseCheck);

        // Adrenaline due for a non-shockable rhythm
        e.apply(Action::SelectRhythm(Rhythm::Asystole)).unwrap();
        assert!(e.medication(Drug::Adrenaline).is_due());
        assert_undo_restores(&mut e, Action::Dismiss(Drug::Adrenaline));
        assert_undo_restores(&mut e, Action::Snooze(Drug::Adrenaline));
        assert_undo_restores(
            &mut e,
            Action::Administer {
                drug: Drug::Adrenaline,
                dose: None,
            },
        );

        advance_to(&mut e, 120);
        e.apply(Action::ConfirmPulseCheck).unwrap();
        e.apply(Action::SelectRhythm(Rhythm::Vf)).unwrap();
        assert_undo_restores(&mut e, Action::ConfirmShock { energy_joules: 200 });
        // The cycle is free for a shock again once the first is undone
        shock(&mut e).unwrap();
        assert_eq!(e.rhythm().shock_count, 1);
    }

    #[test]
    fn test_crossover_needs_two_shocks_before_next_adrenaline() {
        let mut e = started();
        advance_to(&mut e, 10);
        e.apply(Action::SelectRhythm(Rhythm::Pea)).unwrap();
        give(&mut e, Drug::Adrenaline).unwrap();

        advance_to(&mut e, 120);
        e.apply(Action::ConfirmPulseCheck).unwrap();
        e.apply(Action::SelectRhythm(Rhythm::Vf)).unwrap();
        assert_eq!(e.rhythm().shock_count_at_last_crossover, Some(0));
        shock(&mut e).unwrap();

        // Interval has elapsed but only one shock since the crossover
        advance_to(&mut e, 250);
        assert!(!e.medication(Drug::Adrenaline).is_due());

        e.apply(Action::ConfirmPulseCheck).unwrap();
        shock(&mut e).unwrap();
        assert!(e.medication(Drug::Adrenaline).is_due());
        assert_eq!(
            banner(&e, BannerKind::Medication(Drug::Adrenaline)).map(|b| b.status),
            Some(BannerStatus::Active)
        );
    }

    #[test]
    fn test_serde_roundtrip_after_every_event_kind() {
        fn roundtrip(e: &Engine) {
            let json = serde_json::to_string(e).unwrap();
            let back: Engine = serde_json::from_str(&json)
                .unwrap_or_else(|err| panic!("engine failed to parse: {}", err));
            assert_eq!(back.summary(), e.summary());
            assert_eq!(
                back.events().cloned().collect::<Vec<_>>(),
                e.events().cloned().collect::<Vec<_>>()
            );
        }

        let mut e = started();
        roundtrip(&e);
        advance_to(&mut e, 10);

        let actions = vec![
            Action::SelectRhythm(Rhythm::Pea),
            Action::Dismiss(Drug::Adrenaline),
            Action::Snooze(Drug::Adrenaline),
            Action::Administer {
                drug: Drug::Adrenaline,
                dose: None,
            },
            Action::SetAdrenalineFrequency(3),
            Action::ConfirmCompressorChange,
            Action::ToggleMechanicalCpr,
            Action::RecordMedication {
                medication: "Bicarb".into(),
                dosage: "1 amp".into(),
            },
            Action::RecordProcedure(Procedure::Echo),
            Action::SyncCycle,
            Action::ConfirmPulseCheck,
            Action::SelectRhythm(Rhythm::Vf),
            Action::ConfirmShock { energy_joules: 200 },
            Action::SetMode {
                mode: Mode::Track,
                confirmed: true,
            },
        ];
        for action in actions {
            let outcome = e.apply(action.clone()).unwrap();
            assert!(
                matches!(outcome, ActionOutcome::Recorded { .. }),
                "{:?} was not recorded",
                action
            );
            roundtrip(&e);
        }

        e.end(Outcome::Rosc, "").unwrap();
        roundtrip(&e);
        assert_eq!(e.events().count(), 16);
    }
}
