//! Core domain types for the resuscitation engine.
//!
//! This module defines the vocabulary shared by every component:
//! - Rhythms and their shockable classification
//! - Operating mode and session status
//! - Protocol drugs and dose units
//! - Outcomes, procedures and log anomalies

use crate::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Rhythm Types
// ============================================================================

/// Cardiac rhythm identified at a rhythm check
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Rhythm {
    #[serde(rename = "VF")]
    Vf,
    #[serde(rename = "pVT")]
    Pvt,
    #[serde(rename = "Asystole")]
    Asystole,
    #[serde(rename = "PEA")]
    Pea,
    #[serde(rename = "Sinus")]
    Sinus,
}

impl Rhythm {
    /// Lookup table from rhythm to defibrillation eligibility
    pub fn classification(self) -> Classification {
        match self {
            Rhythm::Vf | Rhythm::Pvt => Classification::Shockable,
            Rhythm::Asystole | Rhythm::Pea | Rhythm::Sinus => Classification::NonShockable,
        }
    }

    pub fn is_shockable(self) -> bool {
        self.classification() == Classification::Shockable
    }

    pub fn label(self) -> &'static str {
        match self {
            Rhythm::Vf => "VF",
            Rhythm::Pvt => "pVT",
            Rhythm::Asystole => "Asystole",
            Rhythm::Pea => "PEA",
            Rhythm::Sinus => "Sinus",
        }
    }

    pub fn full_name(self) -> &'static str {
        match self {
            Rhythm::Vf => "Ventricular Fibrillation",
            Rhythm::Pvt => "Pulseless VT",
            Rhythm::Asystole => "Asystole",
            Rhythm::Pea => "Pulseless Electrical Activity",
            Rhythm::Sinus => "Sinus Rhythm (ROSC?)",
        }
    }
}

impl fmt::Display for Rhythm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Rhythm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "vf" => Ok(Rhythm::Vf),
            "pvt" | "vt" => Ok(Rhythm::Pvt),
            "asystole" => Ok(Rhythm::Asystole),
            "pea" => Ok(Rhythm::Pea),
            "sinus" => Ok(Rhythm::Sinus),
            other => Err(Error::Parse(format!("unknown rhythm '{}'", other))),
        }
    }
}

/// Defibrillation eligibility of the current rhythm
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    Shockable,
    NonShockable,
    #[default]
    Unset,
}

// ============================================================================
// Session Types
// ============================================================================

/// Operating mode of the engine
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Actively prompts for due actions
    #[default]
    Coach,
    /// Records actions on demand, no prompting
    Track,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Coach => f.write_str("coach"),
            Mode::Track => f.write_str("track"),
        }
    }
}

impl FromStr for Mode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "coach" => Ok(Mode::Coach),
            "track" => Ok(Mode::Track),
            other => Err(Error::Parse(format!("unknown mode '{}'", other))),
        }
    }
}

/// Run state of a resuscitation session
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    #[default]
    Idle,
    Running,
    Paused,
    Ended,
}

impl SessionStatus {
    pub fn is_running(self) -> bool {
        self == SessionStatus::Running
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionStatus::Idle => "idle",
            SessionStatus::Running => "running",
            SessionStatus::Paused => "paused",
            SessionStatus::Ended => "ended",
        };
        f.write_str(s)
    }
}

/// Interval between adrenaline doses, restricted to 3, 4 or 5 minutes
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(try_from = "u8", into = "u8")]
pub struct AdrenalineFrequency(u8);

impl AdrenalineFrequency {
    pub const ALLOWED: [u8; 3] = [3, 4, 5];

    pub fn minutes(self) -> u8 {
        self.0
    }

    pub fn interval_seconds(self) -> u64 {
        u64::from(self.0) * 60
    }
}

impl Default for AdrenalineFrequency {
    fn default() -> Self {
        AdrenalineFrequency(4)
    }
}

impl TryFrom<u8> for AdrenalineFrequency {
    type Error = Error;

    fn try_from(minutes: u8) -> Result<Self, Self::Error> {
        if Self::ALLOWED.contains(&minutes) {
            Ok(AdrenalineFrequency(minutes))
        } else {
            Err(Error::InvalidFrequency(minutes))
        }
    }
}

impl From<AdrenalineFrequency> for u8 {
    fn from(freq: AdrenalineFrequency) -> u8 {
        freq.0
    }
}

// ============================================================================
// Medication Types
// ============================================================================

/// Protocol drugs tracked by the due engine
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Drug {
    Adrenaline,
    Amiodarone,
    Lidocaine,
}

impl Drug {
    pub const ALL: [Drug; 3] = [Drug::Adrenaline, Drug::Amiodarone, Drug::Lidocaine];

    pub fn name(self) -> &'static str {
        match self {
            Drug::Adrenaline => "Adrenaline",
            Drug::Amiodarone => "Amiodarone",
            Drug::Lidocaine => "Lidocaine",
        }
    }
}

impl fmt::Display for Drug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Drug {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "adrenaline" | "epinephrine" | "adr" => Ok(Drug::Adrenaline),
            "amiodarone" | "amio" => Ok(Drug::Amiodarone),
            "lidocaine" | "lignocaine" | "lido" => Ok(Drug::Lidocaine),
            other => Err(Error::Parse(format!("unknown drug '{}'", other))),
        }
    }
}

/// Unit a drug's cumulative dose is tracked in
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DoseUnit {
    Mg,
    MgPerKg,
}

impl fmt::Display for DoseUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DoseUnit::Mg => f.write_str("mg"),
            DoseUnit::MgPerKg => f.write_str("mg/kg"),
        }
    }
}

// ============================================================================
// Outcome and Procedure Types
// ============================================================================

/// Final outcome recorded when a session ends
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum Outcome {
    #[serde(rename = "ROSC")]
    Rosc,
    #[serde(rename = "deceased")]
    Deceased,
    #[serde(rename = "ongoing")]
    Ongoing,
    #[serde(rename = "transferred")]
    Transferred,
    #[serde(rename = "VA_ECMO")]
    VaEcmo,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Outcome::Rosc => "ROSC",
            Outcome::Deceased => "Deceased",
            Outcome::Ongoing => "Ongoing",
            Outcome::Transferred => "Transferred",
            Outcome::VaEcmo => "VA ECMO",
        };
        f.write_str(s)
    }
}

impl FromStr for Outcome {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace(['-', ' '], "_").as_str() {
            "rosc" => Ok(Outcome::Rosc),
            "deceased" => Ok(Outcome::Deceased),
            "ongoing" => Ok(Outcome::Ongoing),
            "transferred" => Ok(Outcome::Transferred),
            "va_ecmo" | "ecmo" => Ok(Outcome::VaEcmo),
            other => Err(Error::Parse(format!("unknown outcome '{}'", other))),
        }
    }
}

/// Bedside procedures that can be logged during a session
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Procedure {
    ArterialLine,
    CentralLine,
    Intubation,
    Echo,
    Ecmo,
}

impl Procedure {
    /// Only bedside echo may be logged more than once per session
    pub fn repeatable(self) -> bool {
        matches!(self, Procedure::Echo)
    }
}

impl fmt::Display for Procedure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(crate::formulary::formulary().procedure_name(*self))
    }
}

impl FromStr for Procedure {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace(['-', ' ', '_'], "").as_str() {
            "aline" | "arterialline" => Ok(Procedure::ArterialLine),
            "centralline" | "cvc" => Ok(Procedure::CentralLine),
            "ett" | "intubation" => Ok(Procedure::Intubation),
            "echo" => Ok(Procedure::Echo),
            "ecmo" => Ok(Procedure::Ecmo),
            other => Err(Error::Parse(format!("unknown procedure '{}'", other))),
        }
    }
}

/// Protocol deviations annotated on an accepted event
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Anomaly {
    /// More than one shock delivered within a single cycle (track mode)
    ExtraShockInCycle,
    /// Shock delivered while the recorded rhythm is not shockable
    ShockOnNonShockableRhythm,
}

impl fmt::Display for Anomaly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Anomaly::ExtraShockInCycle => f.write_str("extra shock in cycle"),
            Anomaly::ShockOnNonShockableRhythm => f.write_str("shock on non-shockable rhythm"),
        }
    }
}
